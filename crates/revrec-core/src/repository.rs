//! Typed, tenant-scoped access to the document store.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use revrec_domain::{
    BillingSchedule, Contract, ContractBalance, ContractStatus, ContractVersion, Identifiable,
    LedgerMarker, LineItem, MarkerKind, PerformanceObligation, RevenueLedgerEntry,
    RevenueSchedule, VariableConsideration,
};

use crate::{
    storage::{collections, generate_key, CollectionPath, Direction, DocumentStore, Filter, Query},
    CoreError,
};

/// Wraps a [`DocumentStore`] for one tenant and (de)serializes domain entities.
#[derive(Clone, Copy)]
pub struct Repository<'a> {
    store: &'a dyn DocumentStore,
    tenant_id: &'a str,
}

impl<'a> Repository<'a> {
    pub fn new(store: &'a dyn DocumentStore, tenant_id: &'a str) -> Self {
        Self { store, tenant_id }
    }

    pub fn tenant_id(&self) -> &'a str {
        self.tenant_id
    }

    pub fn store(&self) -> &'a dyn DocumentStore {
        self.store
    }

    pub fn collection(&self, name: &str) -> CollectionPath {
        CollectionPath::new(self.tenant_id, name)
    }

    pub fn contract(&self, id: &str) -> Result<Option<Contract>, CoreError> {
        self.get_as(collections::CONTRACTS, id)
    }

    pub fn contracts_with_status(
        &self,
        statuses: &[ContractStatus],
    ) -> Result<Vec<Contract>, CoreError> {
        let labels: Vec<String> = statuses.iter().map(ToString::to_string).collect();
        self.list_as(
            Query::new(self.collection(collections::CONTRACTS))
                .filter(Filter::is_in("status", labels)),
        )
    }

    pub fn version(&self, id: &str) -> Result<Option<ContractVersion>, CoreError> {
        self.get_as(collections::CONTRACT_VERSIONS, id)
    }

    /// All versions of a contract, oldest first.
    pub fn versions(&self, contract_id: &str) -> Result<Vec<ContractVersion>, CoreError> {
        self.list_as(
            Query::new(self.collection(collections::CONTRACT_VERSIONS))
                .filter(Filter::eq("contractId", contract_id))
                .order_by("versionNumber", Direction::Asc),
        )
    }

    pub fn line_items(&self, version_id: &str) -> Result<Vec<LineItem>, CoreError> {
        self.list_as(
            Query::new(self.collection(collections::LINE_ITEMS))
                .filter(Filter::eq("versionId", version_id)),
        )
    }

    pub fn obligation(&self, id: &str) -> Result<Option<PerformanceObligation>, CoreError> {
        self.get_as(collections::PERFORMANCE_OBLIGATIONS, id)
    }

    pub fn obligations(&self, version_id: &str) -> Result<Vec<PerformanceObligation>, CoreError> {
        self.list_as(
            Query::new(self.collection(collections::PERFORMANCE_OBLIGATIONS))
                .filter(Filter::eq("versionId", version_id)),
        )
    }

    pub fn schedules_for_obligation(
        &self,
        obligation_id: &str,
    ) -> Result<Vec<RevenueSchedule>, CoreError> {
        self.list_as(
            Query::new(self.collection(collections::REVENUE_SCHEDULES))
                .filter(Filter::eq("performanceObligationId", obligation_id))
                .order_by("periodStart", Direction::Asc),
        )
    }

    pub fn considerations(
        &self,
        version_id: &str,
    ) -> Result<Vec<VariableConsideration>, CoreError> {
        self.list_as(
            Query::new(self.collection(collections::VARIABLE_CONSIDERATIONS))
                .filter(Filter::eq("versionId", version_id)),
        )
    }

    pub fn billing_schedule(&self, id: &str) -> Result<Option<BillingSchedule>, CoreError> {
        self.get_as(collections::BILLING_SCHEDULES, id)
    }

    pub fn billing_schedules(&self, contract_id: &str) -> Result<Vec<BillingSchedule>, CoreError> {
        self.list_as(
            Query::new(self.collection(collections::BILLING_SCHEDULES))
                .filter(Filter::eq("contractId", contract_id))
                .order_by("billingDate", Direction::Asc),
        )
    }

    pub fn has_billing_schedules(&self, contract_id: &str) -> Result<bool, CoreError> {
        let rows = self.store.query(
            &Query::new(self.collection(collections::BILLING_SCHEDULES))
                .filter(Filter::eq("contractId", contract_id))
                .limit(1),
        )?;
        Ok(!rows.is_empty())
    }

    pub fn ledger_entries(&self, contract_id: &str) -> Result<Vec<RevenueLedgerEntry>, CoreError> {
        self.list_as(
            Query::new(self.collection(collections::REVENUE_LEDGER_ENTRIES))
                .filter(Filter::eq("contractId", contract_id))
                .order_by("entryDate", Direction::Asc),
        )
    }

    pub fn balances(&self, contract_id: &str) -> Result<Vec<ContractBalance>, CoreError> {
        self.list_as(
            Query::new(self.collection(collections::CONTRACT_BALANCES))
                .filter(Filter::eq("contractId", contract_id))
                .order_by("asOf", Direction::Asc),
        )
    }

    pub fn marker_exists(&self, contract_id: &str, kind: MarkerKind) -> Result<bool, CoreError> {
        let path = self
            .collection(collections::LEDGER_MARKERS)
            .doc(kind.doc_key(contract_id));
        Ok(self.store.get(&path)?.is_some())
    }

    /// Writes the marker once. Returns `false` when it already existed.
    pub fn create_marker(
        &self,
        contract_id: &str,
        kind: MarkerKind,
        at: DateTime<Utc>,
        note: Option<String>,
    ) -> Result<bool, CoreError> {
        let marker = LedgerMarker {
            contract_id: contract_id.to_string(),
            kind,
            created_at: at,
            note,
        };
        self.create_keyed(
            collections::LEDGER_MARKERS,
            &kind.doc_key(contract_id),
            &marker,
        )
    }

    /// Creates a posting keyed by its reference number. Returns `false` when it was already
    /// posted.
    pub fn create_ledger_entry(&self, entry: &RevenueLedgerEntry) -> Result<bool, CoreError> {
        self.create_keyed(
            collections::REVENUE_LEDGER_ENTRIES,
            &entry.reference_number,
            entry,
        )
    }

    /// Inserts an entity under its own id, or a generated one when the id is empty.
    pub fn insert<T>(&self, name: &str, entity: &T) -> Result<String, CoreError>
    where
        T: Serialize + Identifiable,
    {
        let key = if entity.id().is_empty() {
            generate_key()
        } else {
            entity.id().to_string()
        };
        let mut value = serde_json::to_value(entity)?;
        if let Value::Object(fields) = &mut value {
            fields.insert("id".into(), Value::String(key.clone()));
        }
        self.store
            .create_if_absent(&self.collection(name), &key, value)?;
        Ok(key)
    }

    /// Inserts, or overwrites the fields of an existing document with the same id.
    pub fn upsert<T>(&self, name: &str, entity: &T) -> Result<String, CoreError>
    where
        T: Serialize + Identifiable,
    {
        match self.insert(name, entity) {
            Err(CoreError::AlreadyExists(_)) => {
                let value = serde_json::to_value(entity)?;
                self.update_fields(name, entity.id(), value)?;
                Ok(entity.id().to_string())
            }
            other => other,
        }
    }

    /// Appends a document under a store-generated key.
    pub fn append<T: Serialize>(&self, name: &str, entity: &T) -> Result<String, CoreError> {
        let value = serde_json::to_value(entity)?;
        self.store.add(&self.collection(name), value)
    }

    pub fn update_fields(&self, name: &str, key: &str, partial: Value) -> Result<(), CoreError> {
        self.store.update(&self.collection(name).doc(key), partial)
    }

    pub fn delete_all<'k>(
        &self,
        name: &str,
        keys: impl IntoIterator<Item = &'k str>,
    ) -> Result<(), CoreError> {
        let collection = self.collection(name);
        let paths: Vec<_> = keys.into_iter().map(|key| collection.doc(key)).collect();
        if paths.is_empty() {
            return Ok(());
        }
        self.store.batch_delete(&paths)
    }

    fn create_keyed<T: Serialize>(
        &self,
        name: &str,
        key: &str,
        entity: &T,
    ) -> Result<bool, CoreError> {
        let value = serde_json::to_value(entity)?;
        match self.store.create_if_absent(&self.collection(name), key, value) {
            Ok(()) => Ok(true),
            Err(CoreError::AlreadyExists(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    fn get_as<T: DeserializeOwned>(&self, name: &str, key: &str) -> Result<Option<T>, CoreError> {
        let path = self.collection(name).doc(key);
        match self.store.get(&path)? {
            Some(value) => decode_with_key(key, value).map(Some),
            None => Ok(None),
        }
    }

    fn list_as<T: DeserializeOwned>(&self, query: Query) -> Result<Vec<T>, CoreError> {
        self.store
            .query(&query)?
            .into_iter()
            .map(|doc| decode_with_key(&doc.key, doc.data))
            .collect()
    }
}

/// Decodes a document, filling a missing or empty `id` from its key.
fn decode_with_key<T: DeserializeOwned>(key: &str, mut value: Value) -> Result<T, CoreError> {
    if let Value::Object(fields) = &mut value {
        let needs_id = match fields.get("id") {
            Some(Value::String(id)) => id.is_empty(),
            _ => true,
        };
        if needs_id {
            fields.insert("id".into(), Value::String(key.to_string()));
        }
    }
    serde_json::from_value(value)
        .map_err(|err| CoreError::Serde(format!("document `{key}` is malformed: {err}")))
}
