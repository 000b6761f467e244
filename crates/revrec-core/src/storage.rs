//! Document-store abstraction the engine persists through.
//!
//! Documents are JSON objects addressed by a tenant-scoped collection path plus an opaque
//! key. Backends only need the six primitives on [`DocumentStore`]; query evaluation is
//! shared so every backend filters and orders identically.

use std::{
    cmp::Ordering,
    collections::BTreeMap,
    fmt,
    sync::{Mutex, MutexGuard},
};

use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

use crate::CoreError;

/// Collection names under `tenants/{tenantId}/`.
pub mod collections {
    pub const CONTRACTS: &str = "contracts";
    pub const CONTRACT_VERSIONS: &str = "contractVersions";
    pub const LINE_ITEMS: &str = "lineItems";
    pub const PERFORMANCE_OBLIGATIONS: &str = "performanceObligations";
    pub const REVENUE_SCHEDULES: &str = "revenueSchedules";
    pub const VARIABLE_CONSIDERATIONS: &str = "variableConsiderations";
    pub const BILLING_SCHEDULES: &str = "billingSchedules";
    pub const REVENUE_LEDGER_ENTRIES: &str = "revenueLedgerEntries";
    pub const CONTRACT_BALANCES: &str = "contractBalances";
    pub const LEDGER_MARKERS: &str = "ledgerMarkers";
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionPath {
    tenant_id: String,
    name: String,
}

impl CollectionPath {
    pub fn new(tenant_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            name: name.into(),
        }
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn doc(&self, key: impl Into<String>) -> DocPath {
        DocPath {
            collection: self.clone(),
            key: key.into(),
        }
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tenants/{}/{}", self.tenant_id, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocPath {
    pub collection: CollectionPath,
    pub key: String,
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.key)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub key: String,
    pub data: Value,
}

impl Document {
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, CoreError> {
        serde_json::from_value(self.data.clone()).map_err(|err| {
            CoreError::Serde(format!("document `{}` is malformed: {}", self.key, err))
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    In,
    Lte,
    Gte,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Eq,
            value: value.into(),
        }
    }

    pub fn is_in<V: Into<Value>>(field: impl Into<String>, values: Vec<V>) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::In,
            value: Value::Array(values.into_iter().map(Into::into).collect()),
        }
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Lte,
            value: value.into(),
        }
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Gte,
            value: value.into(),
        }
    }

    pub fn matches(&self, data: &Value) -> bool {
        let Some(actual) = data.get(&self.field) else {
            return false;
        };
        match self.op {
            FilterOp::Eq => actual == &self.value,
            FilterOp::In => self
                .value
                .as_array()
                .is_some_and(|options| options.contains(actual)),
            FilterOp::Lte => matches!(
                compare_values(actual, &self.value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            FilterOp::Gte => matches!(
                compare_values(actual, &self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: CollectionPath,
    pub filters: Vec<Filter>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new(collection: CollectionPath) -> Self {
        Self {
            collection,
            filters: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some(OrderBy {
            field: field.into(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Filters, orders, and truncates `documents` (assumed key-ordered) per this query.
    pub fn apply(&self, documents: impl IntoIterator<Item = Document>) -> Vec<Document> {
        let mut rows: Vec<Document> = documents
            .into_iter()
            .filter(|doc| self.filters.iter().all(|filter| filter.matches(&doc.data)))
            .collect();
        if let Some(order) = &self.order_by {
            rows.sort_by(|a, b| {
                let ordering = match (a.data.get(&order.field), b.data.get(&order.field)) {
                    (Some(left), Some(right)) => {
                        compare_values(left, right).unwrap_or(Ordering::Equal)
                    }
                    (None, Some(_)) => Ordering::Less,
                    (Some(_), None) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                };
                match order.direction {
                    Direction::Asc => ordering,
                    Direction::Desc => ordering.reverse(),
                }
            });
        }
        if let Some(limit) = self.limit {
            rows.truncate(limit);
        }
        rows
    }
}

/// Orders numbers numerically and strings lexicographically (ISO dates sort correctly).
pub fn compare_values(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Shallow-merges the top-level fields of `patch` into `target`.
pub fn merge_fields(target: &mut Value, patch: Value) -> Result<(), CoreError> {
    let Value::Object(fields) = patch else {
        return Err(CoreError::InvalidArgument(
            "partial update must be a JSON object".into(),
        ));
    };
    match target {
        Value::Object(existing) => {
            for (field, value) in fields {
                existing.insert(field, value);
            }
            Ok(())
        }
        _ => {
            *target = Value::Object(fields);
            Ok(())
        }
    }
}

/// Abstraction over document persistence backends.
pub trait DocumentStore: Send + Sync {
    fn get(&self, path: &DocPath) -> Result<Option<Value>, CoreError>;
    fn query(&self, query: &Query) -> Result<Vec<Document>, CoreError>;
    /// Fails with [`CoreError::AlreadyExists`] when `key` is taken.
    fn create_if_absent(
        &self,
        collection: &CollectionPath,
        key: &str,
        data: Value,
    ) -> Result<(), CoreError>;
    /// Stores `data` under a generated key and returns it.
    fn add(&self, collection: &CollectionPath, data: Value) -> Result<String, CoreError>;
    fn update(&self, path: &DocPath, partial: Value) -> Result<(), CoreError>;
    /// Missing paths are ignored.
    fn batch_delete(&self, paths: &[DocPath]) -> Result<(), CoreError>;
}

pub fn generate_key() -> String {
    Uuid::new_v4().simple().to_string()
}

type Collections = BTreeMap<CollectionPath, BTreeMap<String, Value>>;

/// Process-local store guarded by a mutex. Suitable for tests and embedded use.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    collections: Mutex<Collections>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents currently held in `collection`.
    pub fn count(&self, collection: &CollectionPath) -> usize {
        self.lock()
            .map(|guard| guard.get(collection).map(BTreeMap::len).unwrap_or(0))
            .unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Collections>, CoreError> {
        self.collections
            .lock()
            .map_err(|_| CoreError::Internal("document store lock poisoned".into()))
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn get(&self, path: &DocPath) -> Result<Option<Value>, CoreError> {
        let guard = self.lock()?;
        Ok(guard
            .get(&path.collection)
            .and_then(|docs| docs.get(&path.key))
            .cloned())
    }

    fn query(&self, query: &Query) -> Result<Vec<Document>, CoreError> {
        let guard = self.lock()?;
        let Some(docs) = guard.get(&query.collection) else {
            return Ok(Vec::new());
        };
        Ok(query.apply(docs.iter().map(|(key, data)| Document {
            key: key.clone(),
            data: data.clone(),
        })))
    }

    fn create_if_absent(
        &self,
        collection: &CollectionPath,
        key: &str,
        data: Value,
    ) -> Result<(), CoreError> {
        let mut guard = self.lock()?;
        let docs = guard.entry(collection.clone()).or_default();
        if docs.contains_key(key) {
            return Err(CoreError::AlreadyExists(collection.doc(key).to_string()));
        }
        docs.insert(key.to_string(), data);
        Ok(())
    }

    fn add(&self, collection: &CollectionPath, data: Value) -> Result<String, CoreError> {
        let key = generate_key();
        let mut guard = self.lock()?;
        guard
            .entry(collection.clone())
            .or_default()
            .insert(key.clone(), data);
        Ok(key)
    }

    fn update(&self, path: &DocPath, partial: Value) -> Result<(), CoreError> {
        let mut guard = self.lock()?;
        let existing = guard
            .get_mut(&path.collection)
            .and_then(|docs| docs.get_mut(&path.key))
            .ok_or_else(|| CoreError::NotFound(path.to_string()))?;
        merge_fields(existing, partial)
    }

    fn batch_delete(&self, paths: &[DocPath]) -> Result<(), CoreError> {
        let mut guard = self.lock()?;
        for path in paths {
            if let Some(docs) = guard.get_mut(&path.collection) {
                docs.remove(&path.key);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn contracts() -> CollectionPath {
        CollectionPath::new("t1", collections::CONTRACTS)
    }

    #[test]
    fn create_if_absent_rejects_duplicates() {
        let store = MemoryDocumentStore::new();
        store
            .create_if_absent(&contracts(), "k1", json!({"a": 1}))
            .expect("first create");
        let err = store
            .create_if_absent(&contracts(), "k1", json!({"a": 2}))
            .expect_err("second create");
        assert!(err.is_already_exists());
        assert_eq!(
            store.get(&contracts().doc("k1")).unwrap(),
            Some(json!({"a": 1}))
        );
    }

    #[test]
    fn query_filters_orders_and_limits() {
        let store = MemoryDocumentStore::new();
        for (key, date, status) in [
            ("a", "2025-03-01", "paid"),
            ("b", "2025-01-01", "invoiced"),
            ("c", "2025-02-01", "scheduled"),
        ] {
            store
                .create_if_absent(
                    &contracts(),
                    key,
                    json!({"contractId": "c1", "billingDate": date, "status": status}),
                )
                .unwrap();
        }
        let query = Query::new(contracts())
            .filter(Filter::eq("contractId", "c1"))
            .filter(Filter::is_in("status", vec!["paid", "invoiced"]))
            .order_by("billingDate", Direction::Asc);
        let rows = store.query(&query).unwrap();
        let keys: Vec<_> = rows.iter().map(|doc| doc.key.as_str()).collect();
        assert_eq!(keys, vec!["b", "a"]);

        let latest = store
            .query(
                &Query::new(contracts())
                    .filter(Filter::lte("billingDate", "2025-02-15"))
                    .order_by("billingDate", Direction::Desc)
                    .limit(1),
            )
            .unwrap();
        assert_eq!(latest[0].key, "c");
    }

    #[test]
    fn update_merges_and_requires_existing_document() {
        let store = MemoryDocumentStore::new();
        let key = store.add(&contracts(), json!({"a": 1, "b": 2})).unwrap();
        store
            .update(&contracts().doc(&key), json!({"b": 3, "c": 4}))
            .unwrap();
        assert_eq!(
            store.get(&contracts().doc(&key)).unwrap(),
            Some(json!({"a": 1, "b": 3, "c": 4}))
        );
        let missing = store.update(&contracts().doc("nope"), json!({"a": 1}));
        assert!(matches!(missing, Err(CoreError::NotFound(_))));
    }

    #[test]
    fn batch_delete_ignores_missing_paths() {
        let store = MemoryDocumentStore::new();
        let key = store.add(&contracts(), json!({})).unwrap();
        store
            .batch_delete(&[contracts().doc(&key), contracts().doc("ghost")])
            .unwrap();
        assert_eq!(store.count(&contracts()), 0);
    }
}
