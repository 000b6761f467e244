//! Contract bundles: one JSON document carrying a contract and everything hanging off it.

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use revrec_core::{collections, CoreError, Repository};
use revrec_domain::{
    Contract, ContractVersion, LineItem, PerformanceObligation, VariableConsideration,
};

use crate::errors::AppError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractBundle {
    pub contract: Contract,
    #[serde(default)]
    pub versions: Vec<ContractVersion>,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
    #[serde(default)]
    pub obligations: Vec<PerformanceObligation>,
    #[serde(default)]
    pub considerations: Vec<VariableConsideration>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub contract_id: String,
    pub versions: usize,
    pub line_items: usize,
    pub obligations: usize,
    pub considerations: usize,
}

impl ContractBundle {
    /// Reads a bundle file. A contract without a `currency` takes `default_currency`.
    pub fn read(path: &Path, default_currency: &str) -> Result<Self, AppError> {
        let raw: Value = serde_json::from_str(&fs::read_to_string(path)?)?;
        let has_currency = raw
            .get("contract")
            .and_then(|contract| contract.get("currency"))
            .is_some();
        let mut bundle: ContractBundle = serde_json::from_value(raw)?;
        if !has_currency {
            bundle.contract.currency = default_currency.to_string();
        }
        Ok(bundle)
    }

    /// Checks ids and cross references before anything is written.
    pub fn validate(&self) -> Result<(), AppError> {
        let contract_id = self.contract.id.trim();
        if contract_id.is_empty() {
            return Err(AppError::Input("bundle contract has no id".into()));
        }
        let foreign = self
            .versions
            .iter()
            .map(|version| version.contract_id.as_str())
            .chain(self.line_items.iter().map(|item| item.contract_id.as_str()))
            .chain(self.obligations.iter().map(|po| po.contract_id.as_str()))
            .chain(self.considerations.iter().map(|vc| vc.contract_id.as_str()))
            .find(|id| *id != contract_id);
        if let Some(other) = foreign {
            return Err(AppError::Input(format!(
                "bundle for contract {contract_id} references contract {other}"
            )));
        }
        if let Some(version_id) = &self.contract.current_version_id {
            if !self.versions.iter().any(|version| &version.id == version_id) {
                return Err(AppError::Input(format!(
                    "current version {version_id} is not part of the bundle"
                )));
            }
        } else if self.contract.status.requires_version() {
            return Err(AppError::Input(format!(
                "contract {contract_id} is {} but has no current version",
                self.contract.status
            )));
        }
        Ok(())
    }

    /// Writes the bundle into the repository's tenant. Fails with `AlreadyExists` when the
    /// contract is already present; children are only written after the contract itself.
    pub fn import(mut self, repo: &Repository<'_>) -> Result<ImportSummary, AppError> {
        self.validate()?;
        self.contract.tenant_id = repo.tenant_id().to_string();
        let contract_id = repo.insert(collections::CONTRACTS, &self.contract)?;

        for version in &self.versions {
            insert_child(repo, collections::CONTRACT_VERSIONS, version)?;
        }
        for item in &self.line_items {
            insert_child(repo, collections::LINE_ITEMS, item)?;
        }
        for obligation in &self.obligations {
            insert_child(repo, collections::PERFORMANCE_OBLIGATIONS, obligation)?;
        }
        for consideration in &self.considerations {
            insert_child(repo, collections::VARIABLE_CONSIDERATIONS, consideration)?;
        }

        let summary = ImportSummary {
            contract_id,
            versions: self.versions.len(),
            line_items: self.line_items.len(),
            obligations: self.obligations.len(),
            considerations: self.considerations.len(),
        };
        info!(
            tenant_id = repo.tenant_id(),
            contract_id = %summary.contract_id,
            versions = summary.versions,
            line_items = summary.line_items,
            "contract bundle imported"
        );
        Ok(summary)
    }
}

fn insert_child<T>(repo: &Repository<'_>, collection: &str, entity: &T) -> Result<(), CoreError>
where
    T: Serialize + revrec_domain::Identifiable,
{
    repo.upsert(collection, entity).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use revrec_core::MemoryDocumentStore;
    use serde_json::json;

    fn bundle_json() -> Value {
        json!({
            "contract": {
                "id": "c1",
                "customerId": "cust",
                "totalValue": "1200",
                "startDate": "2025-01-01",
                "endDate": "2025-12-31",
                "status": "active",
                "currentVersionId": "c1-v1"
            },
            "versions": [
                {"id": "c1-v1", "contractId": "c1", "versionNumber": 1, "totalValue": "1200"}
            ],
            "lineItems": [
                {"id": "li-1", "contractId": "c1", "versionId": "c1-v1", "totalPrice": 1200,
                 "recognitionMethod": "over_time"}
            ]
        })
    }

    #[test]
    fn imports_bundle_into_tenant() {
        let store = MemoryDocumentStore::new();
        let repo = Repository::new(&store, "t1");
        let bundle: ContractBundle = serde_json::from_value(bundle_json()).unwrap();

        let summary = bundle.clone().import(&repo).unwrap();
        assert_eq!(summary.contract_id, "c1");
        assert_eq!(summary.line_items, 1);
        let stored = repo.contract("c1").unwrap().unwrap();
        assert_eq!(stored.tenant_id, "t1");
        assert_eq!(repo.line_items("c1-v1").unwrap().len(), 1);

        let err = bundle.import(&repo).unwrap_err();
        assert_eq!(err.code(), "already-exists");
    }

    #[test]
    fn rejects_foreign_children_and_missing_versions() {
        let mut raw = bundle_json();
        raw["lineItems"][0]["contractId"] = json!("c2");
        let bundle: ContractBundle = serde_json::from_value(raw).unwrap();
        assert!(matches!(bundle.validate(), Err(AppError::Input(_))));

        let mut raw = bundle_json();
        raw["versions"] = json!([]);
        let bundle: ContractBundle = serde_json::from_value(raw).unwrap();
        assert!(matches!(bundle.validate(), Err(AppError::Input(_))));
    }

    #[test]
    fn missing_currency_takes_the_configured_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle.json");
        fs::write(&path, bundle_json().to_string()).unwrap();
        let bundle = ContractBundle::read(&path, "EUR").unwrap();
        assert_eq!(bundle.contract.currency, "EUR");
    }
}
