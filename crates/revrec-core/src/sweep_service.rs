//! Periodic batch sweep: recompute and replay every live contract of every tenant.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info};

use revrec_domain::ContractStatus;

use crate::{
    context::EngineContext, options::EngineOptions, storage::DocumentStore, time::Clock,
    trigger_service::recompute_and_replay,
};

/// Statuses a sweep visits. Drafts have no economics to post yet.
pub const SWEEP_STATUSES: [ContractStatus; 4] = [
    ContractStatus::Active,
    ContractStatus::Modified,
    ContractStatus::Terminated,
    ContractStatus::Expired,
];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepFailure {
    pub tenant_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract_id: Option<String>,
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub tenants: usize,
    pub contracts: usize,
    pub succeeded: usize,
    pub created: usize,
    pub skipped: usize,
    pub failures: Vec<SweepFailure>,
}

pub struct SweepService;

impl SweepService {
    /// Visits tenants in order and their contracts one at a time. A failing contract is
    /// logged and recorded; the sweep carries on with the next one.
    pub fn run(
        store: &dyn DocumentStore,
        tenants: &[String],
        clock: &dyn Clock,
        options: &EngineOptions,
        as_of: DateTime<Utc>,
    ) -> SweepReport {
        let mut report = SweepReport::default();
        for tenant_id in tenants {
            report.tenants += 1;
            let ctx = EngineContext::new(store, tenant_id, clock, options);
            let contracts = match ctx.repo.contracts_with_status(&SWEEP_STATUSES) {
                Ok(contracts) => contracts,
                Err(err) => {
                    error!(tenant_id = %tenant_id, "listing contracts failed: {err}");
                    report.failures.push(SweepFailure {
                        tenant_id: tenant_id.clone(),
                        contract_id: None,
                        code: err.code().to_string(),
                        message: err.to_string(),
                    });
                    continue;
                }
            };

            for contract in contracts {
                report.contracts += 1;
                match recompute_and_replay(&ctx, &contract.id, as_of) {
                    Ok(outcome) => {
                        report.succeeded += 1;
                        report.created += outcome.replay.created;
                        report.skipped += outcome.replay.skipped;
                    }
                    Err(err) => {
                        error!(
                            tenant_id = %tenant_id,
                            contract_id = %contract.id,
                            code = err.code(),
                            "sweep failed for contract: {err}"
                        );
                        report.failures.push(SweepFailure {
                            tenant_id: tenant_id.clone(),
                            contract_id: Some(contract.id.clone()),
                            code: err.code().to_string(),
                            message: err.to_string(),
                        });
                    }
                }
            }
        }
        info!(
            tenants = report.tenants,
            contracts = report.contracts,
            failures = report.failures.len(),
            created = report.created,
            "sweep finished"
        );
        report
    }
}
