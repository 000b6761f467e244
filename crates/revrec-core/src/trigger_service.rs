//! Change-driven entry points: what runs when a contract is created, a billing row changes
//! status, or an obligation is satisfied.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use revrec_domain::{BillingStatus, RecognitionMethod};

use crate::{
    billing_service::{BillingGeneration, BillingService},
    context::EngineContext,
    initial_entry_service::{InitialEntryDecision, InitialEntryGuard},
    posting_service::{LedgerReplayService, ReplayOutcome},
    recognition_service::{RecognitionEngine, RecognitionRequest, RecognitionResult},
    storage::collections,
    CoreError,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractCreated {
    pub billing: BillingGeneration,
    pub initial_entry: InitialEntryDecision,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecomputeAndReplay {
    pub contract_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recognition: Option<RecognitionResult>,
    pub replay: ReplayOutcome,
}

/// Recomputes recognition for the contract, then replays its ledger. A contract that has no
/// version yet is replayed without a recompute.
pub fn recompute_and_replay(
    ctx: &EngineContext<'_>,
    contract_id: &str,
    as_of: DateTime<Utc>,
) -> Result<RecomputeAndReplay, CoreError> {
    let recognition = match RecognitionEngine::run(ctx, &RecognitionRequest::new(contract_id, as_of)) {
        Ok(result) => Some(result),
        Err(failure) => match failure.source {
            CoreError::FailedPrecondition(reason) => {
                warn!(contract_id, %reason, "recognition skipped");
                None
            }
            other => return Err(other),
        },
    };
    let replay = LedgerReplayService::replay(ctx, contract_id, as_of)?;
    Ok(RecomputeAndReplay {
        contract_id: contract_id.to_string(),
        recognition,
        replay,
    })
}

pub struct TriggerService;

impl TriggerService {
    /// Generates the billing schedule and evaluates the initial-entry guard.
    pub fn on_contract_created(
        ctx: &EngineContext<'_>,
        contract_id: &str,
        as_of: DateTime<Utc>,
    ) -> Result<ContractCreated, CoreError> {
        let billing = BillingService::generate(ctx, contract_id)?;
        let initial_entry = InitialEntryGuard::apply(ctx, contract_id, as_of)?;
        Ok(ContractCreated {
            billing,
            initial_entry,
        })
    }

    /// Runs after a billing row moved from `before` to `after`. Returns `None` when the
    /// status did not actually change.
    pub fn on_billing_status_changed(
        ctx: &EngineContext<'_>,
        billing_id: &str,
        before: BillingStatus,
        after: BillingStatus,
        as_of: DateTime<Utc>,
    ) -> Result<Option<RecomputeAndReplay>, CoreError> {
        if before == after {
            return Ok(None);
        }
        let row = ctx
            .repo
            .billing_schedule(billing_id)?
            .ok_or_else(|| CoreError::NotFound(format!("billing schedule {billing_id}")))?;
        info!(
            billing_id,
            contract_id = %row.contract_id,
            from = %before,
            to = %after,
            "billing status trigger"
        );
        recompute_and_replay(ctx, &row.contract_id, as_of).map(Some)
    }

    /// Applies a billing status change and fires the trigger for it.
    pub fn change_billing_status(
        ctx: &EngineContext<'_>,
        billing_id: &str,
        next: BillingStatus,
        at: DateTime<Utc>,
        paid_amount: Option<Decimal>,
    ) -> Result<Option<RecomputeAndReplay>, CoreError> {
        let before = ctx
            .repo
            .billing_schedule(billing_id)?
            .ok_or_else(|| CoreError::NotFound(format!("billing schedule {billing_id}")))?
            .status;
        let row = BillingService::transition(ctx, billing_id, next, at, paid_amount)?;
        Self::on_billing_status_changed(ctx, billing_id, before, row.status, at)
    }

    /// Marks a point-in-time obligation satisfied at `satisfied_at` (if it is not already)
    /// and recomputes and replays its contract as of `as_of`.
    pub fn on_obligation_satisfied(
        ctx: &EngineContext<'_>,
        obligation_id: &str,
        satisfied_at: DateTime<Utc>,
        as_of: DateTime<Utc>,
    ) -> Result<RecomputeAndReplay, CoreError> {
        let mut obligation = ctx
            .repo
            .obligation(obligation_id)?
            .ok_or_else(|| CoreError::NotFound(format!("performance obligation {obligation_id}")))?;
        if obligation.recognition_method != RecognitionMethod::PointInTime {
            return Err(CoreError::FailedPrecondition(format!(
                "obligation {obligation_id} is recognized over time"
            )));
        }
        if !obligation.is_satisfied {
            obligation.mark_satisfied(satisfied_at);
            ctx.repo.update_fields(
                collections::PERFORMANCE_OBLIGATIONS,
                obligation_id,
                json!({
                    "isSatisfied": true,
                    "satisfiedDate": satisfied_at,
                }),
            )?;
            info!(obligation_id, contract_id = %obligation.contract_id, "obligation satisfied");
        }
        recompute_and_replay(ctx, &obligation.contract_id, as_of)
    }
}
