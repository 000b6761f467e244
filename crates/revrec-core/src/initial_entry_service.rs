//! Guard around a contract's first ledger posting.
//!
//! A transaction price alone never creates a contract liability; liability needs
//! consideration billed or received ahead of performance. The guard therefore defers until
//! an invoice or cash event exists, posts once through the replay engine, and stands down
//! for good once a full replay has run for the contract.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use revrec_domain::MarkerKind;

use crate::{
    context::EngineContext,
    event_service::{EventKind, EventSourcer},
    posting_service::{LedgerReplayService, ReplayOutcome},
    CoreError,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum InitialEntryDecision {
    /// The full replay already owns this contract's ledger.
    Superseded,
    AlreadyApplied,
    /// No billing or cash yet; nothing is posted.
    Deferred,
    Posted(ReplayOutcome),
}

pub struct InitialEntryGuard;

impl InitialEntryGuard {
    pub fn apply(
        ctx: &EngineContext<'_>,
        contract_id: &str,
        as_of: DateTime<Utc>,
    ) -> Result<InitialEntryDecision, CoreError> {
        let contract = ctx
            .repo
            .contract(contract_id)?
            .ok_or_else(|| CoreError::NotFound(format!("contract {contract_id}")))?;

        if ctx.repo.marker_exists(contract_id, MarkerKind::LedgerV2)? {
            return Ok(InitialEntryDecision::Superseded);
        }
        if ctx.repo.marker_exists(contract_id, MarkerKind::InitialEntry)? {
            return Ok(InitialEntryDecision::AlreadyApplied);
        }

        let events = EventSourcer::load(&ctx.repo, &contract, as_of)?;
        let has_consideration = events
            .iter()
            .any(|event| matches!(event.kind, EventKind::Invoice | EventKind::Cash));
        if !has_consideration {
            info!(contract_id, "no billing or cash yet; initial entry deferred");
            return Ok(InitialEntryDecision::Deferred);
        }

        if !ctx.repo.create_marker(
            contract_id,
            MarkerKind::InitialEntry,
            ctx.clock.now(),
            Some("initial entry posted".into()),
        )? {
            return Ok(InitialEntryDecision::AlreadyApplied);
        }
        let outcome = LedgerReplayService::replay(ctx, contract_id, as_of)?;
        info!(contract_id, created = outcome.created, "initial entry posted");
        Ok(InitialEntryDecision::Posted(outcome))
    }
}
