//! Caller-facing entry points. Each one checks the caller, resolves default horizons from the
//! clock, and delegates to the services.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    context::EngineContext,
    options::EngineOptions,
    posting_service::{LedgerReplayService, ReplayOutcome},
    recognition_service::{RecognitionEngine, RecognitionFailure, RecognitionRequest, RecognitionResult},
    storage::DocumentStore,
    time::Clock,
    CoreError,
};

/// Identity of whoever invoked an entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub uid: Option<String>,
    pub tenant_id: String,
}

impl Caller {
    pub fn new(uid: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        Self {
            uid: Some(uid.into()),
            tenant_id: tenant_id.into(),
        }
    }

    pub fn anonymous(tenant_id: impl Into<String>) -> Self {
        Self {
            uid: None,
            tenant_id: tenant_id.into(),
        }
    }

    fn authenticate(&self) -> Result<&str, CoreError> {
        match self.uid.as_deref() {
            Some(uid) if !uid.is_empty() => Ok(uid),
            _ => Err(CoreError::Unauthenticated),
        }
    }
}

/// `{created, skipped}` counts of a replay, as returned to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReplayCounts {
    pub created: usize,
    pub skipped: usize,
}

impl From<&ReplayOutcome> for ReplayCounts {
    fn from(outcome: &ReplayOutcome) -> Self {
        Self {
            created: outcome.created,
            skipped: outcome.skipped,
        }
    }
}

/// Runs the five-step recompute for a contract. `as_of` defaults to the clock's now.
pub fn api_recompute_for_contract(
    store: &dyn DocumentStore,
    caller: &Caller,
    clock: &dyn Clock,
    options: &EngineOptions,
    contract_id: &str,
    version_id: Option<&str>,
    as_of: Option<DateTime<Utc>>,
) -> Result<RecognitionResult, RecognitionFailure> {
    caller.authenticate()?;
    let ctx = EngineContext::new(store, &caller.tenant_id, clock, options);
    let mut request = RecognitionRequest::new(contract_id, as_of.unwrap_or_else(|| clock.now()));
    if let Some(version_id) = version_id {
        request = request.for_version(version_id);
    }
    RecognitionEngine::run(&ctx, &request)
}

/// Replays a contract's ledger up to `up_to`, defaulting to the clock's now.
pub fn api_replay_ledger(
    store: &dyn DocumentStore,
    caller: &Caller,
    clock: &dyn Clock,
    options: &EngineOptions,
    contract_id: &str,
    up_to: Option<DateTime<Utc>>,
) -> Result<ReplayCounts, CoreError> {
    caller.authenticate()?;
    if contract_id.trim().is_empty() {
        return Err(CoreError::InvalidArgument("contractId is required".into()));
    }
    let ctx = EngineContext::new(store, &caller.tenant_id, clock, options);
    let outcome = LedgerReplayService::replay(&ctx, contract_id, up_to.unwrap_or_else(|| clock.now()))?;
    Ok(ReplayCounts::from(&outcome))
}
