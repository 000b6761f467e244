//! Ledger v2: replays a contract's event stream against running billed/cash/recognized
//! totals and writes balanced, idempotently keyed postings.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, error, info};

use revrec_domain::{
    positive_part, round2, DoubleEntry, LedgerAccount, LedgerEntryType, MarkerKind,
    RevenueLedgerEntry, DEFAULT_EXCHANGE_RATE, POSTING_MODEL_V2,
};

use crate::{
    context::EngineContext,
    event_service::{sort_events, EventKind, EventSourcer, LedgerEvent},
    CoreError,
};

/// One balanced posting produced by the replay, before persistence.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    pub debit: LedgerAccount,
    pub credit: LedgerAccount,
    pub amount: Decimal,
    pub event_kind: EventKind,
    pub source_id: String,
    pub period_key: String,
    pub entry_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period_start: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period_end: Option<NaiveDate>,
}

impl JournalEntry {
    fn from_event(event: &LedgerEvent, debit: LedgerAccount, credit: LedgerAccount, amount: Decimal) -> Self {
        Self {
            debit,
            credit,
            amount,
            event_kind: event.kind,
            source_id: event.source_id.clone(),
            period_key: event.period_key.clone(),
            entry_date: event.date,
            period_start: event.period_start,
            period_end: event.period_end,
        }
    }

    /// The account that distinguishes the two splits of one event: the credit side for
    /// invoices and cash, the debit side for revenue.
    pub fn split_target(&self) -> LedgerAccount {
        match self.event_kind {
            EventKind::Invoice | EventKind::Cash => self.credit,
            EventKind::Revenue => self.debit,
        }
    }

    /// Deterministic document key: `V2-{kind}-{target}-{source}-{period}`.
    pub fn reference_number(&self) -> String {
        format!(
            "V2-{}-{}-{}-{}",
            self.event_kind.key_tag(),
            self.split_target().key_tag(),
            sanitize_key_part(&self.source_id),
            sanitize_key_part(&self.period_key)
        )
    }

    pub fn entry_type(&self) -> LedgerEntryType {
        match self.event_kind {
            EventKind::Invoice => LedgerEntryType::Receivable,
            EventKind::Cash => LedgerEntryType::Cash,
            EventKind::Revenue => LedgerEntryType::Revenue,
        }
    }
}

impl DoubleEntry for JournalEntry {
    fn debit_account(&self) -> &str {
        self.debit.label()
    }

    fn credit_account(&self) -> &str {
        self.credit.label()
    }

    fn amount(&self) -> Decimal {
        self.amount
    }
}

/// Keeps key parts to `[A-Za-z0-9_-]` so they are safe as document keys and file names.
fn sanitize_key_part(value: &str) -> String {
    value
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '_' || ch == '-' {
                ch
            } else {
                '_'
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunningBalances {
    pub billed: Decimal,
    pub cash: Decimal,
    pub recognized: Decimal,
}

impl RunningBalances {
    pub fn contract_asset(&self) -> Decimal {
        positive_part(self.recognized - self.billed)
    }

    pub fn contract_liability(&self) -> Decimal {
        positive_part(self.billed - self.recognized)
    }

    pub fn receivable(&self) -> Decimal {
        positive_part(self.billed - self.cash)
    }

    /// Applies one event, returning the `(debit, credit, unrounded amount)` splits it produces.
    fn apply(&mut self, event: &LedgerEvent) -> [(LedgerAccount, LedgerAccount, Decimal); 2] {
        let amount = event.amount;
        match event.kind {
            EventKind::Invoice => {
                let to_asset = amount.min(self.contract_asset());
                self.billed += amount;
                [
                    (LedgerAccount::Receivable, LedgerAccount::ContractAsset, to_asset),
                    (LedgerAccount::Receivable, LedgerAccount::ContractLiability, amount - to_asset),
                ]
            }
            EventKind::Cash => {
                let to_receivable = amount.min(self.receivable());
                self.cash += amount;
                [
                    (LedgerAccount::Cash, LedgerAccount::Receivable, to_receivable),
                    (LedgerAccount::Cash, LedgerAccount::ContractLiability, amount - to_receivable),
                ]
            }
            EventKind::Revenue => {
                let from_liability = amount.min(self.contract_liability());
                self.recognized += amount;
                [
                    (LedgerAccount::ContractLiability, LedgerAccount::Revenue, from_liability),
                    (LedgerAccount::ContractAsset, LedgerAccount::Revenue, amount - from_liability),
                ]
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostingRun {
    pub entries: Vec<JournalEntry>,
    /// Final running totals.
    pub balances: RunningBalances,
    /// Running totals after each event, in replay order.
    pub history: Vec<RunningBalances>,
}

/// Replays `events` in canonical order. Non-positive events are skipped; amounts are
/// rounded to cents only when posted, and zero splits are not posted.
pub fn replay_events(events: &[LedgerEvent]) -> PostingRun {
    let mut ordered = events.to_vec();
    sort_events(&mut ordered);

    let mut run = PostingRun::default();
    for event in ordered.iter().filter(|event| event.amount > Decimal::ZERO) {
        for (debit, credit, portion) in run.balances.apply(event) {
            let amount = round2(portion);
            if amount > Decimal::ZERO {
                run.entries
                    .push(JournalEntry::from_event(event, debit, credit, amount));
            }
        }
        run.history.push(run.balances);
    }
    run
}

/// The pure ledger v2 posting function.
pub fn post_events(events: &[LedgerEvent]) -> Vec<JournalEntry> {
    replay_events(events).entries
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayOutcome {
    pub contract_id: String,
    pub up_to: DateTime<Utc>,
    pub events: usize,
    pub created: usize,
    /// Postings that already existed under their key.
    pub skipped: usize,
    pub balances: RunningBalances,
}

/// Persists the replay of a contract's full event history.
pub struct LedgerReplayService;

impl LedgerReplayService {
    /// Rebuilds every posting for `contract_id` up to `up_to`. Safe to run repeatedly or
    /// concurrently: existing keys are counted as skipped, never duplicated.
    pub fn replay(
        ctx: &EngineContext<'_>,
        contract_id: &str,
        up_to: DateTime<Utc>,
    ) -> Result<ReplayOutcome, CoreError> {
        if contract_id.trim().is_empty() {
            return Err(CoreError::InvalidArgument("contractId is required".into()));
        }
        let contract = ctx
            .repo
            .contract(contract_id)?
            .ok_or_else(|| CoreError::NotFound(format!("contract {contract_id}")))?;
        let events = EventSourcer::load(&ctx.repo, &contract, up_to)?;
        let run = replay_events(&events);
        let now = ctx.clock.now();

        let mut outcome = ReplayOutcome {
            contract_id: contract_id.to_string(),
            up_to,
            events: events.len(),
            created: 0,
            skipped: 0,
            balances: run.balances,
        };
        for journal in &run.entries {
            let entry = ledger_entry(ctx.repo.tenant_id(), contract_id, &contract.currency, journal, now);
            let created = ctx.repo.create_ledger_entry(&entry).map_err(|err| {
                error!(
                    contract_id,
                    key = %entry.reference_number,
                    code = err.code(),
                    created = outcome.created,
                    "posting failed: {err}"
                );
                err
            })?;
            if created {
                debug!(
                    contract_id,
                    key = %entry.reference_number,
                    debit = %journal.debit,
                    credit = %journal.credit,
                    amount = %journal.amount,
                    "posting created"
                );
                outcome.created += 1;
            } else {
                outcome.skipped += 1;
            }
        }

        ctx.repo.create_marker(
            contract_id,
            MarkerKind::LedgerV2,
            now,
            Some(format!("replayed up to {}", up_to.to_rfc3339())),
        )?;
        info!(
            contract_id,
            events = outcome.events,
            created = outcome.created,
            skipped = outcome.skipped,
            "ledger replay finished"
        );
        Ok(outcome)
    }
}

/// Maps a journal entry onto the persisted posting document.
pub fn ledger_entry(
    tenant_id: &str,
    contract_id: &str,
    currency: &str,
    journal: &JournalEntry,
    created_at: DateTime<Utc>,
) -> RevenueLedgerEntry {
    let reference_number = journal.reference_number();
    let (billing_schedule_id, performance_obligation_id) = match journal.event_kind {
        EventKind::Invoice | EventKind::Cash => (Some(journal.source_id.clone()), None),
        EventKind::Revenue => (None, Some(journal.source_id.clone())),
    };
    RevenueLedgerEntry {
        id: reference_number.clone(),
        tenant_id: tenant_id.to_string(),
        contract_id: contract_id.to_string(),
        entry_type: journal.entry_type(),
        debit_account: journal.debit.label().to_string(),
        credit_account: journal.credit.label().to_string(),
        amount: journal.amount,
        currency: currency.to_string(),
        exchange_rate: DEFAULT_EXCHANGE_RATE,
        functional_amount: journal.amount * DEFAULT_EXCHANGE_RATE,
        entry_date: journal.entry_date,
        period_start: journal.period_start,
        period_end: journal.period_end,
        reference_number,
        description: format!(
            "{} {}: Dr {} / Cr {}",
            journal.event_kind, journal.source_id, journal.debit, journal.credit
        ),
        billing_schedule_id,
        performance_obligation_id,
        posting_model: Some(POSTING_MODEL_V2.to_string()),
        is_posted: true,
        is_reversed: false,
        created_at: Some(created_at),
    }
}
