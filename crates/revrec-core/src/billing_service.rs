//! Billing schedule generation and billing status transitions.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};

use revrec_domain::{
    months_between, shift_months, split_evenly, BillingFrequency, BillingSchedule,
    BillingStatus, Contract,
};

use crate::{context::EngineContext, storage::collections, CoreError};

pub const DEFAULT_DUE_DAYS: u32 = 30;

/// Checked in order; the first match wins. Semi-annual precedes annual because its
/// spellings contain "annual".
static FREQUENCY_PATTERNS: Lazy<Vec<(Regex, BillingFrequency)>> = Lazy::new(|| {
    [
        (
            r"\b(one[- ]?time|up[- ]?front|lump[- ]sum|single payment)\b",
            BillingFrequency::OneTime,
        ),
        (
            r"\b(semi[- ]?annual(ly)?|half[- ]?year(ly)?|bi[- ]?annual(ly)?|every (6|six) months)\b",
            BillingFrequency::SemiAnnual,
        ),
        (
            r"\b(quarter(ly|s)?|every (3|three) months)\b",
            BillingFrequency::Quarterly,
        ),
        (
            r"\b(annual(ly)?|yearly|per annum|every (12|twelve) months)\b",
            BillingFrequency::Annual,
        ),
        (r"\b(monthly|per month|every month)\b", BillingFrequency::Monthly),
    ]
    .into_iter()
    .map(|(pattern, frequency)| {
        (
            Regex::new(pattern).expect("frequency pattern is valid"),
            frequency,
        )
    })
    .collect()
});

static NET_DAYS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bnet\s*-?\s*(\d{1,3})\b").expect("net pattern is valid"));

static DUE_DAYS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,3})\s*days?\b").expect("days pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
/// Billing cadence and due-date offset inferred from payment terms. A hint, never authoritative.
pub struct PaymentTerms {
    pub frequency: BillingFrequency,
    pub due_days: u32,
}

impl Default for PaymentTerms {
    fn default() -> Self {
        Self {
            frequency: BillingFrequency::Monthly,
            due_days: DEFAULT_DUE_DAYS,
        }
    }
}

impl PaymentTerms {
    /// Parses free text, taking anything the text does not mention from `defaults`.
    pub fn parse(text: &str, defaults: PaymentTerms) -> Self {
        let normalized = text.trim().to_lowercase();
        let frequency = FREQUENCY_PATTERNS
            .iter()
            .find(|(pattern, _)| pattern.is_match(&normalized))
            .map(|(_, frequency)| *frequency)
            .unwrap_or(defaults.frequency);
        let due_days = NET_DAYS
            .captures(&normalized)
            .or_else(|| DUE_DAYS.captures(&normalized))
            .and_then(|caps| caps.get(1))
            .and_then(|days| days.as_str().parse().ok())
            .unwrap_or(defaults.due_days);
        Self {
            frequency,
            due_days,
        }
    }

    /// Number of billing periods needed to cover `months`.
    pub fn period_count(&self, months: u32) -> u32 {
        match self.frequency.period_months() {
            Some(step) => months.div_ceil(step).max(1),
            None => 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingGeneration {
    pub contract_id: String,
    pub created: Vec<BillingSchedule>,
    /// Rows already existed; nothing was generated.
    pub skipped_existing: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terms: Option<PaymentTerms>,
    pub warnings: Vec<String>,
}

/// Derives and persists periodic invoice schedules.
pub struct BillingService;

impl BillingService {
    /// Computes billing rows for `[start, end]` without touching storage. The last row
    /// absorbs the rounding remainder so rows always sum to `total`.
    pub fn plan(
        contract_id: &str,
        total: Decimal,
        start: NaiveDate,
        end: NaiveDate,
        terms: PaymentTerms,
    ) -> Vec<BillingSchedule> {
        let count = terms.period_count(months_between(start, end));
        let step = terms.frequency.period_months().unwrap_or(0) as i32;
        split_evenly(total, count as usize)
            .into_iter()
            .enumerate()
            .map(|(index, amount)| {
                let index = index as u32;
                let billing_date = shift_months(start, step * index as i32);
                let mut row = BillingSchedule::new(
                    format!("{}-bill-{:03}", contract_id, index + 1),
                    contract_id,
                    billing_date,
                    amount,
                );
                row.period_number = index + 1;
                row.due_date = Some(billing_date + Duration::days(i64::from(terms.due_days)));
                row.frequency = Some(terms.frequency);
                row
            })
            .collect()
    }

    /// Generates the schedule for a contract once. Existing rows make this a no-op and
    /// unparsable dates produce a warning instead of an error.
    pub fn generate(
        ctx: &EngineContext<'_>,
        contract_id: &str,
    ) -> Result<BillingGeneration, CoreError> {
        let contract = ctx
            .repo
            .contract(contract_id)?
            .ok_or_else(|| CoreError::NotFound(format!("contract {contract_id}")))?;
        let mut outcome = BillingGeneration {
            contract_id: contract_id.to_string(),
            ..BillingGeneration::default()
        };

        if ctx.repo.has_billing_schedules(contract_id)? {
            info!(contract_id, "billing schedule already exists; skipping generation");
            outcome.skipped_existing = true;
            return Ok(outcome);
        }

        let (Some(start), Some(end)) = (contract.start(), contract.end()) else {
            let message = format!(
                "contract {contract_id} has unparsable start/end dates; billing schedule not generated"
            );
            warn!(contract_id, "{message}");
            outcome.warnings.push(message);
            return Ok(outcome);
        };
        if end < start {
            let message =
                format!("contract {contract_id} ends before it starts; billing schedule not generated");
            warn!(contract_id, "{message}");
            outcome.warnings.push(message);
            return Ok(outcome);
        }

        let terms = Self::terms_for(&contract, ctx.options.default_terms);
        let now = ctx.clock.now();
        for mut row in Self::plan(contract_id, contract.total_value, start, end, terms) {
            row.tenant_id = ctx.repo.tenant_id().to_string();
            row.currency = contract.currency.clone();
            row.created_at = Some(now);
            match ctx.repo.insert(collections::BILLING_SCHEDULES, &row) {
                Ok(_) => outcome.created.push(row),
                Err(CoreError::AlreadyExists(path)) => {
                    info!(contract_id, %path, "billing row created concurrently; skipping");
                }
                Err(err) => return Err(err),
            }
        }
        info!(
            contract_id,
            rows = outcome.created.len(),
            frequency = %terms.frequency,
            "billing schedule generated"
        );
        outcome.terms = Some(terms);
        Ok(outcome)
    }

    /// Moves a billing row through its lifecycle, stamping invoice/payment facts.
    /// Re-applying the current status is a no-op.
    pub fn transition(
        ctx: &EngineContext<'_>,
        billing_id: &str,
        next: BillingStatus,
        at: DateTime<Utc>,
        paid_amount: Option<Decimal>,
    ) -> Result<BillingSchedule, CoreError> {
        let mut row = ctx
            .repo
            .billing_schedule(billing_id)?
            .ok_or_else(|| CoreError::NotFound(format!("billing schedule {billing_id}")))?;
        if row.status == next {
            return Ok(row);
        }
        if !row.status.can_transition_to(next) {
            return Err(CoreError::FailedPrecondition(format!(
                "billing schedule {billing_id} cannot move from {} to {next}",
                row.status
            )));
        }
        if let Some(amount) = paid_amount {
            if amount <= Decimal::ZERO {
                return Err(CoreError::InvalidArgument(
                    "paid amount must be positive".into(),
                ));
            }
        }

        match next {
            BillingStatus::Invoiced => row.invoiced_at = Some(at),
            BillingStatus::Paid => {
                row.paid_at = Some(at);
                row.paid_amount = Some(paid_amount.unwrap_or(row.amount));
            }
            BillingStatus::Scheduled | BillingStatus::Overdue | BillingStatus::Cancelled => {}
        }
        let previous = row.status;
        row.status = next;
        row.updated_at = Some(ctx.clock.now());
        ctx.repo.update_fields(
            collections::BILLING_SCHEDULES,
            billing_id,
            serde_json::to_value(&row)?,
        )?;
        info!(billing_id, from = %previous, to = %next, "billing status changed");
        Ok(row)
    }

    fn terms_for(contract: &Contract, defaults: PaymentTerms) -> PaymentTerms {
        match contract.payment_terms.as_deref() {
            Some(text) => PaymentTerms::parse(text, defaults),
            None => defaults,
        }
    }
}
