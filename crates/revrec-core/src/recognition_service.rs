//! Five-step revenue recognition: identify the contract, identify obligations, price the
//! contract, allocate the price, and schedule recognition.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::{info, warn};

use revrec_domain::{
    monthly_periods, months_between, positive_part, round2, split_evenly, BillingSchedule,
    BillingStatus, Contract, ContractBalance, ContractVersion, LineItem, PerformanceObligation,
    Period, RecognitionMethod, RevenueSchedule, VariableConsideration,
};

use crate::{
    context::EngineContext,
    modification_service::{split_prior_revenue, VersionTimeline},
    storage::collections,
    CoreError,
};

#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionRequest {
    pub contract_id: String,
    /// Falls back to the contract's current version.
    pub version_id: Option<String>,
    /// Periods ending on or before this date count as recognized.
    pub as_of: DateTime<Utc>,
}

impl RecognitionRequest {
    pub fn new(contract_id: impl Into<String>, as_of: DateTime<Utc>) -> Self {
        Self {
            contract_id: contract_id.into(),
            version_id: None,
            as_of,
        }
    }

    pub fn for_version(mut self, version_id: impl Into<String>) -> Self {
        self.version_id = Some(version_id.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionPrice {
    pub fixed_price: Decimal,
    /// Unconstrained variable estimates; these are included.
    pub variable_consideration: Decimal,
    /// Constrained variable estimates, deducted from the total.
    pub constrained_amount: Decimal,
    pub financing_component: Decimal,
    pub total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Allocation {
    pub performance_obligation_id: String,
    pub standalone_selling_price: Decimal,
    /// Share of the transaction price, in `[0, 1]`.
    pub percentage: Decimal,
    pub allocated_amount: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognitionTotals {
    pub allocated: Decimal,
    pub recognized: Decimal,
    pub deferred: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognitionResult {
    pub contract_id: String,
    pub version_id: String,
    pub version_number: u32,
    pub contract_modified: bool,
    pub is_prospective: bool,
    pub transaction_price: TransactionPrice,
    pub allocations: Vec<Allocation>,
    pub obligations: Vec<PerformanceObligation>,
    pub schedule: Vec<RevenueSchedule>,
    pub totals: RecognitionTotals,
    pub balance: ContractBalance,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

/// A recompute that aborted, carrying whatever diagnostics were gathered before the abort.
#[derive(Debug, Error)]
#[error("{source}")]
pub struct RecognitionFailure {
    pub source: CoreError,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl RecognitionFailure {
    pub fn code(&self) -> &'static str {
        self.source.code()
    }
}

impl From<CoreError> for RecognitionFailure {
    fn from(source: CoreError) -> Self {
        Self {
            source,
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
struct Diagnostics {
    warnings: Vec<String>,
    errors: Vec<String>,
}

impl Diagnostics {
    fn warn(&mut self, contract_id: &str, message: String) {
        warn!(contract_id, "{message}");
        self.warnings.push(message);
    }

    fn error(&mut self, contract_id: &str, message: String) {
        warn!(contract_id, "{message}");
        self.errors.push(message);
    }
}

/// `fixed + variable - constrained + financing`. Financing is never discounted, so its
/// component is always zero.
pub fn transaction_price(
    version: &ContractVersion,
    considerations: &[VariableConsideration],
) -> TransactionPrice {
    let (constrained, unconstrained): (Vec<_>, Vec<_>) = considerations
        .iter()
        .partition(|consideration| consideration.constraint_applied);
    let variable_consideration: Decimal = unconstrained
        .iter()
        .map(|consideration| consideration.estimated_amount)
        .sum();
    let constrained_amount: Decimal = constrained
        .iter()
        .map(|consideration| consideration.estimated_amount)
        .sum();
    let financing_component = Decimal::ZERO;
    TransactionPrice {
        fixed_price: version.total_value,
        variable_consideration,
        constrained_amount,
        financing_component,
        total: version.total_value + variable_consideration - constrained_amount
            + financing_component,
    }
}

/// Splits `price` across obligations in proportion to their standalone selling prices.
///
/// An obligation's SSP is the sum of its line items' selling prices, or its current
/// allocated price when it references no known line item. With zero total SSP the price is
/// split equally.
pub fn allocate(
    obligations: &[PerformanceObligation],
    line_items: &[LineItem],
    price: Decimal,
) -> Vec<Allocation> {
    if obligations.is_empty() {
        return Vec::new();
    }
    let ssps: Vec<Decimal> = obligations
        .iter()
        .map(|obligation| {
            let related: Vec<&LineItem> = line_items
                .iter()
                .filter(|item| obligation.line_item_ids.contains(&item.id))
                .collect();
            if related.is_empty() {
                obligation.allocated_price
            } else {
                related.iter().map(|item| item.selling_price()).sum()
            }
        })
        .collect();
    let total_ssp: Decimal = ssps.iter().copied().sum();
    let equal_share = Decimal::ONE / Decimal::from(obligations.len());

    obligations
        .iter()
        .zip(ssps)
        .map(|(obligation, ssp)| {
            let percentage = if total_ssp.is_zero() {
                equal_share
            } else {
                ssp / total_ssp
            };
            Allocation {
                performance_obligation_id: obligation.id.clone(),
                standalone_selling_price: ssp,
                percentage,
                allocated_amount: round2(price * percentage),
            }
        })
        .collect()
}

/// Builds the revenue schedule for one obligation as of `as_of`.
///
/// Point-in-time obligations get one row at `contract_start`, recognized only when
/// satisfied. Over-time obligations get one straight-line row per calendar month of their
/// delivery window (falling back to the contract window), with the remainder on the last
/// row. Returns `None` when the needed dates are unknown.
pub fn build_schedule(
    obligation: &PerformanceObligation,
    contract_start: Option<NaiveDate>,
    contract_end: Option<NaiveDate>,
    as_of: NaiveDate,
) -> Option<Vec<RevenueSchedule>> {
    let amount = obligation.allocated_price;
    match obligation.recognition_method {
        RecognitionMethod::PointInTime => {
            let date = contract_start.or(obligation.start_date)?;
            let recognized = if obligation.is_satisfied {
                amount
            } else {
                Decimal::ZERO
            };
            Some(vec![schedule_row(obligation, date, date, amount, recognized)])
        }
        RecognitionMethod::OverTime => {
            let start = obligation.start_date.or(contract_start)?;
            let end = obligation.end_date.or(contract_end)?;
            let periods = monthly_periods(start, end);
            if periods.is_empty() {
                return None;
            }
            let amounts = split_evenly(amount, periods.len());
            Some(period_rows(obligation, &periods, &amounts, as_of))
        }
    }
}

/// Builds the schedule of an obligation in a contract modification that took over on
/// `takeover`, after `prior` of its price was recognized under earlier versions.
///
/// Over-time obligations only get rows from the takeover date on, carrying the remaining
/// `allocated - prior`. Prospective modifications spread it straight-line. Otherwise each
/// remaining month keeps its share of the full-window straight line and the first one absorbs
/// the cumulative catch-up; a negative catch-up is carried into later months. When the
/// delivery window ended before the takeover, the remainder lands in one row on that day.
/// Point-in-time obligations are scheduled as in [`build_schedule`].
pub fn build_modified_schedule(
    obligation: &PerformanceObligation,
    contract_start: Option<NaiveDate>,
    contract_end: Option<NaiveDate>,
    as_of: NaiveDate,
    takeover: NaiveDate,
    prior: Decimal,
    prospective: bool,
) -> Option<Vec<RevenueSchedule>> {
    if obligation.recognition_method == RecognitionMethod::PointInTime {
        return build_schedule(obligation, contract_start, contract_end, as_of);
    }
    let start = obligation.start_date.or(contract_start)?;
    let end = obligation.end_date.or(contract_end)?;
    let full = monthly_periods(start, end);
    if full.is_empty() {
        return None;
    }
    let remaining = positive_part(obligation.allocated_price - prior);
    let periods = monthly_periods(start.max(takeover), end);
    if periods.is_empty() {
        let recognized = if takeover <= as_of {
            remaining
        } else {
            Decimal::ZERO
        };
        return Some(vec![schedule_row(
            obligation, takeover, takeover, remaining, recognized,
        )]);
    }
    let amounts = if prospective {
        split_evenly(remaining, periods.len())
    } else {
        catch_up(obligation.allocated_price, &full, &periods, remaining)
    };
    Some(period_rows(obligation, &periods, &amounts, as_of))
}

/// Full-window straight-line amounts for `periods`, adjusted so they sum to `remaining`
/// without any month going negative.
fn catch_up(allocated: Decimal, full: &[Period], periods: &[Period], remaining: Decimal) -> Vec<Decimal> {
    let nominal: HashMap<String, Decimal> = full
        .iter()
        .map(Period::key)
        .zip(split_evenly(allocated, full.len()))
        .collect();
    let mut amounts: Vec<Decimal> = periods
        .iter()
        .map(|period| nominal.get(&period.key()).copied().unwrap_or_default())
        .collect();
    let adjustment = remaining - amounts.iter().copied().sum::<Decimal>();
    if let Some(first) = amounts.first_mut() {
        *first += adjustment;
    }
    let mut carry = Decimal::ZERO;
    for amount in amounts.iter_mut() {
        *amount += carry;
        carry = (*amount).min(Decimal::ZERO);
        *amount -= carry;
    }
    for amount in amounts.iter_mut().rev() {
        if carry.is_zero() {
            break;
        }
        let taken = (-carry).min(*amount);
        *amount -= taken;
        carry += taken;
    }
    amounts
}

fn period_rows(
    obligation: &PerformanceObligation,
    periods: &[Period],
    amounts: &[Decimal],
    as_of: NaiveDate,
) -> Vec<RevenueSchedule> {
    periods
        .iter()
        .zip(amounts)
        .map(|(period, &scheduled)| {
            let recognized = if period.has_ended(as_of) {
                scheduled
            } else {
                Decimal::ZERO
            };
            schedule_row(obligation, period.start, period.end, scheduled, recognized)
        })
        .collect()
}

fn schedule_row(
    obligation: &PerformanceObligation,
    start: NaiveDate,
    end: NaiveDate,
    scheduled: Decimal,
    recognized: Decimal,
) -> RevenueSchedule {
    let mut row = RevenueSchedule {
        id: String::new(),
        performance_obligation_id: obligation.id.clone(),
        contract_id: obligation.contract_id.clone(),
        version_id: obligation.version_id.clone(),
        period_start: start,
        period_end: end,
        scheduled_amount: scheduled,
        recognized_amount: recognized,
        is_recognized: !scheduled.is_zero() && recognized == scheduled,
    };
    row.id = format!("{}-rs-{}", obligation.id, row.period_key());
    row
}

/// Sets recognized/deferred/percent-complete on `obligation` from its schedule rows plus what
/// earlier versions already recognized.
fn apply_progress(obligation: &mut PerformanceObligation, prior: Decimal, rows: &[RevenueSchedule]) {
    let recognized = prior + rows.iter().map(|row| row.recognized_amount).sum::<Decimal>();
    obligation.recognized_amount = recognized;
    obligation.deferred_amount = obligation.allocated_price - recognized;
    obligation.percent_complete = if obligation.allocated_price.is_zero() {
        Decimal::ZERO
    } else {
        round2(recognized / obligation.allocated_price * Decimal::ONE_HUNDRED)
    };
}

/// Billed-to-date and cash-to-date from billing rows. Only invoiced and paid rows count.
pub fn billing_totals(rows: &[BillingSchedule]) -> (Decimal, Decimal) {
    rows.iter()
        .filter(|row| row.status.is_billed())
        .fold((Decimal::ZERO, Decimal::ZERO), |(billed, cash), row| {
            let paid = if row.status == BillingStatus::Paid {
                row.cash_amount()
            } else {
                Decimal::ZERO
            };
            (billed + row.amount, cash + paid)
        })
}

/// Runs the full recompute for a contract version. Obligations and schedules are replaced,
/// never appended, so reruns converge.
pub struct RecognitionEngine;

impl RecognitionEngine {
    pub fn run(
        ctx: &EngineContext<'_>,
        request: &RecognitionRequest,
    ) -> Result<RecognitionResult, RecognitionFailure> {
        let mut diagnostics = Diagnostics::default();
        match Self::recompute(ctx, request, &mut diagnostics) {
            Ok(result) => Ok(result),
            Err(source) => {
                warn!(
                    contract_id = %request.contract_id,
                    code = source.code(),
                    "recognition aborted: {source}"
                );
                Err(RecognitionFailure {
                    source,
                    warnings: diagnostics.warnings,
                    errors: diagnostics.errors,
                })
            }
        }
    }

    fn recompute(
        ctx: &EngineContext<'_>,
        request: &RecognitionRequest,
        diagnostics: &mut Diagnostics,
    ) -> Result<RecognitionResult, CoreError> {
        let contract_id = request.contract_id.trim();
        if contract_id.is_empty() {
            return Err(CoreError::InvalidArgument("contractId is required".into()));
        }
        let as_of = request.as_of.date_naive();

        // Step 1: identify the contract.
        let contract = ctx
            .repo
            .contract(contract_id)?
            .ok_or_else(|| CoreError::NotFound(format!("contract {contract_id}")))?;
        let version_id = request
            .version_id
            .clone()
            .or_else(|| contract.current_version_id.clone())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                CoreError::FailedPrecondition(format!("contract {contract_id} has no version"))
            })?;
        let mut version = ctx
            .repo
            .version(&version_id)?
            .filter(|version| version.contract_id == contract_id)
            .ok_or_else(|| CoreError::NotFound(format!("contract version {version_id}")))?;

        // Step 2: identify performance obligations.
        let line_items = ctx.repo.line_items(&version_id)?;
        let mut obligations = ctx.repo.obligations(&version_id)?;
        if obligations.is_empty() {
            obligations = Self::derive_obligations(ctx, &version_id, &line_items, diagnostics)?;
        }

        // Step 3: determine the transaction price.
        let considerations = ctx.repo.considerations(&version_id)?;
        let price = transaction_price(&version, &considerations);
        if !price.constrained_amount.is_zero() {
            diagnostics.warn(
                contract_id,
                format!(
                    "constrained variable consideration of {} excluded from the transaction price",
                    price.constrained_amount
                ),
            );
        }
        Self::check_financing(ctx, &contract, diagnostics);

        // Step 4: allocate.
        let allocations = allocate(&obligations, &line_items, price.total);
        for (obligation, allocation) in obligations.iter_mut().zip(&allocations) {
            obligation.allocated_price = allocation.allocated_amount;
        }

        // Step 5: schedule and recognize.
        let timeline = VersionTimeline::load(&ctx.repo, &version)?;
        let takeover = timeline.takeover_date();
        let (prior_owned, prior_recognized) = match takeover {
            Some(takeover) => {
                Self::record_takeover(ctx, &mut version, takeover)?;
                let owned = timeline.prior_over_time_revenue(None);
                info!(
                    contract_id,
                    version_id = %version_id,
                    takeover = %takeover,
                    prior = %owned,
                    "modification takes over recognition"
                );
                (
                    split_prior_revenue(&obligations, owned),
                    split_prior_revenue(&obligations, timeline.prior_over_time_revenue(Some(as_of))),
                )
            }
            None => (
                vec![Decimal::ZERO; obligations.len()],
                vec![Decimal::ZERO; obligations.len()],
            ),
        };
        if takeover.is_some()
            && !obligations
                .iter()
                .any(|po| po.recognition_method == RecognitionMethod::OverTime)
        {
            diagnostics.warn(
                contract_id,
                "earlier versions recognized revenue over time but this version has no over-time obligation to carry it".into(),
            );
        }

        let (start, end) = (contract.start(), contract.end());
        let mut schedule = Vec::new();
        for ((obligation, prior), recognized_before) in
            obligations.iter_mut().zip(prior_owned).zip(prior_recognized)
        {
            if prior > obligation.allocated_price {
                diagnostics.warn(
                    contract_id,
                    format!(
                        "obligation {} had {prior} recognized under earlier versions, above its allocated {}",
                        obligation.id, obligation.allocated_price
                    ),
                );
            }
            let built = match takeover {
                Some(takeover) => build_modified_schedule(
                    obligation,
                    start,
                    end,
                    as_of,
                    takeover,
                    prior,
                    version.is_prospective,
                ),
                None => build_schedule(obligation, start, end, as_of),
            };
            let rows = match built {
                Some(rows) => rows,
                None => {
                    diagnostics.error(
                        contract_id,
                        format!(
                            "obligation {} has no usable delivery window; nothing scheduled",
                            obligation.id
                        ),
                    );
                    Vec::new()
                }
            };
            apply_progress(obligation, recognized_before, &rows);
            Self::replace_schedule(ctx, obligation, &rows)?;
            ctx.repo.update_fields(
                collections::PERFORMANCE_OBLIGATIONS,
                &obligation.id,
                serde_json::to_value(&*obligation)?,
            )?;
            schedule.extend(rows);
        }

        let totals = RecognitionTotals {
            allocated: obligations.iter().map(|po| po.allocated_price).sum(),
            recognized: obligations.iter().map(|po| po.recognized_amount).sum(),
            deferred: obligations.iter().map(|po| po.deferred_amount).sum(),
        };
        let balance = Self::snapshot_balance(ctx, contract_id, &version_id, request.as_of, totals.recognized)?;

        info!(
            contract_id,
            version_id = %version_id,
            obligations = obligations.len(),
            rows = schedule.len(),
            recognized = %totals.recognized,
            "recognition recomputed"
        );
        Ok(RecognitionResult {
            contract_id: contract_id.to_string(),
            version_id,
            version_number: version.version_number,
            contract_modified: version.is_modification(),
            is_prospective: version.is_prospective,
            transaction_price: price,
            allocations,
            obligations,
            schedule,
            totals,
            balance,
            warnings: std::mem::take(&mut diagnostics.warnings),
            errors: std::mem::take(&mut diagnostics.errors),
        })
    }

    /// One obligation per separately identifiable line item, persisted under a stable id.
    fn derive_obligations(
        ctx: &EngineContext<'_>,
        version_id: &str,
        line_items: &[LineItem],
        diagnostics: &mut Diagnostics,
    ) -> Result<Vec<PerformanceObligation>, CoreError> {
        let contract_id = line_items
            .first()
            .map(|item| item.contract_id.as_str())
            .unwrap_or_default();
        if line_items.is_empty() {
            diagnostics.warn(
                contract_id,
                format!("version {version_id} has no performance obligations or line items"),
            );
            return Ok(Vec::new());
        }
        let derived: Vec<PerformanceObligation> = line_items
            .iter()
            .filter(|item| item.is_separate_obligation())
            .map(|item| {
                PerformanceObligation::from_line_item(format!("{version_id}-po-{}", item.id), item)
            })
            .collect();
        for obligation in &derived {
            ctx.repo
                .upsert(collections::PERFORMANCE_OBLIGATIONS, obligation)?;
        }
        diagnostics.warn(
            contract_id,
            format!(
                "no performance obligations found, derived {} from line items",
                derived.len()
            ),
        );
        Ok(derived)
    }

    /// Pins a derived takeover date on the version so later recomputes of earlier versions
    /// cannot move it.
    fn record_takeover(
        ctx: &EngineContext<'_>,
        version: &mut ContractVersion,
        takeover: NaiveDate,
    ) -> Result<(), CoreError> {
        if version.effective_date.is_none() {
            ctx.repo.update_fields(
                collections::CONTRACT_VERSIONS,
                &version.id,
                json!({ "effectiveDate": takeover }),
            )?;
            version.effective_date = Some(takeover);
        }
        Ok(())
    }

    fn check_financing(ctx: &EngineContext<'_>, contract: &Contract, diagnostics: &mut Diagnostics) {
        let (Some(start), Some(end)) = (contract.start(), contract.end()) else {
            return;
        };
        let months = months_between(start, end);
        if months > ctx.options.financing_warning_months {
            diagnostics.warn(
                &contract.id,
                format!(
                    "contract spans {months} months; a significant financing component may exist and is not computed"
                ),
            );
        }
    }

    fn replace_schedule(
        ctx: &EngineContext<'_>,
        obligation: &PerformanceObligation,
        rows: &[RevenueSchedule],
    ) -> Result<(), CoreError> {
        let existing = ctx.repo.schedules_for_obligation(&obligation.id)?;
        ctx.repo.delete_all(
            collections::REVENUE_SCHEDULES,
            existing.iter().map(|row| row.id.as_str()),
        )?;
        for row in rows {
            ctx.repo.upsert(collections::REVENUE_SCHEDULES, row)?;
        }
        Ok(())
    }

    fn snapshot_balance(
        ctx: &EngineContext<'_>,
        contract_id: &str,
        version_id: &str,
        as_of: DateTime<Utc>,
        recognized: Decimal,
    ) -> Result<ContractBalance, CoreError> {
        let billing = ctx.repo.billing_schedules(contract_id)?;
        let (billed, cash) = billing_totals(&billing);
        let mut balance = ContractBalance::from_totals(contract_id, as_of, billed, cash, recognized);
        balance.tenant_id = ctx.repo.tenant_id().to_string();
        balance.version_id = Some(version_id.to_string());
        balance.id = ctx.repo.append(collections::CONTRACT_BALANCES, &balance)?;
        Ok(balance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn consideration(amount: Decimal, constrained: bool) -> VariableConsideration {
        VariableConsideration {
            id: String::new(),
            contract_id: "c1".into(),
            version_id: "v1".into(),
            kind: "bonus".into(),
            estimation_method: None,
            estimated_amount: amount,
            constraint_applied: constrained,
            constraint_reason: None,
        }
    }

    #[test]
    fn transaction_price_excludes_constrained_estimates() {
        let version = ContractVersion::new("v1", "c1", 1, dec!(100000));
        let price = transaction_price(
            &version,
            &[consideration(dec!(5000), false), consideration(dec!(2000), true)],
        );
        assert_eq!(price.variable_consideration, dec!(5000));
        assert_eq!(price.constrained_amount, dec!(2000));
        assert_eq!(price.total, dec!(103000));
    }

    #[test]
    fn allocation_follows_standalone_selling_prices() {
        let mut license = LineItem::new("li-1", "c1", "v1", dec!(80000), RecognitionMethod::OverTime);
        license.standalone_selling_price = Some(dec!(90000));
        let setup = LineItem::new("li-2", "c1", "v1", dec!(20000), RecognitionMethod::PointInTime);
        let pos = vec![
            PerformanceObligation::from_line_item("po-1", &license),
            PerformanceObligation::from_line_item("po-2", &setup),
        ];
        let allocations = allocate(&pos, &[license, setup], dec!(100000));
        assert_eq!(allocations[0].allocated_amount, dec!(81818.18));
        assert_eq!(allocations[1].allocated_amount, dec!(18181.82));
        let total: Decimal = allocations.iter().map(|a| a.allocated_amount).sum();
        assert_eq!(total, dec!(100000));
    }

    #[test]
    fn allocation_splits_equally_without_selling_prices() {
        let pos = vec![
            PerformanceObligation::new("a", "c1", "v1", RecognitionMethod::OverTime, Decimal::ZERO),
            PerformanceObligation::new("b", "c1", "v1", RecognitionMethod::OverTime, Decimal::ZERO),
            PerformanceObligation::new("c", "c1", "v1", RecognitionMethod::OverTime, Decimal::ZERO),
        ];
        let allocations = allocate(&pos, &[], dec!(100));
        for allocation in &allocations {
            assert_eq!(allocation.allocated_amount, dec!(33.33));
        }
    }

    #[test]
    fn over_time_schedule_is_straight_line_with_remainder_last() {
        let po = PerformanceObligation::new("po-1", "c1", "v1", RecognitionMethod::OverTime, dec!(1000));
        let rows = build_schedule(&po, Some(d(2025, 1, 1)), Some(d(2025, 3, 31)), d(2025, 2, 28))
            .expect("window known");
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].scheduled_amount, dec!(333.33));
        assert_eq!(rows[2].scheduled_amount, dec!(333.34));
        assert!(rows[0].is_recognized);
        assert!(rows[1].is_recognized);
        assert!(!rows[2].is_recognized);
        assert_eq!(rows[2].recognized_amount, Decimal::ZERO);
        assert_eq!(rows[1].id, "po-1-rs-2025-02");
    }

    #[test]
    fn tiny_allocations_never_schedule_a_negative_month() {
        let po = PerformanceObligation::new("po-1", "c1", "v1", RecognitionMethod::OverTime, dec!(0.07));
        let rows = build_schedule(&po, Some(d(2025, 1, 1)), Some(d(2025, 9, 30)), d(2025, 1, 1))
            .expect("window known");
        assert_eq!(rows.len(), 9);
        assert!(rows.iter().all(|row| row.scheduled_amount >= Decimal::ZERO));
        assert_eq!(rows[8].scheduled_amount, dec!(0.07));
    }

    #[test]
    fn prospective_modification_spreads_the_remainder() {
        let po = PerformanceObligation::new("po-2", "c1", "v2", RecognitionMethod::OverTime, dec!(180000));
        let rows = build_modified_schedule(
            &po,
            Some(d(2025, 1, 1)),
            Some(d(2025, 12, 31)),
            d(2025, 7, 31),
            d(2025, 7, 1),
            dec!(60000),
            true,
        )
        .expect("window known");
        assert_eq!(rows.len(), 6);
        assert_eq!(rows[0].period_start, d(2025, 7, 1));
        assert!(rows.iter().all(|row| row.scheduled_amount == dec!(20000)));
        assert!(rows[0].is_recognized);
        assert!(!rows[1].is_recognized);
    }

    #[test]
    fn retrospective_modification_catches_up_in_the_first_remaining_month() {
        let raised = PerformanceObligation::new("po-2", "c1", "v2", RecognitionMethod::OverTime, dec!(180000));
        let window = (Some(d(2025, 1, 1)), Some(d(2025, 12, 31)));
        let rows = build_modified_schedule(&raised, window.0, window.1, d(2025, 6, 30), d(2025, 7, 1), dec!(60000), false)
            .unwrap();
        let amounts: Vec<Decimal> = rows.iter().map(|row| row.scheduled_amount).collect();
        assert_eq!(amounts[0], dec!(45000));
        assert!(amounts[1..].iter().all(|amount| *amount == dec!(15000)));

        let lowered = PerformanceObligation::new("po-3", "c1", "v2", RecognitionMethod::OverTime, dec!(96000));
        let rows = build_modified_schedule(&lowered, window.0, window.1, d(2025, 6, 30), d(2025, 7, 1), dec!(60000), false)
            .unwrap();
        let amounts: Vec<Decimal> = rows.iter().map(|row| row.scheduled_amount).collect();
        assert_eq!(amounts, vec![Decimal::ZERO, dec!(4000), dec!(8000), dec!(8000), dec!(8000), dec!(8000)]);
        assert_eq!(amounts.iter().copied().sum::<Decimal>(), dec!(36000));
    }

    #[test]
    fn modification_after_the_window_recognizes_the_remainder_at_takeover() {
        let po = PerformanceObligation::new("po-2", "c1", "v2", RecognitionMethod::OverTime, dec!(1200));
        let rows = build_modified_schedule(
            &po,
            Some(d(2025, 1, 1)),
            Some(d(2025, 12, 31)),
            d(2026, 2, 1),
            d(2026, 1, 15),
            dec!(1000),
            true,
        )
        .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].period_start, d(2026, 1, 15));
        assert_eq!(rows[0].recognized_amount, dec!(200));
    }

    #[test]
    fn point_in_time_schedule_waits_for_satisfaction() {
        let mut po =
            PerformanceObligation::new("po-1", "c1", "v1", RecognitionMethod::PointInTime, dec!(5000));
        let open = build_schedule(&po, Some(d(2025, 1, 1)), None, d(2025, 6, 1)).unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].recognized_amount, Decimal::ZERO);

        po.is_satisfied = true;
        let done = build_schedule(&po, Some(d(2025, 1, 1)), None, d(2025, 6, 1)).unwrap();
        assert_eq!(done[0].recognized_amount, dec!(5000));
        assert_eq!(done[0].period_start, d(2025, 1, 1));
    }

    #[test]
    fn schedule_needs_a_window() {
        let po = PerformanceObligation::new("po-1", "c1", "v1", RecognitionMethod::OverTime, dec!(10));
        assert!(build_schedule(&po, None, None, d(2025, 1, 1)).is_none());
    }

    #[test]
    fn billing_totals_ignore_scheduled_and_overdue_rows() {
        let mut rows: Vec<BillingSchedule> = (1..=4)
            .map(|n| BillingSchedule::new(format!("b{n}"), "c1", d(2025, n, 1), dec!(100)))
            .collect();
        rows[0].status = BillingStatus::Paid;
        rows[0].paid_amount = Some(dec!(90));
        rows[1].status = BillingStatus::Invoiced;
        rows[2].status = BillingStatus::Overdue;
        let (billed, cash) = billing_totals(&rows);
        assert_eq!(billed, dec!(200));
        assert_eq!(cash, dec!(90));
    }
}
