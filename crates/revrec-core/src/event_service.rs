//! Reconstructs the ordered invoice/cash/revenue event stream for a contract from persisted
//! billing and obligation state.

use std::{cmp::Ordering, fmt};

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use revrec_domain::{
    date_start_utc, BillingSchedule, BillingStatus, Contract, PerformanceObligation,
    RecognitionMethod, RevenueSchedule,
};

use crate::{modification_service::VersionTimeline, repository::Repository, CoreError};

/// Ordering of the variants is the same-timestamp tiebreak: invoices settle before cash,
/// cash before revenue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Invoice,
    Cash,
    Revenue,
}

impl EventKind {
    /// Short tag used inside posting keys.
    pub fn key_tag(self) -> &'static str {
        match self {
            EventKind::Invoice => "INV",
            EventKind::Cash => "CASH",
            EventKind::Revenue => "REV",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EventKind::Invoice => "invoice",
            EventKind::Cash => "cash",
            EventKind::Revenue => "revenue",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEvent {
    pub kind: EventKind,
    pub date: DateTime<Utc>,
    pub amount: Decimal,
    /// Billing schedule id for invoice/cash events, obligation id for revenue events.
    pub source_id: String,
    /// `YYYY-MM` the event belongs to.
    pub period_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period_start: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period_end: Option<NaiveDate>,
}

impl LedgerEvent {
    pub fn new(
        kind: EventKind,
        date: DateTime<Utc>,
        amount: Decimal,
        source_id: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            date,
            amount,
            source_id: source_id.into(),
            period_key: date.format("%Y-%m").to_string(),
            period_start: None,
            period_end: None,
        }
    }

    pub fn with_period(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.period_key = start.format("%Y-%m").to_string();
        self.period_start = Some(start);
        self.period_end = Some(end);
        self
    }

    fn replay_order(&self, other: &Self) -> Ordering {
        self.date
            .cmp(&other.date)
            .then(self.kind.cmp(&other.kind))
            .then_with(|| self.source_id.cmp(&other.source_id))
            .then_with(|| self.period_key.cmp(&other.period_key))
    }
}

/// Sorts events into replay order: date, then kind, then source id, then period.
/// The result does not depend on the input order.
pub fn sort_events(events: &mut [LedgerEvent]) {
    events.sort_by(LedgerEvent::replay_order);
}

/// An obligation together with its current revenue schedule rows.
#[derive(Debug, Clone)]
pub struct ObligationSchedule {
    pub obligation: PerformanceObligation,
    pub rows: Vec<RevenueSchedule>,
}

/// Builds the sorted event stream up to and including `up_to`. Events without a date, with
/// a non-positive amount, or dated after the horizon are dropped.
pub fn extract_events(
    billing: &[BillingSchedule],
    obligations: &[ObligationSchedule],
    up_to: DateTime<Utc>,
) -> Vec<LedgerEvent> {
    let mut events = Vec::new();

    for row in billing {
        let period = row.billing_date;
        if row.status.is_billed() {
            if let Some(date) = row.invoice_date() {
                events.push(billing_event(EventKind::Invoice, row, date, row.amount, period));
            }
        }
        if row.status == BillingStatus::Paid {
            if let Some(date) = row.cash_date() {
                events.push(billing_event(EventKind::Cash, row, date, row.cash_amount(), period));
            }
        }
    }

    for ObligationSchedule { obligation, rows } in obligations {
        match obligation.recognition_method {
            RecognitionMethod::PointInTime => {
                if let (true, Some(date)) = (obligation.is_satisfied, obligation.satisfied_date) {
                    events.push(LedgerEvent::new(
                        EventKind::Revenue,
                        date,
                        obligation.allocated_price,
                        obligation.id.clone(),
                    ));
                }
            }
            RecognitionMethod::OverTime => {
                for row in rows {
                    events.push(
                        LedgerEvent::new(
                            EventKind::Revenue,
                            date_start_utc(row.period_end),
                            row.scheduled_amount,
                            obligation.id.clone(),
                        )
                        .with_period(row.period_start, row.period_end),
                    );
                }
            }
        }
    }

    events.retain(|event| event.amount > Decimal::ZERO && event.date <= up_to);
    sort_events(&mut events);
    events
}

fn billing_event(
    kind: EventKind,
    row: &BillingSchedule,
    date: DateTime<Utc>,
    amount: Decimal,
    billing_date: Option<NaiveDate>,
) -> LedgerEvent {
    let mut event = LedgerEvent::new(kind, date, amount, row.id.clone());
    if let Some(billing_date) = billing_date {
        event.period_key = billing_date.format("%Y-%m").to_string();
    }
    event
}

/// Loads the persisted inputs for a contract's event stream.
pub struct EventSourcer;

impl EventSourcer {
    /// Reads billing rows plus, for every version up to the current one, the obligations
    /// and schedule rows that version owns, then extracts the events up to `up_to`.
    pub fn load(
        repo: &Repository<'_>,
        contract: &Contract,
        up_to: DateTime<Utc>,
    ) -> Result<Vec<LedgerEvent>, CoreError> {
        let billing = repo.billing_schedules(&contract.id)?;
        let obligations = match contract.current_version_id.as_deref() {
            Some(version_id) => match repo.version(version_id)? {
                Some(version) => VersionTimeline::load(repo, &version)?.owned_obligations(),
                None => Self::version_obligations(repo, version_id)?,
            },
            None => Vec::new(),
        };
        Ok(extract_events(&billing, &obligations, up_to))
    }

    fn version_obligations(
        repo: &Repository<'_>,
        version_id: &str,
    ) -> Result<Vec<ObligationSchedule>, CoreError> {
        let mut obligations = Vec::new();
        for obligation in repo.obligations(version_id)? {
            let rows = repo.schedules_for_obligation(&obligation.id)?;
            obligations.push(ObligationSchedule { obligation, rows });
        }
        Ok(obligations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn ties_break_by_kind_then_source() {
        let date = at(2025, 1, 31);
        let mut events = vec![
            LedgerEvent::new(EventKind::Revenue, date, dec!(1), "po-a"),
            LedgerEvent::new(EventKind::Cash, date, dec!(1), "bill-b"),
            LedgerEvent::new(EventKind::Invoice, date, dec!(1), "bill-b"),
            LedgerEvent::new(EventKind::Invoice, date, dec!(1), "bill-a"),
            LedgerEvent::new(EventKind::Invoice, at(2025, 1, 1), dec!(1), "bill-z"),
        ];
        sort_events(&mut events);
        let order: Vec<_> = events
            .iter()
            .map(|event| (event.kind, event.source_id.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![
                (EventKind::Invoice, "bill-z"),
                (EventKind::Invoice, "bill-a"),
                (EventKind::Invoice, "bill-b"),
                (EventKind::Cash, "bill-b"),
                (EventKind::Revenue, "po-a"),
            ]
        );
    }

    #[test]
    fn extraction_uses_status_and_horizon() {
        let mut invoiced = BillingSchedule::new("b1", "c1", day(2025, 1, 1), dec!(100));
        invoiced.status = BillingStatus::Invoiced;
        let mut paid = BillingSchedule::new("b2", "c1", day(2025, 2, 1), dec!(100));
        paid.status = BillingStatus::Paid;
        paid.paid_at = Some(at(2025, 2, 10));
        let scheduled = BillingSchedule::new("b3", "c1", day(2025, 3, 1), dec!(100));
        let mut late = BillingSchedule::new("b4", "c1", day(2025, 9, 1), dec!(100));
        late.status = BillingStatus::Invoiced;

        let events = extract_events(&[invoiced, paid, scheduled, late], &[], at(2025, 6, 30));
        let kinds: Vec<_> = events
            .iter()
            .map(|event| (event.kind, event.source_id.as_str()))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (EventKind::Invoice, "b1"),
                (EventKind::Invoice, "b2"),
                (EventKind::Cash, "b2"),
            ]
        );
        assert_eq!(events[2].period_key, "2025-02");
    }

    #[test]
    fn revenue_events_follow_recognition_method() {
        let mut satisfied =
            PerformanceObligation::new("po-pit", "c1", "v1", RecognitionMethod::PointInTime, dec!(5000));
        satisfied.mark_satisfied(at(2025, 3, 15));
        let open =
            PerformanceObligation::new("po-open", "c1", "v1", RecognitionMethod::PointInTime, dec!(10));
        let over_time =
            PerformanceObligation::new("po-ot", "c1", "v1", RecognitionMethod::OverTime, dec!(200));
        let rows = [(1, 31), (2, 28)]
            .into_iter()
            .map(|(month, last)| RevenueSchedule {
                id: String::new(),
                performance_obligation_id: "po-ot".into(),
                contract_id: "c1".into(),
                version_id: "v1".into(),
                period_start: day(2025, month, 1),
                period_end: day(2025, month, last),
                scheduled_amount: dec!(100),
                recognized_amount: Decimal::ZERO,
                is_recognized: false,
            })
            .collect();

        let events = extract_events(
            &[],
            &[
                ObligationSchedule { obligation: satisfied, rows: Vec::new() },
                ObligationSchedule { obligation: open, rows: Vec::new() },
                ObligationSchedule { obligation: over_time, rows },
            ],
            at(2025, 2, 28),
        );
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|event| event.source_id == "po-ot"));
        assert_eq!(events[0].period_key, "2025-01");
        assert_eq!(events[1].date, at(2025, 2, 28));
    }

    #[test]
    fn non_positive_amounts_are_dropped() {
        let mut zero = BillingSchedule::new("b1", "c1", day(2025, 1, 1), Decimal::ZERO);
        zero.status = BillingStatus::Invoiced;
        assert!(extract_events(&[zero], &[], at(2030, 1, 1)).is_empty());
    }
}
