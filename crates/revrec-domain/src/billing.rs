//! Billing schedule rows, their status lifecycle, and billing cadences.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::common::*;
use crate::period::date_start_utc;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
/// `scheduled -> invoiced -> paid`, with `overdue` and `cancelled` side exits.
pub enum BillingStatus {
    #[default]
    Scheduled,
    Invoiced,
    Paid,
    Overdue,
    Cancelled,
}

impl BillingStatus {
    /// Whether moving from `self` to `next` is a legal lifecycle step.
    pub fn can_transition_to(self, next: BillingStatus) -> bool {
        use BillingStatus::*;
        matches!(
            (self, next),
            (Scheduled, Invoiced)
                | (Invoiced, Paid)
                | (Overdue, Paid)
                | (Scheduled, Overdue)
                | (Invoiced, Overdue)
                | (Scheduled, Cancelled)
        )
    }

    /// Rows in these states count toward billed-to-date.
    pub fn is_billed(self) -> bool {
        matches!(self, BillingStatus::Invoiced | BillingStatus::Paid)
    }
}

impl fmt::Display for BillingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BillingStatus::Scheduled => "scheduled",
            BillingStatus::Invoiced => "invoiced",
            BillingStatus::Paid => "paid",
            BillingStatus::Overdue => "overdue",
            BillingStatus::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum BillingFrequency {
    #[default]
    Monthly,
    Quarterly,
    SemiAnnual,
    Annual,
    OneTime,
}

impl BillingFrequency {
    /// Months per billing period; `None` for a single up-front invoice.
    pub fn period_months(self) -> Option<u32> {
        match self {
            BillingFrequency::Monthly => Some(1),
            BillingFrequency::Quarterly => Some(3),
            BillingFrequency::SemiAnnual => Some(6),
            BillingFrequency::Annual => Some(12),
            BillingFrequency::OneTime => None,
        }
    }
}

impl fmt::Display for BillingFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BillingFrequency::Monthly => "monthly",
            BillingFrequency::Quarterly => "quarterly",
            BillingFrequency::SemiAnnual => "semi_annual",
            BillingFrequency::Annual => "annual",
            BillingFrequency::OneTime => "one_time",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BillingSchedule {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub tenant_id: String,
    pub contract_id: String,
    #[serde(default)]
    pub period_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    pub amount: Decimal,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub status: BillingStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<BillingFrequency>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoiced_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_amount: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl BillingSchedule {
    pub fn new(
        id: impl Into<String>,
        contract_id: impl Into<String>,
        billing_date: NaiveDate,
        amount: Decimal,
    ) -> Self {
        Self {
            id: id.into(),
            tenant_id: String::new(),
            contract_id: contract_id.into(),
            period_number: 1,
            billing_date: Some(billing_date),
            due_date: None,
            amount,
            currency: default_currency(),
            status: BillingStatus::Scheduled,
            frequency: None,
            invoiced_at: None,
            paid_at: None,
            paid_amount: None,
            created_at: None,
            updated_at: None,
        }
    }

    /// When the invoice hit the books: `invoicedAt`, then `billingDate`, then `createdAt`.
    pub fn invoice_date(&self) -> Option<DateTime<Utc>> {
        self.invoiced_at
            .or_else(|| self.billing_date.map(date_start_utc))
            .or(self.created_at)
    }

    /// When cash arrived: `paidAt`, then `invoicedAt`, then `dueDate`, then `updatedAt`.
    pub fn cash_date(&self) -> Option<DateTime<Utc>> {
        self.paid_at
            .or(self.invoiced_at)
            .or_else(|| self.due_date.map(date_start_utc))
            .or(self.updated_at)
    }

    pub fn cash_amount(&self) -> Decimal {
        self.paid_amount.unwrap_or(self.amount)
    }
}

impl Identifiable for BillingSchedule {
    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[test]
    fn lifecycle_allows_only_forward_steps() {
        use BillingStatus::*;
        assert!(Scheduled.can_transition_to(Invoiced));
        assert!(Invoiced.can_transition_to(Paid));
        assert!(Invoiced.can_transition_to(Overdue));
        assert!(Scheduled.can_transition_to(Cancelled));
        assert!(!Paid.can_transition_to(Invoiced));
        assert!(!Invoiced.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Invoiced));
        assert!(!Scheduled.can_transition_to(Paid));
    }

    #[test]
    fn invoice_and_cash_dates_fall_back_in_order() {
        let billing_date = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let mut row = BillingSchedule::new("b1", "c1", billing_date, dec!(100));
        assert_eq!(row.invoice_date(), Some(date_start_utc(billing_date)));
        assert_eq!(row.cash_date(), None);

        row.due_date = NaiveDate::from_ymd_opt(2025, 3, 31);
        assert_eq!(row.cash_date(), row.due_date.map(date_start_utc));

        let invoiced = Utc.with_ymd_and_hms(2025, 3, 2, 9, 0, 0).unwrap();
        row.invoiced_at = Some(invoiced);
        assert_eq!(row.invoice_date(), Some(invoiced));
        assert_eq!(row.cash_date(), Some(invoiced));

        let paid = Utc.with_ymd_and_hms(2025, 3, 20, 9, 0, 0).unwrap();
        row.paid_at = Some(paid);
        row.paid_amount = Some(dec!(60));
        assert_eq!(row.cash_date(), Some(paid));
        assert_eq!(row.cash_amount(), dec!(60));
    }
}
