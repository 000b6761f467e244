//! Performance obligations and their revenue schedules.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::common::*;
use crate::contract::{LineItem, MeasurementMethod, RecognitionMethod};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
/// A distinct promise to transfer goods or services; the unit of allocation.
pub struct PerformanceObligation {
    #[serde(default)]
    pub id: String,
    pub contract_id: String,
    pub version_id: String,
    #[serde(default)]
    pub line_item_ids: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub recognition_method: RecognitionMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measurement_method: Option<MeasurementMethod>,
    #[serde(default)]
    pub allocated_price: Decimal,
    #[serde(default)]
    pub percent_complete: Decimal,
    #[serde(default)]
    pub recognized_amount: Decimal,
    #[serde(default)]
    pub deferred_amount: Decimal,
    /// Only meaningful for point-in-time obligations.
    #[serde(default)]
    pub is_satisfied: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub satisfied_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
}

impl PerformanceObligation {
    pub fn new(
        id: impl Into<String>,
        contract_id: impl Into<String>,
        version_id: impl Into<String>,
        recognition_method: RecognitionMethod,
        allocated_price: Decimal,
    ) -> Self {
        Self {
            id: id.into(),
            contract_id: contract_id.into(),
            version_id: version_id.into(),
            line_item_ids: Vec::new(),
            description: String::new(),
            recognition_method,
            measurement_method: None,
            allocated_price,
            percent_complete: Decimal::ZERO,
            recognized_amount: Decimal::ZERO,
            deferred_amount: allocated_price,
            is_satisfied: false,
            satisfied_date: None,
            start_date: None,
            end_date: None,
        }
    }

    /// Derives an obligation from a distinct line item, copying its method, price and window.
    pub fn from_line_item(id: impl Into<String>, item: &LineItem) -> Self {
        let mut obligation = Self::new(
            id,
            item.contract_id.clone(),
            item.version_id.clone(),
            item.recognition_method,
            item.total_price,
        );
        obligation.line_item_ids = vec![item.id.clone()];
        obligation.description = item.description.clone();
        obligation.measurement_method = item.measurement_method;
        obligation.start_date = item.delivery_start_date;
        obligation.end_date = item.delivery_end_date;
        obligation
    }

    pub fn mark_satisfied(&mut self, at: DateTime<Utc>) {
        self.is_satisfied = true;
        self.satisfied_date = Some(at);
    }

    /// `recognized + deferred == allocated`.
    pub fn is_conserved(&self) -> bool {
        self.recognized_amount + self.deferred_amount == self.allocated_price
    }
}

impl Identifiable for PerformanceObligation {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
/// One recognition row for an obligation; monthly for over-time obligations.
pub struct RevenueSchedule {
    #[serde(default)]
    pub id: String,
    pub performance_obligation_id: String,
    pub contract_id: String,
    pub version_id: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub scheduled_amount: Decimal,
    #[serde(default)]
    pub recognized_amount: Decimal,
    #[serde(default)]
    pub is_recognized: bool,
}

impl RevenueSchedule {
    /// `YYYY-MM` of the period start, used as a posting key component.
    pub fn period_key(&self) -> String {
        self.period_start.format("%Y-%m").to_string()
    }
}

impl Identifiable for RevenueSchedule {
    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn obligation_from_line_item_copies_economics() {
        let mut item = LineItem::new("li-1", "c1", "v1", dec!(5000), RecognitionMethod::PointInTime);
        item.description = "Implementation".into();
        let po = PerformanceObligation::from_line_item("po-1", &item);
        assert_eq!(po.line_item_ids, vec!["li-1".to_string()]);
        assert_eq!(po.allocated_price, dec!(5000));
        assert_eq!(po.recognition_method, RecognitionMethod::PointInTime);
        assert!(po.is_conserved());
    }
}
