//! Contract, version, line item, and variable consideration models.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::common::*;
use crate::period::parse_flexible_date;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
/// Lifecycle state of a customer contract.
pub enum ContractStatus {
    #[default]
    Draft,
    Active,
    Modified,
    Terminated,
    Expired,
}

impl ContractStatus {
    /// Every status past draft must point at an existing version.
    pub fn requires_version(self) -> bool {
        !matches!(self, ContractStatus::Draft)
    }
}

impl fmt::Display for ContractStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ContractStatus::Draft => "draft",
            ContractStatus::Active => "active",
            ContractStatus::Modified => "modified",
            ContractStatus::Terminated => "terminated",
            ContractStatus::Expired => "expired",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub tenant_id: String,
    pub customer_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_number: Option<String>,
    pub total_value: Decimal,
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Raw intake value; may be unparsable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_terms: Option<String>,
    #[serde(default)]
    pub status: ContractStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_version_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Contract {
    pub fn new(
        id: impl Into<String>,
        tenant_id: impl Into<String>,
        customer_id: impl Into<String>,
        total_value: Decimal,
    ) -> Self {
        Self {
            id: id.into(),
            tenant_id: tenant_id.into(),
            customer_id: customer_id.into(),
            contract_number: None,
            total_value,
            currency: default_currency(),
            start_date: None,
            end_date: None,
            payment_terms: None,
            status: ContractStatus::Draft,
            current_version_id: None,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn with_dates(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.start_date = Some(start.to_string());
        self.end_date = Some(end.to_string());
        self
    }

    pub fn with_payment_terms(mut self, terms: impl Into<String>) -> Self {
        self.payment_terms = Some(terms.into());
        self
    }

    /// Activates the contract against `version_id`.
    pub fn activate(mut self, version_id: impl Into<String>) -> Self {
        self.current_version_id = Some(version_id.into());
        self.status = ContractStatus::Active;
        self
    }

    pub fn start(&self) -> Option<NaiveDate> {
        self.start_date.as_deref().and_then(parse_flexible_date)
    }

    pub fn end(&self) -> Option<NaiveDate> {
        self.end_date.as_deref().and_then(parse_flexible_date)
    }
}

impl Identifiable for Contract {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
/// Immutable snapshot of contract economics.
pub struct ContractVersion {
    #[serde(default)]
    pub id: String,
    pub contract_id: String,
    pub version_number: u32,
    pub total_value: Decimal,
    /// Caller-supplied: prospective modifications do not restate prior recognition.
    #[serde(default)]
    pub is_prospective: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modification_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl ContractVersion {
    pub fn new(
        id: impl Into<String>,
        contract_id: impl Into<String>,
        version_number: u32,
        total_value: Decimal,
    ) -> Self {
        Self {
            id: id.into(),
            contract_id: contract_id.into(),
            version_number,
            total_value,
            is_prospective: false,
            effective_date: None,
            modification_reason: None,
            created_at: None,
        }
    }

    pub fn is_modification(&self) -> bool {
        self.version_number > 1
    }
}

impl Identifiable for ContractVersion {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RecognitionMethod {
    PointInTime,
    #[default]
    OverTime,
}

impl fmt::Display for RecognitionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RecognitionMethod::PointInTime => "point_in_time",
            RecognitionMethod::OverTime => "over_time",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
/// How progress toward satisfaction is measured for over-time obligations.
pub enum MeasurementMethod {
    StraightLine,
    Output,
    Input,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    #[serde(default)]
    pub id: String,
    pub contract_id: String,
    pub version_id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_quantity")]
    pub quantity: Decimal,
    #[serde(default)]
    pub unit_price: Decimal,
    pub total_price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standalone_selling_price: Option<Decimal>,
    #[serde(default = "default_true")]
    pub is_distinct: bool,
    #[serde(default = "default_true")]
    pub distinct_within_context: bool,
    #[serde(default)]
    pub recognition_method: RecognitionMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measurement_method: Option<MeasurementMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_end_date: Option<NaiveDate>,
}

impl LineItem {
    pub fn new(
        id: impl Into<String>,
        contract_id: impl Into<String>,
        version_id: impl Into<String>,
        total_price: Decimal,
        recognition_method: RecognitionMethod,
    ) -> Self {
        Self {
            id: id.into(),
            contract_id: contract_id.into(),
            version_id: version_id.into(),
            description: String::new(),
            quantity: Decimal::ONE,
            unit_price: total_price,
            total_price,
            standalone_selling_price: None,
            is_distinct: true,
            distinct_within_context: true,
            recognition_method,
            measurement_method: None,
            delivery_start_date: None,
            delivery_end_date: None,
        }
    }

    /// Explicit SSP when given, otherwise the contracted total.
    pub fn selling_price(&self) -> Decimal {
        self.standalone_selling_price.unwrap_or(self.total_price)
    }

    /// Distinct on its own and distinct in the context of the contract.
    pub fn is_separate_obligation(&self) -> bool {
        self.is_distinct && self.distinct_within_context
    }
}

impl Identifiable for LineItem {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
/// Estimate of a variable price component.
pub struct VariableConsideration {
    #[serde(default)]
    pub id: String,
    pub contract_id: String,
    pub version_id: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimation_method: Option<String>,
    pub estimated_amount: Decimal,
    /// Constrained amounts are excluded from the transaction price.
    #[serde(default)]
    pub constraint_applied: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint_reason: Option<String>,
}

impl Identifiable for VariableConsideration {
    fn id(&self) -> &str {
        &self.id
    }
}
