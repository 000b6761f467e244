//! Chart of accounts, ledger postings, balance snapshots, and ledger markers.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::common::*;

pub const ACC_CASH: &str = "1000 - Cash";
pub const ACC_AR: &str = "1200 - Accounts Receivable (AR)";
pub const ACC_CONTRACT_ASSET: &str = "1300 - Contract Asset";
pub const ACC_CONTRACT_LIABILITY: &str = "2600 - Contract Liability";
pub const ACC_REVENUE: &str = "4000 - Revenue";

/// Posting model tag stored on every entry written by the replay engine.
pub const POSTING_MODEL_V2: &str = "ledger_v2";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
/// Accounts touched by revenue postings. Serialized as their fixed labels, which downstream
/// reporting matches on.
pub enum LedgerAccount {
    #[serde(rename = "1000 - Cash")]
    Cash,
    #[serde(rename = "1200 - Accounts Receivable (AR)")]
    Receivable,
    #[serde(rename = "1300 - Contract Asset")]
    ContractAsset,
    #[serde(rename = "2600 - Contract Liability")]
    ContractLiability,
    #[serde(rename = "4000 - Revenue")]
    Revenue,
}

impl LedgerAccount {
    pub fn label(self) -> &'static str {
        match self {
            LedgerAccount::Cash => ACC_CASH,
            LedgerAccount::Receivable => ACC_AR,
            LedgerAccount::ContractAsset => ACC_CONTRACT_ASSET,
            LedgerAccount::ContractLiability => ACC_CONTRACT_LIABILITY,
            LedgerAccount::Revenue => ACC_REVENUE,
        }
    }

    /// Short tag used inside deterministic posting keys.
    pub fn key_tag(self) -> &'static str {
        match self {
            LedgerAccount::Cash => "CASH",
            LedgerAccount::Receivable => "AR",
            LedgerAccount::ContractAsset => "CA",
            LedgerAccount::ContractLiability => "CL",
            LedgerAccount::Revenue => "REV",
        }
    }
}

impl fmt::Display for LedgerAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
/// Side on which an account naturally carries its balance.
pub enum AccountNature {
    Debit,
    Credit,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
/// Reporting category of a ledger entry.
pub enum LedgerEntryType {
    Revenue,
    DeferredRevenue,
    ContractLiability,
    FinancingIncome,
    Receivable,
    ContractAsset,
    Cash,
    CommissionExpense,
    Other(String),
}

impl LedgerEntryType {
    pub fn as_str(&self) -> &str {
        match self {
            LedgerEntryType::Revenue => "revenue",
            LedgerEntryType::DeferredRevenue => "deferred_revenue",
            LedgerEntryType::ContractLiability => "contract_liability",
            LedgerEntryType::FinancingIncome => "financing_income",
            LedgerEntryType::Receivable => "receivable",
            LedgerEntryType::ContractAsset => "contract_asset",
            LedgerEntryType::Cash => "cash",
            LedgerEntryType::CommissionExpense => "commission_expense",
            LedgerEntryType::Other(value) => value,
        }
    }

    /// Natural balance side; `None` for types outside the IFRS 15 set.
    pub fn nature(&self) -> Option<AccountNature> {
        match self {
            LedgerEntryType::Revenue
            | LedgerEntryType::DeferredRevenue
            | LedgerEntryType::ContractLiability
            | LedgerEntryType::FinancingIncome => Some(AccountNature::Credit),
            LedgerEntryType::Receivable
            | LedgerEntryType::ContractAsset
            | LedgerEntryType::Cash
            | LedgerEntryType::CommissionExpense => Some(AccountNature::Debit),
            LedgerEntryType::Other(_) => None,
        }
    }
}

impl From<String> for LedgerEntryType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "revenue" => LedgerEntryType::Revenue,
            "deferred_revenue" => LedgerEntryType::DeferredRevenue,
            "contract_liability" => LedgerEntryType::ContractLiability,
            "financing_income" => LedgerEntryType::FinancingIncome,
            "receivable" => LedgerEntryType::Receivable,
            "contract_asset" => LedgerEntryType::ContractAsset,
            "cash" => LedgerEntryType::Cash,
            "commission_expense" => LedgerEntryType::CommissionExpense,
            _ => LedgerEntryType::Other(value),
        }
    }
}

impl From<&str> for LedgerEntryType {
    fn from(value: &str) -> Self {
        LedgerEntryType::from(value.to_string())
    }
}

impl From<LedgerEntryType> for String {
    fn from(value: LedgerEntryType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for LedgerEntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Any record that moves `amount` from a credit account to a debit account.
pub trait DoubleEntry {
    fn debit_account(&self) -> &str;
    fn credit_account(&self) -> &str;
    fn amount(&self) -> Decimal;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
/// The atomic persisted posting. `reference_number` doubles as the document key.
pub struct RevenueLedgerEntry {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub tenant_id: String,
    pub contract_id: String,
    pub entry_type: LedgerEntryType,
    pub debit_account: String,
    pub credit_account: String,
    /// Always positive.
    pub amount: Decimal,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_exchange_rate")]
    pub exchange_rate: Decimal,
    #[serde(default)]
    pub functional_amount: Decimal,
    pub entry_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period_start: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period_end: Option<NaiveDate>,
    pub reference_number: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_schedule_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performance_obligation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posting_model: Option<String>,
    #[serde(default)]
    pub is_posted: bool,
    #[serde(default)]
    pub is_reversed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Identifiable for RevenueLedgerEntry {
    fn id(&self) -> &str {
        &self.id
    }
}

impl DoubleEntry for RevenueLedgerEntry {
    fn debit_account(&self) -> &str {
        &self.debit_account
    }

    fn credit_account(&self) -> &str {
        &self.credit_account
    }

    fn amount(&self) -> Decimal {
        self.amount
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
/// Append-only reporting snapshot of a contract's balances.
pub struct ContractBalance {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub tenant_id: String,
    pub contract_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_id: Option<String>,
    pub as_of: DateTime<Utc>,
    pub contract_asset: Decimal,
    pub contract_liability: Decimal,
    pub receivable: Decimal,
    pub revenue_recognized: Decimal,
    pub cash_received: Decimal,
    pub total_billed: Decimal,
}

impl ContractBalance {
    /// Derives the asset/liability split from the three running totals. Asset and liability
    /// are mutually exclusive by construction.
    pub fn from_totals(
        contract_id: impl Into<String>,
        as_of: DateTime<Utc>,
        billed: Decimal,
        cash: Decimal,
        recognized: Decimal,
    ) -> Self {
        Self {
            id: String::new(),
            tenant_id: String::new(),
            contract_id: contract_id.into(),
            version_id: None,
            as_of,
            contract_asset: round2(positive_part(recognized - billed)),
            contract_liability: round2(positive_part(billed - recognized)),
            receivable: round2(positive_part(billed - cash)),
            revenue_recognized: round2(recognized),
            cash_received: round2(cash),
            total_billed: round2(billed),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MarkerKind {
    InitialEntry,
    LedgerV2,
}

impl MarkerKind {
    /// Fixed document key for the marker of this kind on `contract_id`.
    pub fn doc_key(self, contract_id: &str) -> String {
        match self {
            MarkerKind::InitialEntry => format!("initial-{contract_id}"),
            MarkerKind::LedgerV2 => format!("ledger-v2-{contract_id}"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
/// Once-per-contract flag written with create-if-absent semantics.
pub struct LedgerMarker {
    pub contract_id: String,
    pub kind: MarkerKind,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}
