//! `revrec_cli`: command-line surface over the recognition engine and a JSON document store.

pub mod commands;
pub mod output;

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;

use revrec_domain::{date_start_utc, parse_flexible_date, BillingStatus};

#[derive(Parser, Debug)]
#[command(
    name = "revrec_cli",
    about = "Revenue recognition and double-entry ledger engine",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Base directory holding `config/` and, unless configured otherwise, `data/`
    #[arg(long, global = true)]
    pub home: Option<PathBuf>,

    /// Tenant whose documents are read and written
    #[arg(short, long, global = true, default_value = "default")]
    pub tenant: String,

    /// Caller identity passed to the engine entry points
    #[arg(long, global = true, default_value = "cli")]
    pub user: String,

    /// Suppress the human-readable heading on stderr
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Import a contract bundle and run the contract-created trigger
    Import {
        file: PathBuf,
        #[arg(long, value_parser = parse_instant)]
        as_of: Option<DateTime<Utc>>,
    },
    /// Run the five-step recognition for a contract
    Recompute {
        contract_id: String,
        /// Version to recompute instead of the contract's current one
        #[arg(long)]
        version: Option<String>,
        #[arg(long, value_parser = parse_instant)]
        as_of: Option<DateTime<Utc>>,
    },
    /// Billing schedule operations
    #[command(subcommand)]
    Billing(BillingCommand),
    /// Mark a point-in-time obligation satisfied, then recompute and replay
    Satisfy {
        obligation_id: String,
        /// When control transferred; defaults to now
        #[arg(long, value_parser = parse_instant)]
        at: Option<DateTime<Utc>>,
        #[arg(long, value_parser = parse_instant)]
        as_of: Option<DateTime<Utc>>,
    },
    /// Replay a contract's ledger up to a horizon
    Replay {
        contract_id: String,
        #[arg(long, value_parser = parse_instant)]
        up_to: Option<DateTime<Utc>>,
    },
    /// Recompute and replay every live contract of the given (or configured) tenants
    Sweep {
        #[arg(long = "tenants", value_delimiter = ',')]
        tenants: Vec<String>,
        #[arg(long, value_parser = parse_instant)]
        as_of: Option<DateTime<Utc>>,
    },
    /// Per-account debits, credits and net over a contract's postings
    TrialBalance { contract_id: String },
    /// Roll entry-type balances forward from opening balances
    Reconcile(ReconcileArgs),
    /// Show the effective configuration
    Config,
}

#[derive(Subcommand, Debug)]
pub enum BillingCommand {
    /// Derive the billing schedule from the contract's dates and payment terms
    Generate { contract_id: String },
    /// Move a billing row to a new status and fire the billing trigger
    Status {
        billing_id: String,
        #[arg(value_enum)]
        status: StatusArg,
        #[arg(long, value_parser = parse_instant)]
        at: Option<DateTime<Utc>>,
        /// Amount received; defaults to the billed amount
        #[arg(long)]
        paid_amount: Option<Decimal>,
    },
}

#[derive(Args, Debug)]
pub struct ReconcileArgs {
    pub contract_id: String,
    /// Opening balance as `entry_type=amount`, repeatable
    #[arg(long = "opening", value_parser = parse_opening)]
    pub opening: Vec<(String, Decimal)>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusArg {
    Invoiced,
    Paid,
    Overdue,
    Cancelled,
}

impl From<StatusArg> for BillingStatus {
    fn from(value: StatusArg) -> Self {
        match value {
            StatusArg::Invoiced => BillingStatus::Invoiced,
            StatusArg::Paid => BillingStatus::Paid,
            StatusArg::Overdue => BillingStatus::Overdue,
            StatusArg::Cancelled => BillingStatus::Cancelled,
        }
    }
}

/// Accepts RFC 3339 instants and plain dates (midnight UTC).
pub fn parse_instant(value: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(value) {
        return Ok(instant.with_timezone(&Utc));
    }
    parse_flexible_date(value)
        .map(date_start_utc)
        .ok_or_else(|| format!("`{value}` is not a date or RFC 3339 timestamp"))
}

fn parse_opening(value: &str) -> Result<(String, Decimal), String> {
    let (entry_type, amount) = value
        .split_once('=')
        .ok_or_else(|| format!("`{value}` is not in entry_type=amount form"))?;
    let amount = amount
        .trim()
        .parse::<Decimal>()
        .map_err(|err| format!("invalid amount in `{value}`: {err}"))?;
    Ok((entry_type.trim().to_string(), amount))
}
