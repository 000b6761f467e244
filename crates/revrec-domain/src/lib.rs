//! revrec-domain
//!
//! Pure domain models (Contract, PerformanceObligation, BillingSchedule, ledger entries, etc.).
//! No I/O, no CLI, no storage. Only data types, core enums, and calendar helpers.

pub mod billing;
pub mod common;
pub mod contract;
pub mod ledger;
pub mod obligation;
pub mod period;

pub use billing::*;
pub use common::*;
pub use contract::*;
pub use ledger::*;
pub use obligation::*;
pub use period::*;
