//! revrec-core
//!
//! Revenue recognition and ledger posting services.
//! Depends on revrec-domain. No CLI, no terminal I/O; persistence goes through the
//! [`storage::DocumentStore`] trait.

pub mod billing_service;
pub mod context;
pub mod error;
pub mod event_service;
pub mod initial_entry_service;
pub mod modification_service;
pub mod options;
pub mod posting_service;
pub mod public_api;
pub mod recognition_service;
pub mod reconciliation_service;
pub mod repository;
pub mod storage;
pub mod sweep_service;
pub mod time;
pub mod trigger_service;

pub use billing_service::*;
pub use context::EngineContext;
pub use error::CoreError;
pub use event_service::*;
pub use initial_entry_service::*;
pub use modification_service::*;
pub use options::EngineOptions;
pub use posting_service::*;
pub use public_api::*;
pub use recognition_service::*;
pub use reconciliation_service::*;
pub use repository::Repository;
pub use storage::{
    collections, CollectionPath, DocPath, Document, DocumentStore, Filter, MemoryDocumentStore,
    Query,
};
pub use sweep_service::*;
pub use time::{Clock, FixedClock, SystemClock};
pub use trigger_service::*;
