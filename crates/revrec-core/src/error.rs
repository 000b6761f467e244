use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Caller identity is required")]
    Unauthenticated,
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),
    #[error("Already exists: {0}")]
    AlreadyExists(String),
    #[error("Internal error: {0}")]
    Internal(String),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Serialization error: {0}")]
    Serde(String),
}

impl CoreError {
    /// Stable wire code for the RPC layer.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::Unauthenticated => "unauthenticated",
            CoreError::InvalidArgument(_) => "invalid-argument",
            CoreError::NotFound(_) => "not-found",
            CoreError::FailedPrecondition(_) => "failed-precondition",
            CoreError::AlreadyExists(_) => "already-exists",
            CoreError::Internal(_) | CoreError::Io(_) | CoreError::Serde(_) => "internal",
        }
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, CoreError::AlreadyExists(_))
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Serde(err.to_string())
    }
}
