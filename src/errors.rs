use revrec_config::ConfigError;
use revrec_core::{CoreError, RecognitionFailure};
use thiserror::Error;

/// Every failure the application surface can report.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error(transparent)]
    Recognition(#[from] RecognitionFailure),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Invalid input: {0}")]
    Input(String),
}

impl AppError {
    /// Wire code of the underlying engine error, `invalid-argument` for bad CLI input,
    /// `internal` otherwise.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Core(err) => err.code(),
            AppError::Recognition(failure) => failure.code(),
            AppError::Input(_) => "invalid-argument",
            AppError::Config(_) | AppError::Io(_) | AppError::Serde(_) => "internal",
        }
    }
}
