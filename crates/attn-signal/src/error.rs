//! Signal preparation error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SignalError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Buffer unavailable for subject {subject}: {reason}")]
    BufferUnavailable { subject: u32, reason: String },

    #[error("Invalid model: {0}")]
    InvalidModel(String),

    #[error("Feature dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Core error: {0}")]
    Core(#[from] attn_core::CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type SignalResult<T> = Result<T, SignalError>;
