//! Error types for attn-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid attention level: {0}")]
    InvalidAttentionLevel(String),

    #[error("Malformed client message: {0}")]
    MalformedMessage(#[from] serde_json::Error),

    #[error("Invalid buffer: {0}")]
    InvalidBuffer(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
