//! Application error types.

use attn_core::{CollaboratorError, SubjectId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Signal error: {0}")]
    Signal(#[from] attn_signal::SignalError),

    #[error("Server error: {0}")]
    Server(#[from] attn_server::ServerError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] attn_telemetry::TelemetryError),

    #[error("Failed to load subject {subject}: {source}")]
    Load {
        subject: SubjectId,
        source: CollaboratorError,
    },

    #[error("Failed to classify subject {subject}: {source}")]
    Classify {
        subject: SubjectId,
        source: CollaboratorError,
    },

    #[error("No subject could be prepared")]
    NoSubjects,

    #[error("Preparation task failed: {0}")]
    Preparation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
