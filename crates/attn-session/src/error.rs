//! Session error types.

use attn_core::{ClientId, SubjectId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Unknown subject: {0}")]
    UnknownSubject(SubjectId),

    #[error("Unknown client: {0}")]
    UnknownClient(ClientId),

    #[error("Client disconnected: {0}")]
    ClientGone(ClientId),
}

pub type SessionResult<T> = Result<T, SessionError>;
