//! Core domain types for the attention replay service.
//!
//! This crate provides the vocabulary shared by every other crate:
//! - `SubjectId`, `ClientId`: identities of monitored subjects and observers
//! - `AttentionLevel`, `WindowSequence`: the classified replay data
//! - `ClientMessage`, `ServerMessage`: the WebSocket wire protocol
//! - `BufferSource`, `FeatureExtractor`, `Classifier`: collaborator seams

pub mod collaborator;
pub mod error;
pub mod message;
pub mod types;

pub use collaborator::{
    derive_window_sequence, BufferSource, Classifier, CollaboratorError, FeatureExtractor, RawBuffer,
};
pub use error::{CoreError, Result};
pub use message::{ClientMessage, ServerMessage};
pub use types::{AttentionLevel, ClientId, SubjectId, WindowSequence};
