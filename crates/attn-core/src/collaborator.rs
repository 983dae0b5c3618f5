//! Collaborator seams consumed by the replay engine.
//!
//! Buffer loading, feature extraction and classification run once per subject
//! at startup. The engine only ever sees the resulting `WindowSequence`.

use crate::error::{CoreError, Result};
use crate::types::{AttentionLevel, SubjectId, WindowSequence};

/// Boxed error returned by collaborator implementations.
pub type CollaboratorError = Box<dyn std::error::Error + Send + Sync>;

/// Raw multi-channel recording of one subject (samples x channels).
#[derive(Debug, Clone, PartialEq)]
pub struct RawBuffer {
    samples: Vec<Vec<f64>>,
    channels: usize,
}

impl RawBuffer {
    /// Build a buffer, rejecting ragged rows.
    pub fn new(samples: Vec<Vec<f64>>) -> Result<Self> {
        let channels = samples.first().map(Vec::len).unwrap_or(0);
        if let Some(pos) = samples.iter().position(|row| row.len() != channels) {
            return Err(CoreError::InvalidBuffer(format!(
                "sample {pos} has {} channels, expected {channels}",
                samples[pos].len()
            )));
        }
        Ok(Self { samples, channels })
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Values of `channel` over the sample range `[start, end)`.
    pub fn channel_slice(&self, channel: usize, start: usize, end: usize) -> Vec<f64> {
        self.samples[start..end]
            .iter()
            .map(|row| row[channel])
            .collect()
    }
}

/// Loads the raw recording of a subject.
pub trait BufferSource: Send + Sync {
    fn load(&self, subject: SubjectId) -> std::result::Result<RawBuffer, CollaboratorError>;
}

/// Turns a raw recording into one feature vector per window.
pub trait FeatureExtractor: Send + Sync {
    fn extract(&self, buffer: &RawBuffer) -> Vec<Vec<f64>>;
}

/// Maps one feature vector to an attention label.
pub trait Classifier: Send + Sync {
    fn classify(&self, features: &[f64]) -> std::result::Result<AttentionLevel, CollaboratorError>;
}

/// Run extraction and classification over a whole buffer.
pub fn derive_window_sequence(
    buffer: &RawBuffer,
    extractor: &dyn FeatureExtractor,
    classifier: &dyn Classifier,
) -> std::result::Result<WindowSequence, CollaboratorError> {
    extractor
        .extract(buffer)
        .iter()
        .map(|features| classifier.classify(features))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map(WindowSequence::new)
}
