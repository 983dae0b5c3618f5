//! Recording loader.
//!
//! Each subject's recording is a JSON array of samples, each sample an array
//! of channel values: `[[ch0, ch1, ...], [ch0, ch1, ...], ...]`.

use std::path::{Path, PathBuf};

use attn_core::collaborator::CollaboratorError;
use attn_core::{BufferSource, RawBuffer, SubjectId};
use tracing::debug;

use crate::error::{SignalError, SignalResult};

/// Loads `{data_dir}/child_{id}.json`.
#[derive(Debug, Clone)]
pub struct JsonBufferSource {
    data_dir: PathBuf,
}

impl JsonBufferSource {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Path of the recording for `subject`.
    pub fn path_for(&self, subject: SubjectId) -> PathBuf {
        self.data_dir.join(format!("child_{}.json", subject.index()))
    }

    fn read(&self, subject: SubjectId) -> SignalResult<RawBuffer> {
        let path = self.path_for(subject);
        let samples = read_samples(&path).map_err(|e| SignalError::BufferUnavailable {
            subject: subject.index(),
            reason: format!("{}: {e}", path.display()),
        })?;
        let buffer = RawBuffer::new(samples)?;
        debug!(
            subject = %subject,
            samples = buffer.len(),
            channels = buffer.channels(),
            "Recording loaded"
        );
        Ok(buffer)
    }
}

fn read_samples(path: &Path) -> SignalResult<Vec<Vec<f64>>> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

impl BufferSource for JsonBufferSource {
    fn load(&self, subject: SubjectId) -> Result<RawBuffer, CollaboratorError> {
        Ok(self.read(subject)?)
    }
}
