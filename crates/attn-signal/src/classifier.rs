//! Centroid classifier.
//!
//! The model file carries a standard scaler and k-means centroids:
//!
//! ```json
//! {
//!   "scaler": { "mean": [1.2], "scale": [0.4] },
//!   "centroids": [[0.0], [-1.1], [1.3]],
//!   "labels": ["Mid", "High", "Low"]
//! }
//! ```
//!
//! `labels[k]` names cluster `k`; it defaults to `Mid, High, Low`.

use std::path::Path;

use attn_core::collaborator::CollaboratorError;
use attn_core::{AttentionLevel, Classifier};
use serde::{Deserialize, Serialize};

use crate::error::{SignalError, SignalResult};

/// Standard scaler parameters: `z = (x - mean) / scale`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalerParams {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

/// On-disk model representation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelFile {
    pub scaler: ScalerParams,
    pub centroids: Vec<Vec<f64>>,
    #[serde(default = "default_labels")]
    pub labels: Vec<AttentionLevel>,
}

fn default_labels() -> Vec<AttentionLevel> {
    vec![AttentionLevel::Mid, AttentionLevel::High, AttentionLevel::Low]
}

/// Scales a feature vector and returns the label of the nearest centroid.
#[derive(Debug, Clone)]
pub struct CentroidClassifier {
    model: ModelFile,
}

impl CentroidClassifier {
    /// Build from an already-parsed model, checking dimensions.
    pub fn new(model: ModelFile) -> SignalResult<Self> {
        let dim = model.scaler.mean.len();
        if dim == 0 || model.scaler.scale.len() != dim {
            return Err(SignalError::InvalidModel(format!(
                "scaler mean/scale lengths differ or are empty ({} vs {})",
                dim,
                model.scaler.scale.len()
            )));
        }
        if model.scaler.scale.iter().any(|s| *s == 0.0) {
            return Err(SignalError::InvalidModel("scaler scale contains zero".to_string()));
        }
        if model.centroids.is_empty() {
            return Err(SignalError::InvalidModel("no centroids".to_string()));
        }
        if let Some(bad) = model.centroids.iter().find(|c| c.len() != dim) {
            return Err(SignalError::DimensionMismatch {
                expected: dim,
                actual: bad.len(),
            });
        }
        if model.labels.len() < model.centroids.len() {
            return Err(SignalError::InvalidModel(format!(
                "{} centroids but only {} labels",
                model.centroids.len(),
                model.labels.len()
            )));
        }
        Ok(Self { model })
    }

    /// Load and validate a JSON model file.
    pub fn from_file(path: impl AsRef<Path>) -> SignalResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::new(serde_json::from_str(&content)?)
    }

    /// Feature dimension expected by the model.
    pub fn dimension(&self) -> usize {
        self.model.scaler.mean.len()
    }

    /// Index of the nearest centroid for `features`.
    pub fn predict_cluster(&self, features: &[f64]) -> SignalResult<usize> {
        if features.len() != self.dimension() {
            return Err(SignalError::DimensionMismatch {
                expected: self.dimension(),
                actual: features.len(),
            });
        }
        let scaled: Vec<f64> = features
            .iter()
            .zip(&self.model.scaler.mean)
            .zip(&self.model.scaler.scale)
            .map(|((x, mean), scale)| (x - mean) / scale)
            .collect();

        let (cluster, _) = self
            .model
            .centroids
            .iter()
            .map(|c| squared_distance(&scaled, c))
            .enumerate()
            .fold((0, f64::INFINITY), |best, (idx, dist)| {
                if dist < best.1 {
                    (idx, dist)
                } else {
                    best
                }
            });
        Ok(cluster)
    }
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

impl Classifier for CentroidClassifier {
    fn classify(&self, features: &[f64]) -> Result<AttentionLevel, CollaboratorError> {
        let cluster = self.predict_cluster(features)?;
        Ok(self.model.labels[cluster])
    }
}
