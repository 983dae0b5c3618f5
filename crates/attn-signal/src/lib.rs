//! Default collaborators for subject preparation.
//!
//! - `JsonBufferSource`: loads `child_{id}.json` recordings from a directory
//! - `BandRatioExtractor`: theta / low-beta band-power ratio per window
//! - `CentroidClassifier`: standard scaler + nearest k-means centroid

pub mod classifier;
pub mod config;
pub mod error;
pub mod features;
pub mod loader;

pub use classifier::{CentroidClassifier, ModelFile, ScalerParams};
pub use config::SignalConfig;
pub use error::{SignalError, SignalResult};
pub use features::BandRatioExtractor;
pub use loader::JsonBufferSource;
