//! Signal preparation configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where recordings and the model live, and how recordings are windowed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalConfig {
    /// Directory holding `child_{id}.json` recordings.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Scaler + centroid model file.
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,
    /// Subject ids to load at startup.
    #[serde(default = "default_subjects")]
    pub subjects: Vec<u32>,
    /// Samples per second.
    #[serde(default = "default_sampling_rate")]
    pub sampling_rate: u32,
    /// Window duration in seconds.
    #[serde(default = "default_window_secs")]
    pub window_secs: u32,
    /// Fractional overlap between consecutive windows, in [0, 1).
    #[serde(default = "default_overlap")]
    pub overlap: f64,
    /// Theta band edges (Hz).
    #[serde(default = "default_theta_band")]
    pub theta_band: [f64; 2],
    /// Low-beta band edges (Hz).
    #[serde(default = "default_low_beta_band")]
    pub low_beta_band: [f64; 2],
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data/segments")
}

fn default_model_path() -> PathBuf {
    PathBuf::from("model/attention_model.json")
}

fn default_subjects() -> Vec<u32> {
    (1..=10).collect()
}

fn default_sampling_rate() -> u32 {
    256
}

fn default_window_secs() -> u32 {
    5
}

fn default_overlap() -> f64 {
    0.5
}

fn default_theta_band() -> [f64; 2] {
    [4.0, 8.0]
}

fn default_low_beta_band() -> [f64; 2] {
    [13.0, 20.0]
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            model_path: default_model_path(),
            subjects: default_subjects(),
            sampling_rate: default_sampling_rate(),
            window_secs: default_window_secs(),
            overlap: default_overlap(),
            theta_band: default_theta_band(),
            low_beta_band: default_low_beta_band(),
        }
    }
}

impl SignalConfig {
    /// Window length in samples.
    pub fn window_len(&self) -> usize {
        (self.window_secs * self.sampling_rate) as usize
    }

    /// Validate configuration values.
    ///
    /// Returns Err if:
    /// - sampling_rate or window_secs is zero
    /// - overlap is outside [0, 1)
    /// - a band is empty or reaches the Nyquist frequency
    pub fn validate(&self) -> Result<(), String> {
        if self.sampling_rate == 0 || self.window_secs == 0 {
            return Err("sampling_rate and window_secs must be positive".to_string());
        }
        if !(0.0..1.0).contains(&self.overlap) {
            return Err(format!("overlap ({}) must be in [0, 1)", self.overlap));
        }
        let nyquist = f64::from(self.sampling_rate) / 2.0;
        for (name, [lo, hi]) in [("theta_band", self.theta_band), ("low_beta_band", self.low_beta_band)] {
            if lo <= 0.0 || lo >= hi || hi >= nyquist {
                return Err(format!(
                    "{name} [{lo}, {hi}] must satisfy 0 < lo < hi < {nyquist}"
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = SignalConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.window_len(), 1280);
        assert_eq!(config.subjects.len(), 10);
    }

    #[test]
    fn test_rejects_bad_overlap() {
        let config = SignalConfig {
            overlap: 1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_band_above_nyquist() {
        let config = SignalConfig {
            sampling_rate: 32,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.contains("low_beta_band"));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: SignalConfig = toml::from_str("subjects = [3, 4]").unwrap();
        assert_eq!(config.subjects, vec![3, 4]);
        assert_eq!(config.sampling_rate, 256);
    }
}
