//! Band-power ratio features.
//!
//! For every window the extractor computes, per channel, the mean spectral
//! power in the theta band divided by the mean power in the low-beta band,
//! then averages that ratio over channels. One scalar feature per window.

use std::f64::consts::PI;

use attn_core::{FeatureExtractor, RawBuffer};

use crate::config::SignalConfig;

/// Floor applied to the low-beta power before dividing.
const MIN_BAND_POWER: f64 = 1e-12;

/// Sliding-window theta / low-beta ratio extractor.
#[derive(Debug, Clone)]
pub struct BandRatioExtractor {
    sampling_rate: f64,
    window_len: usize,
    step: usize,
    theta_band: [f64; 2],
    low_beta_band: [f64; 2],
}

impl BandRatioExtractor {
    pub fn new(config: &SignalConfig) -> Self {
        let window_len = config.window_len();
        let step = ((window_len as f64) * (1.0 - config.overlap)) as usize;
        Self {
            sampling_rate: f64::from(config.sampling_rate),
            window_len,
            step: step.max(1),
            theta_band: config.theta_band,
            low_beta_band: config.low_beta_band,
        }
    }

    /// Number of full windows that fit in `samples`.
    pub fn window_count(&self, samples: usize) -> usize {
        if samples < self.window_len {
            0
        } else {
            (samples - self.window_len) / self.step + 1
        }
    }

    fn window_ratio(&self, buffer: &RawBuffer, start: usize) -> f64 {
        let end = start + self.window_len;
        let channels = buffer.channels();
        if channels == 0 {
            return 0.0;
        }
        let total: f64 = (0..channels)
            .map(|ch| {
                let signal = buffer.channel_slice(ch, start, end);
                let theta = self.band_power(&signal, self.theta_band);
                let low_beta = self.band_power(&signal, self.low_beta_band);
                theta / low_beta.max(MIN_BAND_POWER)
            })
            .sum();
        total / channels as f64
    }

    /// Mean periodogram power over the DFT bins inside `[lo, hi]` Hz.
    fn band_power(&self, signal: &[f64], [lo, hi]: [f64; 2]) -> f64 {
        let n = signal.len();
        let resolution = self.sampling_rate / n as f64;
        let first = (lo / resolution).ceil() as usize;
        let last = ((hi / resolution).floor() as usize).min(n / 2);
        if first > last {
            return 0.0;
        }

        let bins = (first..=last)
            .map(|k| {
                let (re, im) = signal.iter().enumerate().fold((0.0, 0.0), |(re, im), (t, x)| {
                    let angle = -2.0 * PI * (k * t) as f64 / n as f64;
                    (re + x * angle.cos(), im + x * angle.sin())
                });
                (re * re + im * im) / n as f64
            })
            .collect::<Vec<_>>();

        bins.iter().sum::<f64>() / bins.len() as f64
    }
}

impl FeatureExtractor for BandRatioExtractor {
    fn extract(&self, buffer: &RawBuffer) -> Vec<Vec<f64>> {
        (0..self.window_count(buffer.len()))
            .map(|w| vec![self.window_ratio(buffer, w * self.step)])
            .collect()
    }
}
