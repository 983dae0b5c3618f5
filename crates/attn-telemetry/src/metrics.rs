//! Prometheus metrics for the replay service.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. A registration failure
//! means duplicate metric names, a fatal configuration error that surfaces on
//! first use at startup.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_int_counter, register_int_gauge, CounterVec, Encoder,
    IntCounter, IntGauge, TextEncoder,
};

use crate::error::TelemetryResult;

/// Ticks completed per subject.
pub static TICKS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "attn_ticks_total",
        "Timeline ticks completed per subject",
        &["subject"]
    )
    .unwrap()
});

/// Dashboard update deliveries by outcome (delivered/failed/suppressed).
pub static DASHBOARD_UPDATES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "attn_dashboard_updates_total",
        "Dashboard update deliveries by outcome",
        &["outcome"]
    )
    .unwrap()
});

/// Profile frames delivered per subject.
pub static PROFILE_FRAMES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "attn_profile_frames_total",
        "Profile frames delivered per subject",
        &["subject"]
    )
    .unwrap()
});

/// Currently connected observer clients.
pub static CONNECTED_CLIENTS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("attn_connected_clients", "Connected observer clients").unwrap()
});

/// Currently running profile streams.
pub static ACTIVE_PROFILE_STREAMS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("attn_active_profile_streams", "Running profile streams").unwrap()
});

/// Cursor resynchronizations performed on profile stop.
pub static RESYNC_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("attn_resync_total", "Cursor resynchronizations").unwrap()
});

/// Convenience facade over the metric statics.
pub struct Metrics;

impl Metrics {
    /// Record one completed tick.
    pub fn tick(subject: &str) {
        TICKS_TOTAL.with_label_values(&[subject]).inc();
    }

    /// Record a dashboard update delivered to one client.
    pub fn dashboard_delivered(count: usize) {
        DASHBOARD_UPDATES_TOTAL
            .with_label_values(&["delivered"])
            .inc_by(count as f64);
    }

    /// Record a dashboard update that could not be delivered to one client.
    pub fn dashboard_failed() {
        DASHBOARD_UPDATES_TOTAL.with_label_values(&["failed"]).inc();
    }

    /// Record a tick whose broadcast was suppressed.
    pub fn dashboard_suppressed() {
        DASHBOARD_UPDATES_TOTAL
            .with_label_values(&["suppressed"])
            .inc();
    }

    /// Record one profile frame.
    pub fn profile_frame(subject: &str) {
        PROFILE_FRAMES_TOTAL.with_label_values(&[subject]).inc();
    }

    pub fn client_connected() {
        CONNECTED_CLIENTS.inc();
    }

    pub fn client_disconnected() {
        CONNECTED_CLIENTS.dec();
    }

    pub fn profile_stream_started() {
        ACTIVE_PROFILE_STREAMS.inc();
    }

    pub fn profile_stream_ended() {
        ACTIVE_PROFILE_STREAMS.dec();
    }

    pub fn resync() {
        RESYNC_TOTAL.inc();
    }

    /// Render every registered metric in the Prometheus text format.
    pub fn render() -> TelemetryResult<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_includes_recorded_metrics() {
        Metrics::tick("42");
        Metrics::resync();

        let text = Metrics::render().unwrap();
        assert!(text.contains("attn_ticks_total"));
        assert!(text.contains("subject=\"42\""));
        assert!(text.contains("attn_resync_total"));
    }
}
