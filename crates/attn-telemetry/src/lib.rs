//! Prometheus metrics and structured logging.
//!
//! - Structured logging with tracing (pretty in development, JSON in production)
//! - Process-wide Prometheus metrics for ticks, broadcasts and profile streams
//! - Text exposition for the `/metrics` endpoint

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::Metrics;
