//! Attention replay service.
//!
//! Loads each subject's recording, classifies it into a window sequence, and
//! serves the replay session over WebSocket:
//! - configuration (TOML file plus `ATTN__SECTION__KEY` overrides)
//! - subject preparation on the blocking pool
//! - server and session lifecycle, including Ctrl-C shutdown

pub mod app;
pub mod config;
pub mod error;
pub mod prepare;

pub use app::Application;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use prepare::SubjectPreparer;
