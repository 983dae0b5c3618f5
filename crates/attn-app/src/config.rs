//! Application configuration.

use attn_server::ServerConfig;
use attn_session::SessionConfig;
use attn_signal::SignalConfig;
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{AppError, AppResult};

/// Prefix of environment overrides, e.g. `ATTN__SERVER__PORT=9000`.
pub const ENV_PREFIX: &str = "ATTN";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub signal: SignalConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file, then apply environment overrides.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let config = Config::builder()
            .add_source(File::new(path, FileFormat::Toml))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;

        let config: Self = config
            .try_deserialize()
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML text without environment overrides.
    pub fn from_toml_str(content: &str) -> AppResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate every section.
    pub fn validate(&self) -> AppResult<()> {
        self.session.validate().map_err(AppError::Config)?;
        self.server.validate().map_err(AppError::Config)?;
        self.signal.validate().map_err(AppError::Config)?;

        if self.session.window_secs != u64::from(self.signal.window_secs) {
            warn!(
                session_window_secs = self.session.window_secs,
                signal_window_secs = self.signal.window_secs,
                "Profile time labels use a different window length than feature extraction"
            );
        }
        Ok(())
    }
}
