//! Session configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How profile streams pick their starting window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileCursorMode {
    /// One `last_delivered` counter per subject, shared by the timeline and
    /// every profile viewer of that subject.
    #[default]
    Shared,
    /// Each (subject, client) pair resumes from its own cursor.
    PerClient,
}

/// Replay cadence and view-mode policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Tick cadence in milliseconds (one window per tick).
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Real-world duration of one window, used for profile time labels.
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    /// Clamp resynchronized cursors to the target subject's window count.
    #[serde(default = "default_resync_clamp")]
    pub resync_clamp: bool,
    /// Profile stream resume policy.
    #[serde(default)]
    pub profile_cursor: ProfileCursorMode,
    /// Per-client outbound queue size.
    #[serde(default = "default_client_queue_capacity")]
    pub client_queue_capacity: usize,
}

fn default_tick_interval_ms() -> u64 {
    5_000
}

fn default_window_secs() -> u64 {
    5
}

fn default_resync_clamp() -> bool {
    true
}

fn default_client_queue_capacity() -> usize {
    64
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            window_secs: default_window_secs(),
            resync_clamp: default_resync_clamp(),
            profile_cursor: ProfileCursorMode::default(),
            client_queue_capacity: default_client_queue_capacity(),
        }
    }
}

impl SessionConfig {
    /// Tick cadence `T`.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.tick_interval_ms == 0 {
            return Err("tick_interval_ms must be positive".to_string());
        }
        if self.client_queue_capacity == 0 {
            return Err("client_queue_capacity must be positive".to_string());
        }
        Ok(())
    }
}
