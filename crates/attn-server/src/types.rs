//! REST response types.

use attn_session::SessionSnapshot;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Body of `GET /api/snapshot`.
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotResponse {
    pub timestamp: DateTime<Utc>,
    pub connected_clients: usize,
    pub active_profile_streams: usize,
    #[serde(flatten)]
    pub session: SessionSnapshot,
}
