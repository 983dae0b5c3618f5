//! attn-server - WebSocket and HTTP surface of the replay service.
//!
//! ```text
//!  GET /ws            → WebSocket: dashboard / start_stream / stop_stream
//!  GET /api/snapshot  → JSON view of every subject's replay state
//!  GET /metrics       → Prometheus text exposition
//! ```
//!
//! Each WebSocket connection registers one client with the `Session`. A
//! writer task drains the client's outbound queue into the socket while the
//! connection task applies incoming requests; closing either side removes the
//! client and stops its profile stream.
//!
//! # Usage
//!
//! ```ignore
//! use attn_server::{run_server, ServerConfig};
//!
//! let config = ServerConfig::default();
//! run_server(session.clone(), config, async { shutdown.cancelled().await }).await?;
//! ```

mod config;
mod error;
mod server;
mod types;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use server::{bind, create_router, run_server, serve, AppState, ConnectionLimiter};
pub use types::SnapshotResponse;
