//! Attention replay service - Entry Point
//!
//! Replays classified attention windows for every subject in real time and
//! serves dashboard and profile views over WebSocket.

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Attention replay service
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via ATTN_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    attn_telemetry::init_logging()?;

    info!("Starting attn-replay v{}", env!("CARGO_PKG_VERSION"));

    // CLI arg > ATTN_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("ATTN_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    info!(config_path = %config_path, "Loading configuration");
    let config = attn_app::AppConfig::from_file(&config_path)?;
    info!(
        port = config.server.port,
        subjects = config.signal.subjects.len(),
        profile_cursor = ?config.session.profile_cursor,
        "Configuration loaded"
    );

    let app = attn_app::Application::new(config)?;
    app.run().await?;

    info!("attn-replay stopped");
    Ok(())
}
