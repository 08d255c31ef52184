//! Tomato Leaf Inference Server
//!
//! HTTP API serving predictions from a trained tomato leaf model.
//! The model is loaded once at startup; without one the server still
//! answers health checks and reports itself as degraded.

mod error;
mod routes;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::info;

use tomato_leaf::backend::backend_name;
use tomato_leaf::utils::logging::{init_logging, LogConfig, LogLevel};

use crate::state::{AppState, ServerConfig};

/// Tomato Leaf Inference Server
#[derive(Parser, Debug)]
#[command(name = "tomato-leaf-server")]
#[command(version)]
#[command(about = "HTTP inference API for the tomato leaf disease classifier")]
struct Cli {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "8000")]
    port: u16,

    /// Host to bind to
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Model artifact to serve (stem, .mpk or .json)
    #[arg(short, long, env = "TOMATO_MODEL_PATH", default_value = "output/best_tomato_model")]
    model: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize logging
    let log_config = LogConfig::production().with_level(LogLevel::parse(&cli.log_level));
    init_logging(&log_config).map_err(anyhow::Error::msg)?;

    info!("Tomato Leaf Inference Server v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!("  Model:   {:?}", cli.model);
    info!("  Backend: {}", backend_name());

    // Load the model off the async runtime
    let config = ServerConfig { model_path: cli.model };
    let state = tokio::task::spawn_blocking(move || AppState::load(config)).await?;
    let app = routes::router(Arc::new(state));

    // Start server
    let addr: SocketAddr = format!("{}:{}", cli.host, cli.port).parse()?;
    info!("Starting server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
