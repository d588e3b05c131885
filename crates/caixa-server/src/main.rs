use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use caixa::config::{default_config_path, ResolvedConfig};
use caixa::{BackendSelector, LedgerRepository};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "caixa-server")]
#[command(about = "HTTP API for the caixa ledger")]
struct Cli {
    /// Path to config file (defaults to ./caixa.toml, then the user data dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:8080")]
    listen: SocketAddr,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(default_config_path);
    let config = ResolvedConfig::load_or_default(&config_path)?;
    info!(config = %config.config_path.display(), "Loaded configuration");

    let selector = Arc::new(BackendSelector::new(config.storage));
    let ledger = Arc::new(LedgerRepository::new(selector.clone()));

    // Storage is resolved before the listener binds.
    let backend = ledger
        .backend_kind()
        .await
        .context("No usable ledger storage")?;
    if let Some(reason) = selector.fallback_reason() {
        warn!(%backend, reason = reason, "Serving from fallback storage");
    }

    let listener = tokio::net::TcpListener::bind(cli.listen)
        .await
        .with_context(|| format!("Failed to bind {}", cli.listen))?;
    info!(addr = %listener.local_addr()?, %backend, "Listening");

    axum::serve(listener, caixa_server::router(ledger))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
