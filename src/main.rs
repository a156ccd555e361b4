//! Warden - cache-backed token revocation and rate limiting
//!
//! Bootstraps the cache engine and restores the revocation list, then
//! holds the state until a shutdown signal arrives.

use std::sync::Arc;

use anyhow::Result;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use warden::auth::InMemoryTokenStore;
use warden::{AppState, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(config.json_logs);
    info!("Starting Warden");

    // Initialize metrics
    if let Some(addr) = config.metrics_addr {
        warden::metrics::init_metrics(addr)?;
    }

    // Token records are kept in process; a durable store plugs in here
    let token_store = Arc::new(InMemoryTokenStore::new());

    // Initialize application state (fatal if revocations cannot be restored)
    let state = Arc::new(AppState::new(config, token_store).await?);
    info!(engine = state.cache.engine_name(), "Application state initialized");

    shutdown_signal().await;

    state.shutdown().await?;
    info!("Warden shutdown complete");
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "warden=info".into());

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    }
}

/// Handle graceful shutdown signals
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, initiating shutdown");
        }
        _ = terminate => {
            warn!("Received SIGTERM, initiating shutdown");
        }
    }
}
