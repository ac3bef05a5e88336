//! Parley Daemon
//!
//! Standalone HTTP server for the parley exchange pipeline. Clients
//! POST a message and read back a framed stream of content deltas,
//! with a session-created control event multiplexed in when the call
//! minted a new session.
//!
//! # Usage
//!
//! ```bash
//! # Start with defaults (port 8080, Ollama on localhost:11434)
//! PARLEY_HISTORY_TOKEN_BUDGET=20000 parley-daemon
//!
//! # With a config file
//! parley-daemon --config /etc/parley/config.toml
//!
//! # With verbose logging
//! RUST_LOG=debug parley-daemon
//! ```
//!
//! # Environment Variables
//!
//! - `PARLEY_HISTORY_TOKEN_BUDGET`: Context window token budget (required
//!   unless set in the config file)
//! - `PARLEY_PORT`: HTTP listen port (default: 8080)
//! - `PARLEY_MODEL`: Model name sent to the backend
//! - `PARLEY_SYSTEM_PROMPT`: System prompt prepended to every request
//! - `PARLEY_CONFIG`: Config file path
//! - `OLLAMA_HOST` / `OLLAMA_PORT`: Backend address
//! - `RUST_LOG`: Log level (trace, debug, info, warn, error)
//!
//! # Signals
//!
//! - SIGTERM/SIGINT: Graceful shutdown

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tracing::info;

use parley_core::{Config, ExchangeConfig, ExchangeOrchestrator, MemoryStore, OllamaBackend};

mod server;

use server::{router, AppState};

/// Parley daemon command line
#[derive(Debug, Parser)]
#[command(name = "parley-daemon", about = "Parley streaming chat daemon")]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, env = "PARLEY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parley_daemon=info,parley_core=info,tower_http=info".into()),
        )
        .with_target(true)
        .init();

    let cli = Cli::parse();

    info!("Starting Parley Daemon");

    let config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    info!(
        port = config.port,
        model = %config.model,
        budget = config.history_token_budget,
        "configuration resolved"
    );

    let backend = Arc::new(
        OllamaBackend::new(config.ollama_host.clone(), config.ollama_port)
            .context("failed to build backend client")?,
    );

    if !backend_ready(backend.as_ref()).await {
        tracing::warn!("backend not reachable - first exchange may fail");
    }

    let store = Arc::new(MemoryStore::new());
    let orchestrator = Arc::new(ExchangeOrchestrator::new(
        store.clone(),
        backend,
        ExchangeConfig::from(&config),
    ));

    let state = AppState {
        orchestrator,
        store,
    };

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(addr = %addr, "listening for connections");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("parley daemon stopped cleanly");
    Ok(())
}

async fn backend_ready(backend: &OllamaBackend) -> bool {
    use parley_core::ChatBackend;
    backend.health_check().await
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down");
        }
    }
}
