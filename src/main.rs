use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod compute;
mod config;
mod handlers;
mod metrics;
mod middleware;
mod server;
mod store;

/// Shared application state available to every handler via `State<Arc<AppState>>`.
///
/// Holds no mutable data: every request reads and writes through the store.
pub struct AppState {
    /// Append-only operation log (SQLite pool or Redis connection manager).
    pub store: Arc<dyn store::LogStore>,

    pub config: config::ServerConfig,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(err) = run().await {
        tracing::error!(error = %err, "ops-ledger exited with error");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    // ── 1. Configuration ─────────────────────────────────────────
    let config = config::ServerConfig::load()?;
    tracing::info!(?config, "Configuration loaded");

    // ── 2. Open the log store ────────────────────────────────────
    let store = store::open(&config).await?;

    // ── 3. Build shared state & router ───────────────────────────
    let listen = config.listen_addr;
    let state = Arc::new(AppState {
        store: store.clone(),
        config,
    });
    let app = server::create_router(state);

    // ── 4. Bind & serve ──────────────────────────────────────────
    let listener = tokio::net::TcpListener::bind(listen).await?;
    tracing::info!(%listen, "ops-ledger listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    store.close().await;
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "Cannot listen for Ctrl-C; running until killed");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
