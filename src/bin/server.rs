//! # Analytics Sync Server
//!
//! Production entry point: loads configuration, connects the segment
//! store, wires the upstream clients, and serves the HTTP surface until
//! shutdown.

use anyhow::Context;
use tokio::signal;
use tracing::{error, info};

use analytics_sync::logging;
use analytics_sync::web::{build_router, AppState};
use analytics_sync::SyncConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = SyncConfig::from_env()?;
    logging::init_structured_logging(&config.environment);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %config.environment,
        "starting analytics sync server"
    );

    let bind_address = config.bind_address.clone();
    let state = AppState::build(config).await?;
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("failed to bind {bind_address}"))?;
    info!(address = %bind_address, "listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "failed to install ctrl-c handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => error!(error = %err, "failed to install terminate handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("ctrl-c received, shutting down"),
        _ = terminate => info!("terminate signal received, shutting down"),
    }
}
