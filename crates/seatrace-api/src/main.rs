//! # seatrace-api -- Binary Entry Point
//!
//! Starts the Axum HTTP server and the reconciliation worker.
//! Binds to configurable port (default 8080).

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusBuilder;

use seatrace_api::db::{init_pool, PgRepository};
use seatrace_api::reconcile::{spawn_reconciler, ReconcileCommand};
use seatrace_api::repository::{GoodsRepository, MemoryRepository};
use seatrace_api::state::{AppConfig, AppState};
use seatrace_chain_client::{ChainClient, ChainConfig, ChainGateway};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = AppConfig::from_env();
    tracing::info!(?config, "configuration loaded");

    let metrics_handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
        tracing::error!("Prometheus recorder installation failed: {e}");
        e
    })?;

    // Database is optional; without it state lives in memory.
    let repo: Arc<dyn GoodsRepository> = match init_pool().await.map_err(|e| {
        tracing::error!("Database initialization failed: {e}");
        e
    })? {
        Some(pool) => Arc::new(PgRepository::new(pool)),
        None => {
            tracing::warn!("in-memory repository has no companies or users until seeded");
            Arc::new(MemoryRepository::new())
        }
    };

    // The chain gateway is required: every lifecycle stage is attested on chain.
    let chain_config = ChainConfig::from_env().map_err(|e| {
        tracing::error!("Chain gateway not configured: {e}");
        e
    })?;
    tracing::info!(gateway = %chain_config.base_url, "chain gateway configured");
    let gateway: Arc<dyn ChainGateway> = Arc::new(ChainClient::new(chain_config)?);

    let state = AppState::new(config.clone(), repo.clone(), gateway).with_metrics(metrics_handle);

    let (worker, control) = spawn_reconciler(config.reconcile.clone(), repo, state.engine.clone());

    let app = seatrace_api::app(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("seatrace API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if control.send(ReconcileCommand::Shutdown).await.is_ok() {
        if let Err(e) = worker.await {
            tracing::error!("reconciliation worker panicked: {e}");
        }
    }

    Ok(())
}

/// Text logs by default, JSON when `LOG_FORMAT=json`.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = std::env::var("LOG_FORMAT")
        .map(|f| f.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
