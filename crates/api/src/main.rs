//! FinRAG Retrieval API
//!
//! Owns the vector store and serves:
//! - `GET /` health and collection summary
//! - `POST /ingest` to store embedded chunks
//! - `GET /query` for nearest-neighbour retrieval

mod handlers;
mod middleware;
mod routes;
mod state;

use anyhow::Context;
use finrag_common::{
    config::AppConfig, embeddings::create_embedder, metrics, telemetry, VectorStore, VERSION,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().context("failed to load configuration")?;

    telemetry::init_tracing(&config.observability);
    info!("Starting FinRAG API v{}", VERSION);

    metrics::install_exporter(config.observability.metrics_port)?;

    // Process-wide handles, built once
    // Loading a local model blocks on download and weight initialisation
    let embedding_config = config.embedding.clone();
    let embedder = tokio::task::spawn_blocking(move || create_embedder(&embedding_config)).await??;
    let store = VectorStore::open(&config.store)
        .await?
        .with_embedding_model(embedder.model_name(), embedder.dimension());

    // The collection must exist before any traffic is accepted
    let collection = store.get_or_create_collection(&config.store.collection).await?;
    info!(
        collection = %collection.name,
        count = collection.count,
        metric = %collection.metric,
        "Vector store ready"
    );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid server.host/server.port")?;

    let state = AppState::new(config, embedder, Arc::new(store));
    let app = routes::create_router(state);

    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
