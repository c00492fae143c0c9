//! Health check handler

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
    pub store_connected: bool,
    pub collection_name: Option<String>,
    pub document_count: usize,
}

/// Liveness plus a summary of the active collection
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let store_connected = state.store.is_initialized().await;
    let collection_name = state.store.collection_name().await;
    let document_count = state.store.count().await;

    Json(HealthResponse {
        status: "ok".to_string(),
        message: "FinRAG API is running".to_string(),
        store_connected,
        collection_name,
        document_count,
    })
}
