//! Ingestion handler

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use finrag_common::{
    errors::{AppError, Result},
    IndexedRecord,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct IngestResponse {
    pub status: String,
    pub message: String,
    pub ingested: usize,
    pub collection_name: String,
    pub current_document_count: usize,
}

/// Store a JSON array of indexed records in the active collection
pub async fn ingest(
    State(state): State<AppState>,
    payload: std::result::Result<Json<Vec<IndexedRecord>>, JsonRejection>,
) -> Result<Json<IngestResponse>> {
    let start = Instant::now();

    let Json(records) = payload.map_err(|rejection| {
        AppError::validation(format!("Invalid ingest payload: {}", rejection.body_text()))
    })?;

    if records.is_empty() {
        return Err(AppError::EmptyBatch {
            message: "No data provided for ingestion".to_string(),
        });
    }

    let ingested = state.store.add_records(records).await?;
    let collection_name = state
        .store
        .collection_name()
        .await
        .ok_or(AppError::StoreNotInitialized)?;
    let current_document_count = state.store.count().await;

    tracing::info!(
        ingested,
        collection = %collection_name,
        total = current_document_count,
        latency_ms = start.elapsed().as_millis() as u64,
        "Ingest completed"
    );

    Ok(Json(IngestResponse {
        status: "success".to_string(),
        message: format!("Successfully ingested {} documents.", ingested),
        ingested,
        collection_name,
        current_document_count,
    }))
}
