//! Ingestion transport
//!
//! Ships embedded chunks to the API's `POST /ingest` endpoint as a JSON array
//! of indexed records. One attempt per call, bounded by the client timeout;
//! retrying is left to the caller.

use crate::errors::{IngestionError, TransmissionError};
use finrag_common::metrics;
use finrag_common::models::{Chunk, IndexedRecord};
use serde::Deserialize;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

/// Body of a successful `POST /ingest` response
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IngestSummary {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    pub ingested: usize,
    pub collection_name: String,
    #[serde(default)]
    pub current_document_count: Option<usize>,
}

/// HTTP client for the ingest endpoint
#[derive(Debug, Clone)]
pub struct IngestClient {
    client: reqwest::Client,
    api_url: String,
    timeout: Duration,
}

impl IngestClient {
    /// Build the client once; it is reused for every batch
    pub fn new(api_url: impl Into<String>, timeout: Duration) -> Result<Self, IngestionError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IngestionError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_url: api_url.into(),
            timeout,
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Send `chunks`, reporting success as a boolean. Failures are logged.
    pub async fn send(&self, chunks: &[Chunk]) -> bool {
        match self.try_send(chunks).await {
            Ok(summary) => {
                info!(
                    ingested = summary.ingested,
                    collection = %summary.collection_name,
                    total = ?summary.current_document_count,
                    "Records ingested"
                );
                true
            }
            Err(e) => {
                error!(url = %self.api_url, error = %e, "Failed to send records");
                false
            }
        }
    }

    /// Send `chunks` and return the server's summary.
    ///
    /// Chunks without an embedding, or that fail record validation, are
    /// skipped and never transmitted.
    #[instrument(skip(self, chunks), fields(url = %self.api_url, chunks = chunks.len()))]
    pub async fn try_send(&self, chunks: &[Chunk]) -> Result<IngestSummary, TransmissionError> {
        let records = to_records(chunks);
        let skipped = chunks.len() - records.len();

        let result = self.post(&records).await;
        metrics::record_transport(
            if result.is_ok() { records.len() } else { 0 },
            skipped,
            result.is_ok(),
        );
        result
    }

    async fn post(&self, records: &[IndexedRecord]) -> Result<IngestSummary, TransmissionError> {
        if records.is_empty() {
            return Err(TransmissionError::NothingToSend);
        }

        let response = self
            .client
            .post(&self.api_url)
            .json(records)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransmissionError::Timeout(self.timeout)
                } else {
                    TransmissionError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransmissionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                TransmissionError::Timeout(self.timeout)
            } else {
                TransmissionError::Network(e.to_string())
            }
        })?;

        serde_json::from_slice(&bytes).map_err(|e| TransmissionError::MalformedResponse(e.to_string()))
    }
}

fn to_records(chunks: &[Chunk]) -> Vec<IndexedRecord> {
    chunks
        .iter()
        .filter_map(|chunk| {
            if !chunk.has_embedding() {
                warn!(chunk_id = %chunk.id, "Skipping chunk without embedding");
                return None;
            }
            match IndexedRecord::try_from(chunk) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(chunk_id = %chunk.id, error = %e, "Skipping invalid chunk");
                    None
                }
            }
        })
        .collect()
}
