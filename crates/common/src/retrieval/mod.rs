//! Query service
//!
//! Embeds a natural-language query with the same model used at ingestion and
//! returns the nearest records from the active collection.

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, instrument};

use crate::embeddings::Embedder;
use crate::errors::{AppError, Result};
use crate::models::ScoredRecord;
use crate::store::VectorStore;

/// Shortest accepted query, in characters after trimming
pub const MIN_QUERY_CHARS: usize = 3;

/// Longest accepted query, in characters after trimming
pub const MAX_QUERY_CHARS: usize = 1000;

/// Results returned when the caller does not ask for a count
pub const DEFAULT_TOP_K: usize = 3;

/// Largest accepted `top_k`
pub const MAX_TOP_K: usize = 10;

/// Retrieval over the vector store
#[derive(Clone)]
pub struct QueryService {
    embedder: Arc<dyn Embedder>,
    store: Arc<VectorStore>,
}

impl QueryService {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<VectorStore>) -> Self {
        Self { embedder, store }
    }

    pub fn store(&self) -> &Arc<VectorStore> {
        &self.store
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Nearest records to `text`, most similar first
    #[instrument(skip(self), fields(model = %self.embedder.model_name()))]
    pub async fn answer(&self, text: &str, top_k: usize) -> Result<Vec<ScoredRecord>> {
        let text = validate_query(text, top_k)?;

        let start = Instant::now();
        let embedding = self.embedder.embed(text).await?;
        let hits = self.store.query(&embedding, top_k).await?;

        debug!(
            results = hits.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Query answered"
        );
        Ok(hits)
    }
}

/// Trim and bounds-check a query before any embedding work is done
pub fn validate_query(text: &str, top_k: usize) -> Result<&str> {
    let text = text.trim();
    let chars = text.chars().count();

    if chars < MIN_QUERY_CHARS {
        return Err(AppError::query_validation(format!(
            "query must be at least {} characters",
            MIN_QUERY_CHARS
        )));
    }
    if chars > MAX_QUERY_CHARS {
        return Err(AppError::query_validation(format!(
            "query must be at most {} characters",
            MAX_QUERY_CHARS
        )));
    }
    if !(1..=MAX_TOP_K).contains(&top_k) {
        return Err(AppError::query_validation(format!(
            "top_k must be between 1 and {}",
            MAX_TOP_K
        )));
    }

    Ok(text)
}
