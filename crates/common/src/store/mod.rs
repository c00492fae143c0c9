//! On-disk vector store
//!
//! Holds one active collection of indexed records and answers
//! nearest-neighbour queries by exhaustive scan under the collection metric.
//!
//! Writes to the active collection are serialised by a `tokio::sync::RwLock`;
//! queries share the read side and wait for an in-flight write to finish.
//! A write runs in its own task holding the owned write guard, so dropping
//! the caller's future never separates the snapshot on disk from memory.

mod collection;
mod distance;

pub use collection::{CollectionInfo, CollectionManifest};
pub use distance::DistanceMetric;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{info, instrument, Instrument};

use crate::config::StoreConfig;
use crate::errors::{AppError, Result};
use crate::metrics;
use crate::models::{IndexedRecord, ScoredRecord};
use collection::Collection;

/// Vector store rooted at a directory of persisted collections
#[derive(Debug)]
pub struct VectorStore {
    root: PathBuf,
    metric: DistanceMetric,
    embedding: Option<(String, usize)>,
    active: Arc<RwLock<Option<Collection>>>,
}

impl VectorStore {
    /// Open (creating if needed) the store directory
    pub async fn open(config: &StoreConfig) -> Result<Self> {
        tokio::fs::create_dir_all(&config.path).await.map_err(|e| {
            AppError::internal_store(format!(
                "cannot create store directory {}: {}",
                config.path.display(),
                e
            ))
        })?;

        info!(path = %config.path.display(), metric = %config.metric, "Vector store opened");

        Ok(Self {
            root: config.path.clone(),
            metric: config.metric,
            embedding: None,
            active: Arc::new(RwLock::new(None)),
        })
    }

    /// Bind the embedding model used with this store. New collections record
    /// it; existing collections must match it.
    pub fn with_embedding_model(mut self, model: impl Into<String>, dimension: usize) -> Self {
        self.embedding = Some((model.into(), dimension));
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Make `name` the active collection, loading or creating it. Idempotent.
    #[instrument(skip(self))]
    pub async fn get_or_create_collection(&self, name: &str) -> Result<CollectionInfo> {
        validate_collection_name(name)?;

        let mut active = self.active.write().await;
        if let Some(collection) = active.as_ref() {
            if collection.name() == name {
                return Ok(collection.info());
            }
        }

        let embedding = self
            .embedding
            .as_ref()
            .map(|(model, dimension)| (model.as_str(), *dimension));
        let collection = Collection::open_or_create(&self.root, name, self.metric, embedding).await?;
        let info = collection.info();
        *active = Some(collection);

        info!(collection = %info.name, count = info.count, "Collection is ready");
        Ok(info)
    }

    /// Persist a batch into the active collection, all or nothing.
    ///
    /// Fails with `EmptyBatch` for an empty batch and `DuplicateId` if any id
    /// is already stored or repeated within the batch; existing records are
    /// never overwritten. Returns the number of records added.
    ///
    /// Once the write lock is taken the batch is applied by a detached task,
    /// so a cancelled caller still leaves disk and memory in agreement.
    #[instrument(skip(self, records), fields(batch = records.len()))]
    pub async fn add_records(&self, records: Vec<IndexedRecord>) -> Result<usize> {
        let mut active = self.active.clone().write_owned().await;

        let write = tokio::spawn(
            async move {
                let collection = active.as_mut().ok_or(AppError::StoreNotInitialized)?;

                let added = collection.add(records).await?;
                metrics::record_ingestion(collection.name(), added, collection.len());

                info!(
                    collection = %collection.name(),
                    added,
                    total = collection.len(),
                    "Records added"
                );
                Ok::<_, AppError>(added)
            }
            .in_current_span(),
        );

        write
            .await
            .map_err(|e| AppError::internal_store(format!("store write task failed: {}", e)))?
    }

    /// Records in the active collection, 0 when none is active
    pub async fn count(&self) -> usize {
        self.active.read().await.as_ref().map_or(0, |c| c.len())
    }

    /// The `top_k` nearest records, most similar first.
    ///
    /// `top_k` larger than the collection is clamped to its size.
    #[instrument(skip(self, embedding), fields(dim = embedding.len()))]
    pub async fn query(&self, embedding: &[f32], top_k: usize) -> Result<Vec<ScoredRecord>> {
        let start = Instant::now();
        let active = self.active.read().await;
        let collection = active.as_ref().ok_or(AppError::StoreNotInitialized)?;

        if top_k == 0 {
            return Err(AppError::query_validation("top_k must be at least 1"));
        }
        if embedding.is_empty() {
            return Err(AppError::query_validation("query embedding is empty"));
        }

        let result = collection.nearest(embedding, top_k);
        metrics::record_query(
            start.elapsed().as_secs_f64(),
            collection.name(),
            result.as_ref().map_or(0, Vec::len),
            result.is_ok(),
        );
        result
    }

    pub async fn is_initialized(&self) -> bool {
        self.active.read().await.is_some()
    }

    pub async fn collection_name(&self) -> Option<String> {
        self.active
            .read()
            .await
            .as_ref()
            .map(|c| c.name().to_string())
    }

    pub async fn manifest(&self) -> Option<CollectionManifest> {
        self.active.read().await.as_ref().map(|c| c.manifest().clone())
    }
}

/// Collection names map to directories: ASCII letters, digits, `_`, `-`, `.`
fn validate_collection_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.len() <= 128
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));

    if valid {
        Ok(())
    } else {
        Err(AppError::Configuration {
            message: format!("invalid collection name '{}'", name),
        })
    }
}
