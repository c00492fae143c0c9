//! A single named collection and its on-disk snapshot
//!
//! Layout: `<root>/<name>/collection.json` holding the manifest and every
//! record. Writes go to `collection.json.tmp` first and are renamed over the
//! previous snapshot, so a reader of the directory never sees a partial batch.

use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use super::DistanceMetric;
use crate::errors::{AppError, Result};
use crate::models::{IndexedRecord, ScoredRecord};

const SNAPSHOT_FILE: &str = "collection.json";
const SNAPSHOT_TMP_FILE: &str = "collection.json.tmp";

/// Persistent description of a collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionManifest {
    pub name: String,
    pub metric: DistanceMetric,
    /// Fixed by configuration or by the first stored batch
    pub dimension: Option<usize>,
    pub embedding_model: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Summary returned by `get_or_create_collection`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionInfo {
    pub name: String,
    pub metric: DistanceMetric,
    pub dimension: Option<usize>,
    pub count: usize,
}

#[derive(Deserialize)]
struct StoredSnapshot {
    manifest: CollectionManifest,
    records: Vec<IndexedRecord>,
}

/// Borrowing view used to write `existing ++ added` without cloning records
struct SnapshotRef<'a> {
    manifest: &'a CollectionManifest,
    existing: &'a [IndexedRecord],
    added: &'a [IndexedRecord],
}

struct RecordsRef<'a>(&'a [IndexedRecord], &'a [IndexedRecord]);

impl Serialize for RecordsRef<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter().chain(self.1.iter()))
    }
}

impl Serialize for SnapshotRef<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Snapshot", 2)?;
        state.serialize_field("manifest", self.manifest)?;
        state.serialize_field("records", &RecordsRef(self.existing, self.added))?;
        state.end()
    }
}

#[derive(Debug)]
pub(crate) struct Collection {
    dir: PathBuf,
    manifest: CollectionManifest,
    records: Vec<IndexedRecord>,
    ids: HashSet<String>,
}

impl Collection {
    /// Load `<root>/<name>` if it exists, otherwise create and persist it empty
    pub(crate) async fn open_or_create(
        root: &Path,
        name: &str,
        metric: DistanceMetric,
        embedding: Option<(&str, usize)>,
    ) -> Result<Self> {
        let dir = root.join(name);
        let path = dir.join(SNAPSHOT_FILE);

        if tokio::fs::try_exists(&path).await? {
            let collection = Self::load(dir, &path).await?;
            collection.check_compatible(metric, embedding)?;
            tracing::info!(
                collection = %name,
                count = collection.len(),
                metric = %collection.manifest.metric,
                "Loaded existing collection"
            );
            return Ok(collection);
        }

        tokio::fs::create_dir_all(&dir).await?;
        let now = Utc::now();
        let collection = Self {
            dir,
            manifest: CollectionManifest {
                name: name.to_string(),
                metric,
                dimension: embedding.map(|(_, dim)| dim),
                embedding_model: embedding.map(|(model, _)| model.to_string()),
                created_at: now,
                updated_at: now,
            },
            records: Vec::new(),
            ids: HashSet::new(),
        };
        collection.persist(&collection.manifest, &[]).await?;

        tracing::info!(collection = %name, metric = %metric, "Created collection");
        Ok(collection)
    }

    async fn load(dir: PathBuf, path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let snapshot: StoredSnapshot = serde_json::from_slice(&bytes).map_err(|e| {
            AppError::internal_store(format!("corrupt snapshot {}: {}", path.display(), e))
        })?;

        let mut ids = HashSet::with_capacity(snapshot.records.len());
        for record in &snapshot.records {
            if !ids.insert(record.id.clone()) {
                return Err(AppError::internal_store(format!(
                    "snapshot {} contains duplicate id '{}'",
                    path.display(),
                    record.id
                )));
            }
        }

        Ok(Self {
            dir,
            manifest: snapshot.manifest,
            records: snapshot.records,
            ids,
        })
    }

    /// The metric and embedding model of a collection never change after creation
    fn check_compatible(&self, metric: DistanceMetric, embedding: Option<(&str, usize)>) -> Result<()> {
        if self.manifest.metric != metric {
            return Err(AppError::Configuration {
                message: format!(
                    "collection '{}' uses metric '{}' but '{}' is configured",
                    self.manifest.name, self.manifest.metric, metric
                ),
            });
        }

        if let Some((model, dimension)) = embedding {
            if let Some(stored) = &self.manifest.embedding_model {
                if stored != model {
                    return Err(AppError::Configuration {
                        message: format!(
                            "collection '{}' was indexed with model '{}' but '{}' is configured",
                            self.manifest.name, stored, model
                        ),
                    });
                }
            }
            if let Some(stored) = self.manifest.dimension {
                if stored != dimension {
                    return Err(AppError::Configuration {
                        message: format!(
                            "collection '{}' has dimension {} but {} is configured",
                            self.manifest.name, stored, dimension
                        ),
                    });
                }
            }
        }

        Ok(())
    }

    pub(crate) fn name(&self) -> &str {
        &self.manifest.name
    }

    pub(crate) fn manifest(&self) -> &CollectionManifest {
        &self.manifest
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    pub(crate) fn info(&self) -> CollectionInfo {
        CollectionInfo {
            name: self.manifest.name.clone(),
            metric: self.manifest.metric,
            dimension: self.manifest.dimension,
            count: self.records.len(),
        }
    }

    /// Validate, persist, then commit a batch. Nothing changes unless every
    /// record is accepted and the snapshot is written.
    pub(crate) async fn add(&mut self, records: Vec<IndexedRecord>) -> Result<usize> {
        let Some(first) = records.first() else {
            return Err(AppError::EmptyBatch {
                message: "No records to add".to_string(),
            });
        };
        let dimension = self.manifest.dimension.unwrap_or(first.embedding.len());

        let mut batch_ids = HashSet::with_capacity(records.len());
        for record in &records {
            record.check()?;
            if record.embedding.len() != dimension {
                return Err(AppError::DimensionMismatch {
                    expected: dimension,
                    actual: record.embedding.len(),
                });
            }
            if self.ids.contains(&record.id) || !batch_ids.insert(record.id.as_str()) {
                return Err(AppError::DuplicateId {
                    id: record.id.clone(),
                });
            }
        }

        let mut manifest = self.manifest.clone();
        manifest.dimension = Some(dimension);
        manifest.updated_at = Utc::now();

        self.persist(&manifest, &records).await?;

        self.manifest = manifest;
        self.ids.extend(records.iter().map(|r| r.id.clone()));
        let added = records.len();
        self.records.extend(records);
        Ok(added)
    }

    /// Up to `top_k` records by ascending distance; ties keep insertion order
    pub(crate) fn nearest(&self, embedding: &[f32], top_k: usize) -> Result<Vec<ScoredRecord>> {
        if let Some(dimension) = self.manifest.dimension {
            if embedding.len() != dimension {
                return Err(AppError::DimensionMismatch {
                    expected: dimension,
                    actual: embedding.len(),
                });
            }
        }

        let metric = self.manifest.metric;
        let mut scored: Vec<(usize, f32)> = self
            .records
            .iter()
            .enumerate()
            .map(|(i, record)| (i, metric.distance(&record.embedding, embedding)))
            .collect();

        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .map(|(i, distance)| {
                let record = &self.records[i];
                ScoredRecord {
                    id: record.id.clone(),
                    text: record.text.clone(),
                    metadata: record.metadata.clone(),
                    distance,
                }
            })
            .collect())
    }

    async fn persist(&self, manifest: &CollectionManifest, added: &[IndexedRecord]) -> Result<()> {
        let snapshot = SnapshotRef {
            manifest,
            existing: &self.records,
            added,
        };
        let bytes = serde_json::to_vec(&snapshot)?;

        let tmp = self.dir.join(SNAPSHOT_TMP_FILE);
        let path = self.dir.join(SNAPSHOT_FILE);

        let write = async {
            let mut file = tokio::fs::File::create(&tmp).await?;
            file.write_all(&bytes).await?;
            file.sync_all().await?;
            tokio::fs::rename(&tmp, &path).await
        };

        write.await.map_err(|e| {
            AppError::internal_store(format!("failed to write {}: {}", path.display(), e))
        })
    }
}
