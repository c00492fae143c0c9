//! Wire and storage schema for embedded chunks

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use super::{Chunk, Metadata};
use crate::errors::{AppError, Result};

/// Persisted form of a chunk: the body of `POST /ingest` and the unit of
/// storage inside a collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct IndexedRecord {
    #[validate(length(min = 1, max = 512))]
    pub id: String,

    pub text: String,

    #[validate(length(min = 1), custom(function = "finite_components"))]
    pub embedding: Vec<f32>,

    #[serde(default)]
    pub metadata: Metadata,
}

#[allow(clippy::ptr_arg)]
fn finite_components(embedding: &Vec<f32>) -> std::result::Result<(), ValidationError> {
    if embedding.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(ValidationError::new("non_finite_embedding"))
    }
}

impl IndexedRecord {
    /// Validate and map failures to `AppError::Validation`
    pub fn check(&self) -> Result<()> {
        self.validate().map_err(|e| {
            AppError::validation(format!("record '{}': {}", self.id, e))
        })
    }
}

impl TryFrom<&Chunk> for IndexedRecord {
    type Error = AppError;

    fn try_from(chunk: &Chunk) -> Result<Self> {
        let embedding = chunk.embedding.clone().ok_or_else(|| {
            AppError::validation(format!("chunk '{}' has no embedding", chunk.id))
        })?;

        let record = IndexedRecord {
            id: chunk.id.clone(),
            text: chunk.text.clone(),
            embedding,
            metadata: chunk.metadata.clone(),
        };
        record.check()?;
        Ok(record)
    }
}

/// A query hit, most similar first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRecord {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
    /// Distance to the query vector under the collection metric (lower is closer)
    pub distance: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(embedding: Option<Vec<f32>>) -> Chunk {
        Chunk {
            id: "c1".into(),
            text: "Revenue grew 12%".into(),
            metadata: Metadata::new(),
            embedding,
        }
    }

    #[test]
    fn test_chunk_without_embedding_is_rejected() {
        let err = IndexedRecord::try_from(&chunk(None)).unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[test]
    fn test_chunk_with_embedding_converts() {
        let record = IndexedRecord::try_from(&chunk(Some(vec![0.1, 0.2]))).unwrap();
        assert_eq!(record.id, "c1");
        assert_eq!(record.embedding, vec![0.1, 0.2]);
    }

    #[test]
    fn test_non_finite_embedding_is_rejected() {
        let record = IndexedRecord {
            id: "bad".into(),
            text: String::new(),
            embedding: vec![0.5, f32::NAN],
            metadata: Metadata::new(),
        };
        assert!(record.check().is_err());
    }

    #[test]
    fn test_empty_id_is_rejected() {
        let record = IndexedRecord {
            id: String::new(),
            text: "x".into(),
            embedding: vec![1.0],
            metadata: Metadata::new(),
        };
        assert!(record.check().is_err());
    }

    #[test]
    fn test_deserialize_wire_format() {
        let json = r#"{"id":"a","text":"t","embedding":[1.0,0.0],"metadata":{"file_name":"r.pdf"}}"#;
        let record: IndexedRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.metadata["file_name"], "r.pdf");
        assert!(record.check().is_ok());
    }
}
