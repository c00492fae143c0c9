//! Chunk (node) produced by the chunker and filled in by the embedder

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{keys, Metadata};

/// A bounded segment of a document's text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Deterministic id derived from the parent document and chunk index
    pub id: String,

    /// Chunk content
    pub text: String,

    /// Parent metadata plus chunk position fields
    pub metadata: Metadata,

    /// Populated once by the embedder
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Chunk {
    /// Build the id for chunk `index` of `document_id`
    pub fn make_id(document_id: &str, index: usize) -> String {
        let mut hasher = Sha256::new();
        hasher.update(document_id.as_bytes());
        hasher.update(b":");
        hasher.update(index.to_string().as_bytes());
        let digest = hex::encode(hasher.finalize());
        digest[..32].to_string()
    }

    /// Document-local sequence index
    pub fn index(&self) -> Option<usize> {
        self.usize_field(keys::CHUNK_INDEX)
    }

    /// Start offset (characters) in the parent text
    pub fn start_char(&self) -> Option<usize> {
        self.usize_field(keys::START_CHAR_IDX)
    }

    /// End offset (characters, exclusive) in the parent text
    pub fn end_char(&self) -> Option<usize> {
        self.usize_field(keys::END_CHAR_IDX)
    }

    pub fn has_embedding(&self) -> bool {
        self.embedding.is_some()
    }

    fn usize_field(&self, key: &str) -> Option<usize> {
        self.metadata
            .get(key)
            .and_then(|v| v.as_u64())
            .map(|v| v as usize)
    }
}
