//! Pipeline data model
//!
//! Documents flow from the loader to the chunker, chunks are embedded and
//! shipped as indexed records, and queries come back as scored records.

mod chunk;
mod document;
mod record;

pub use chunk::Chunk;
pub use document::Document;
pub use record::{IndexedRecord, ScoredRecord};

/// Free-form key/value metadata attached to documents, chunks and records
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Metadata keys written by the loader
pub mod keys {
    pub const FILE_NAME: &str = "file_name";
    pub const FILE_PATH: &str = "file_path";
    pub const PAGE_LABEL: &str = "page_label";
    pub const TOTAL_PAGES: &str = "total_pages";

    /// Metadata keys added by the chunker
    pub const DOCUMENT_ID: &str = "document_id";
    pub const CHUNK_INDEX: &str = "chunk_index";
    pub const START_CHAR_IDX: &str = "start_char_idx";
    pub const END_CHAR_IDX: &str = "end_char_idx";
}
