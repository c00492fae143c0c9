//! FinRAG Common Library
//!
//! Shared code for the FinRAG ingestion pipeline and retrieval API:
//! - Document, chunk and indexed-record models
//! - Embedding client abstraction
//! - On-disk vector store with nearest-neighbour query
//! - Query service
//! - Error types, configuration, logging and metrics

pub mod config;
pub mod embeddings;
pub mod errors;
pub mod metrics;
pub mod models;
pub mod retrieval;
pub mod store;
pub mod telemetry;

// Re-export commonly used types
pub use config::AppConfig;
pub use embeddings::Embedder;
pub use errors::{AppError, Result};
pub use models::{Chunk, Document, IndexedRecord, Metadata, ScoredRecord};
pub use retrieval::QueryService;
pub use store::{DistanceMetric, VectorStore};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default embedding model
pub const DEFAULT_EMBEDDING_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";

/// Default embedding dimension
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 384;

/// Default collection name
pub const DEFAULT_COLLECTION_NAME: &str = "financial_documents";
