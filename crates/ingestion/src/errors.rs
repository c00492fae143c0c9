//! Ingestion pipeline error types

use finrag_common::errors::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("PDF parse error for {path}: {message}")]
    PdfParseError { path: String, message: String },

    #[error("Chunking error: {0}")]
    ChunkingError(String),

    #[error("Embedding error: {0}")]
    EmbeddingError(String),

    #[error("Invalid record: {0}")]
    ValidationError(String),

    #[error("Nothing to ingest: {0}")]
    EmptyBatch(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Transmission to {url} failed")]
    TransmissionFailed { url: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<AppError> for IngestionError {
    fn from(e: AppError) -> Self {
        match e {
            AppError::NotFound { path } => IngestionError::FileNotFound(path),
            AppError::PdfParse { path, message } => IngestionError::PdfParseError { path, message },
            AppError::EmptyBatch { message } => IngestionError::EmptyBatch(message),
            AppError::Configuration { message } => IngestionError::ConfigError(message),
            AppError::Embedding { message } => IngestionError::EmbeddingError(message),
            AppError::Io(e) => IngestionError::IoError(e),
            e @ (AppError::Validation { .. }
            | AppError::QueryValidation { .. }
            | AppError::DimensionMismatch { .. }
            | AppError::DuplicateId { .. }) => IngestionError::ValidationError(e.to_string()),
            e @ (AppError::Internal { .. }
            | AppError::StoreNotInitialized
            | AppError::InternalStore { .. }
            | AppError::Transmission { .. }
            | AppError::RequestTimeout { .. }
            | AppError::Serialization(_)) => IngestionError::InternalError(e.to_string()),
        }
    }
}

/// Failure of a single transport attempt, surfaced by `IngestClient::try_send`
#[derive(Error, Debug)]
pub enum TransmissionError {
    #[error("no records with embeddings to send")]
    NothingToSend,

    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("network error: {0}")]
    Network(String),

    #[error("server responded {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    MalformedResponse(String),
}
