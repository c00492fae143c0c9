//! Error types for FinRAG services
//!
//! Provides:
//! - Distinct error variants for each failure mode of the pipeline
//! - HTTP status code mapping
//! - Structured error responses
//! - Numeric error codes for client handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Input errors (1xxx)
    ValidationError,
    QueryValidation,
    EmptyBatch,
    DimensionMismatch,

    // Resource errors (4xxx)
    NotFound,

    // Conflict errors (5xxx)
    DuplicateId,

    // Timeout errors (6xxx)
    RequestTimeout,

    // Storage errors (7xxx)
    StoreNotInitialized,
    InternalStore,

    // External service errors (8xxx)
    EmbeddingError,
    TransmissionError,
    PdfParseError,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::ValidationError => 1001,
            ErrorCode::QueryValidation => 1002,
            ErrorCode::EmptyBatch => 1003,
            ErrorCode::DimensionMismatch => 1004,

            ErrorCode::NotFound => 4001,

            ErrorCode::DuplicateId => 5001,

            ErrorCode::RequestTimeout => 6001,

            ErrorCode::StoreNotInitialized => 7001,
            ErrorCode::InternalStore => 7002,

            ErrorCode::EmbeddingError => 8001,
            ErrorCode::TransmissionError => 8002,
            ErrorCode::PdfParseError => 8003,

            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Input errors
    #[error("Validation failed: {message}")]
    Validation { message: String },

    #[error("Invalid query: {message}")]
    QueryValidation { message: String },

    #[error("Empty batch: {message}")]
    EmptyBatch { message: String },

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    // Resource errors
    #[error("File not found: {path}")]
    NotFound { path: String },

    #[error("Duplicate record id: {id}")]
    DuplicateId { id: String },

    #[error("Request timed out after {timeout_ms}ms")]
    RequestTimeout { timeout_ms: u64 },

    // Storage errors
    #[error("Collection not initialized. Call get_or_create_collection() first")]
    StoreNotInitialized,

    #[error("Vector store error: {message}")]
    InternalStore { message: String },

    // External errors
    #[error("Embedding service error: {message}")]
    Embedding { message: String },

    #[error("Transmission failed: {message}")]
    Transmission { message: String },

    #[error("PDF parse error for {path}: {message}")]
    PdfParse { path: String, message: String },

    // Internal errors
    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::QueryValidation { .. } => ErrorCode::QueryValidation,
            AppError::EmptyBatch { .. } => ErrorCode::EmptyBatch,
            AppError::DimensionMismatch { .. } => ErrorCode::DimensionMismatch,
            AppError::NotFound { .. } => ErrorCode::NotFound,
            AppError::DuplicateId { .. } => ErrorCode::DuplicateId,
            AppError::RequestTimeout { .. } => ErrorCode::RequestTimeout,
            AppError::StoreNotInitialized => ErrorCode::StoreNotInitialized,
            AppError::InternalStore { .. } => ErrorCode::InternalStore,
            AppError::Embedding { .. } => ErrorCode::EmbeddingError,
            AppError::Transmission { .. } => ErrorCode::TransmissionError,
            AppError::PdfParse { .. } => ErrorCode::PdfParseError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Io(_) => ErrorCode::InternalError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation { .. }
            | AppError::QueryValidation { .. }
            | AppError::EmptyBatch { .. }
            | AppError::DimensionMismatch { .. } => StatusCode::BAD_REQUEST,

            // 404 Not Found
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,

            // 409 Conflict
            AppError::DuplicateId { .. } => StatusCode::CONFLICT,

            // 408 Request Timeout
            AppError::RequestTimeout { .. } => StatusCode::REQUEST_TIMEOUT,

            // 502 Bad Gateway
            AppError::Embedding { .. } | AppError::Transmission { .. } => StatusCode::BAD_GATEWAY,

            // 500 Internal Server Error
            AppError::StoreNotInitialized
            | AppError::InternalStore { .. }
            | AppError::PdfParse { .. }
            | AppError::Internal { .. }
            | AppError::Configuration { .. }
            | AppError::Serialization(_)
            | AppError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation { message: message.into() }
    }

    pub fn query_validation(message: impl Into<String>) -> Self {
        AppError::QueryValidation { message: message.into() }
    }

    pub fn internal_store(message: impl Into<String>) -> Self {
        AppError::InternalStore { message: message.into() }
    }
}

/// Structured error response for API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: u16,
    pub kind: ErrorCode,
    pub status: u16,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        // Log based on severity
        if self.is_server_error() {
            tracing::error!(
                error = %message,
                code = code.as_code(),
                status = status.as_u16(),
                "Server error"
            );
        } else {
            tracing::warn!(
                error = %message,
                code = code.as_code(),
                status = status.as_u16(),
                "Client error"
            );
        }

        let body = ErrorResponse {
            error: ErrorDetails {
                code: code.as_code(),
                kind: code,
                status: status.as_u16(),
                message,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration {
            message: err.to_string(),
        }
    }
}
