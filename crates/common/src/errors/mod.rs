//! Error types for the Verdant pipelines
//!
//! Provides:
//! - Distinct error types per failure mode
//! - HTTP status code mapping
//! - Stable machine-readable error codes
//! - Pipeline stage tags so a boundary response always says which stage failed

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors
    ValidationError,
    BadJson,
    MissingQuestion,
    MissingDocumentId,
    MissingObjectKey,

    // Resource errors
    DocNotFound,

    // Storage errors
    DownloadFailed,
    EmptyBytes,
    SignedUrlFailed,
    FetchFailed,

    // Parsing errors
    UnsupportedType,
    ParseTimeout,
    ParseJobFailed,
    ParseEmptyResult,
    ParseFetchError,
    ParseConversionError,
    NoUnits,
    NoChunks,

    // Embedding / completion errors
    EmbedServiceError,
    EmbedCountMismatch,
    CompletionServiceError,

    // Metadata / chunk store errors
    SelectFailed,
    InsertFailed,
    UpdateFailed,
    DeleteFailed,
    VectorRpcFailed,

    // Internal errors
    ConfigurationError,
    SerializationError,
    UpstreamError,
    Uncaught,
}

/// Store operation that failed, used to tag document/chunk store errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    Select,
    Insert,
    Update,
    Delete,
    MatchChunks,
}

impl StoreOp {
    fn code(self) -> ErrorCode {
        match self {
            StoreOp::Select => ErrorCode::SelectFailed,
            StoreOp::Insert => ErrorCode::InsertFailed,
            StoreOp::Update => ErrorCode::UpdateFailed,
            StoreOp::Delete => ErrorCode::DeleteFailed,
            StoreOp::MatchChunks => ErrorCode::VectorRpcFailed,
        }
    }

    fn stage(self) -> &'static str {
        match self {
            StoreOp::Select => "db.select",
            StoreOp::Insert => "chunks.insert",
            StoreOp::Update => "db.update",
            StoreOp::Delete => "chunks.clear",
            StoreOp::MatchChunks => "retrieve",
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation failed: {message}")]
    Validation { code: ErrorCode, message: String },

    // Resource errors
    #[error("Document not found: {id}")]
    DocNotFound { id: String },

    #[error("Document {id} has no object key; re-register the file")]
    MissingObjectKey { id: String },

    // Storage errors
    #[error("Storage download failed: {message}")]
    DownloadFailed { message: String },

    #[error("Downloaded empty file")]
    EmptyBytes,

    #[error("Signed URL request failed: {message}")]
    SignedUrlFailed { message: String },

    #[error("Object fetch failed: {message}")]
    FetchFailed { message: String },

    // Parsing errors
    #[error("Unsupported file type: {extension}. {hint}")]
    UnsupportedFormat { extension: String, hint: String },

    #[error("Parse job did not finish within {seconds}s")]
    ParseTimeout { seconds: u64 },

    #[error("Parse job failed: {message}")]
    ParseJobFailed { message: String },

    #[error("Parser returned an empty result")]
    ParseEmptyResult,

    #[error("Parser fetch failed: {message}")]
    ParseFetchError { message: String },

    #[error("Document conversion failed: {message}")]
    ParseConversionError { message: String },

    #[error("Parser returned no text units")]
    NoUnits,

    #[error("No chunks generated from parsed text")]
    NoChunks,

    // Embedding / completion errors
    #[error("Embedding service error: {message}")]
    EmbedService { message: String },

    #[error("Embedding count mismatch: expected {expected}, got {got}")]
    EmbedCountMismatch { expected: usize, got: usize },

    #[error("Completion service error: {message}")]
    CompletionService { message: String },

    // Metadata / chunk store errors
    #[error("Store {op:?} failed: {message}")]
    Store { op: StoreOp, message: String },

    // Internal errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl AppError {
    /// Shorthand for a validation failure with a stable code
    pub fn validation(code: ErrorCode, message: impl Into<String>) -> Self {
        AppError::Validation {
            code,
            message: message.into(),
        }
    }

    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { code, .. } => *code,
            AppError::DocNotFound { .. } => ErrorCode::DocNotFound,
            AppError::MissingObjectKey { .. } => ErrorCode::MissingObjectKey,
            AppError::DownloadFailed { .. } => ErrorCode::DownloadFailed,
            AppError::EmptyBytes => ErrorCode::EmptyBytes,
            AppError::SignedUrlFailed { .. } => ErrorCode::SignedUrlFailed,
            AppError::FetchFailed { .. } => ErrorCode::FetchFailed,
            AppError::UnsupportedFormat { .. } => ErrorCode::UnsupportedType,
            AppError::ParseTimeout { .. } => ErrorCode::ParseTimeout,
            AppError::ParseJobFailed { .. } => ErrorCode::ParseJobFailed,
            AppError::ParseEmptyResult => ErrorCode::ParseEmptyResult,
            AppError::ParseFetchError { .. } => ErrorCode::ParseFetchError,
            AppError::ParseConversionError { .. } => ErrorCode::ParseConversionError,
            AppError::NoUnits => ErrorCode::NoUnits,
            AppError::NoChunks => ErrorCode::NoChunks,
            AppError::EmbedService { .. } => ErrorCode::EmbedServiceError,
            AppError::EmbedCountMismatch { .. } => ErrorCode::EmbedCountMismatch,
            AppError::CompletionService { .. } => ErrorCode::CompletionServiceError,
            AppError::Store { op, .. } => op.code(),
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::HttpClient(_) => ErrorCode::UpstreamError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Internal { .. } => ErrorCode::Uncaught,
        }
    }

    /// Pipeline stage tag for boundary error responses
    pub fn stage(&self) -> &'static str {
        match self {
            AppError::Validation { .. } => "validate",
            AppError::DocNotFound { .. } => "db.fetch",
            AppError::MissingObjectKey { .. } => "validate",
            AppError::DownloadFailed { .. } | AppError::EmptyBytes => "storage.download",
            AppError::SignedUrlFailed { .. } => "sign",
            AppError::FetchFailed { .. } => "fetch.bytes",
            AppError::UnsupportedFormat { .. } => "parse",
            AppError::ParseTimeout { .. }
            | AppError::ParseJobFailed { .. }
            | AppError::ParseEmptyResult => "parse.pdf",
            AppError::ParseFetchError { .. } => "parse.fetch",
            AppError::ParseConversionError { .. } => "parse.convert",
            AppError::NoUnits => "parse.done",
            AppError::NoChunks => "chunk",
            AppError::EmbedService { .. } | AppError::EmbedCountMismatch { .. } => "embed",
            AppError::CompletionService { .. } => "llm",
            AppError::Store { op, .. } => op.stage(),
            AppError::Configuration { .. } => "config",
            AppError::HttpClient(_) => "upstream",
            AppError::Serialization(_) => "serialize",
            AppError::Internal { .. } => "unhandled",
        }
    }

    /// Get the HTTP status code for this error
    pub fn status(&self) -> u16 {
        match self {
            // 400 Bad Request
            AppError::Validation { .. } | AppError::MissingObjectKey { .. } => 400,
            AppError::UnsupportedFormat { .. } => 400,

            // 404 Not Found
            AppError::DocNotFound { .. } => 404,

            // 422 Unprocessable
            AppError::ParseEmptyResult
            | AppError::ParseConversionError { .. }
            | AppError::NoUnits
            | AppError::NoChunks => 422,

            // 502 Bad Gateway - upstream collaborator failed, caller may retry
            AppError::DownloadFailed { .. }
            | AppError::EmptyBytes
            | AppError::SignedUrlFailed { .. }
            | AppError::FetchFailed { .. }
            | AppError::ParseJobFailed { .. }
            | AppError::ParseFetchError { .. }
            | AppError::EmbedService { .. }
            | AppError::CompletionService { .. }
            | AppError::Store { .. }
            | AppError::HttpClient(_) => 502,

            // 504 Gateway Timeout
            AppError::ParseTimeout { .. } => 504,

            // 500 Internal Server Error
            AppError::EmbedCountMismatch { .. }
            | AppError::Configuration { .. }
            | AppError::Serialization(_)
            | AppError::Internal { .. } => 500,
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status() >= 500
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status())
    }
}
