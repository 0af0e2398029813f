//! Retrieval error types

use thiserror::Error;

/// Errors produced by chunking, indexing and retrieval
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// Invalid chunking or search parameters
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Vector/chunk counts differ, or a vector has the wrong width
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// A vector contains NaN or infinite components
    #[error("Invalid vector: {0}")]
    InvalidVector(String),

    /// Search against an index holding zero vectors
    #[error("Index is empty")]
    EmptyIndex,

    /// Query issued before any report index was built
    #[error("Report index not built yet")]
    NotReady,

    /// Embedding collaborator failed (network, timeout, malformed response)
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Source document unreadable or without usable text
    #[error("Text extraction failed: {0}")]
    Extraction(String),

    /// Persisted index artifacts are missing pieces or inconsistent
    #[error("Corrupt index snapshot: {0}")]
    CorruptSnapshot(String),

    #[error("API key not configured. Set EMBEDDING_API_KEY or AZURE_OPENAI_KEY")]
    ApiKeyMissing,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type RetrievalResult<T> = Result<T, RetrievalError>;

impl RetrievalError {
    /// Message safe to hand back to an end user in place of a stack trace
    pub fn user_message(&self) -> String {
        match self {
            RetrievalError::NotReady => {
                "No report has been generated yet. Generate a report before asking about it."
                    .to_string()
            }
            RetrievalError::EmptyIndex => {
                "There is no indexed content to search.".to_string()
            }
            RetrievalError::Embedding(_) => {
                "The embedding service is unavailable right now. Please try again.".to_string()
            }
            RetrievalError::Extraction(_) => {
                "The document could not be read or contains no usable text.".to_string()
            }
            RetrievalError::ApiKeyMissing => {
                "The embedding service is not configured.".to_string()
            }
            RetrievalError::CorruptSnapshot(_) => {
                "The reference knowledge base is damaged and must be re-ingested.".to_string()
            }
            _ => self.to_string(),
        }
    }

    /// Stable code for logs and API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            RetrievalError::Configuration(_) => "CONFIGURATION",
            RetrievalError::DimensionMismatch(_) => "DIMENSION_MISMATCH",
            RetrievalError::InvalidVector(_) => "INVALID_VECTOR",
            RetrievalError::EmptyIndex => "EMPTY_INDEX",
            RetrievalError::NotReady => "NOT_READY",
            RetrievalError::Embedding(_) => "EMBEDDING_FAILURE",
            RetrievalError::Extraction(_) => "EXTRACTION_FAILURE",
            RetrievalError::CorruptSnapshot(_) => "CORRUPT_SNAPSHOT",
            RetrievalError::ApiKeyMissing => "API_KEY_MISSING",
            RetrievalError::Io(_) => "IO_ERROR",
            RetrievalError::Json(_) => "JSON_ERROR",
        }
    }

    /// Whether repeating the same call may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, RetrievalError::Embedding(_))
    }

    /// User-facing conditions that are reported back, not logged as faults
    pub fn is_expected(&self) -> bool {
        matches!(self, RetrievalError::NotReady | RetrievalError::EmptyIndex)
    }
}
