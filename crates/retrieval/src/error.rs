//! Error taxonomy for the retrieval core.

use scholar_core::AppError;
use thiserror::Error;

/// Errors returned by the validator, the chunk stores and the search service.
///
/// Nothing in this crate retries; every variant goes back to the immediate
/// caller.
#[derive(Error, Debug)]
pub enum RetrievalError {
    /// Vector length differs from the configured dimension.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    Dimension { expected: usize, actual: usize },

    /// Vector holds NaN or an infinity.
    #[error("embedding component {position} is not a finite number")]
    NonFinite { position: usize },

    /// Embedding write targeted a chunk that was never created.
    #[error("chunk not found: {0}")]
    NotFound(String),

    /// A chunk with this id already exists; chunk content is immutable.
    #[error("chunk already exists: {0}")]
    AlreadyExists(String),

    /// The `(paper_id, idx)` position is already taken by another chunk.
    #[error("paper '{paper_id}' already has a chunk at position {idx}")]
    DuplicatePosition { paper_id: String, idx: u32 },

    /// Search limit was zero.
    #[error("search limit must be positive, got {0}")]
    InvalidLimit(usize),

    /// Durable store was created under a different dimension or metric.
    #[error("store was created with {stored}, but configuration requests {configured}")]
    ConfigMismatch { stored: String, configured: String },

    /// Configuration values are unusable.
    #[error("invalid retrieval configuration: {0}")]
    InvalidConfig(String),

    /// Underlying storage is unavailable or inconsistent.
    #[error("storage failure: {0}")]
    Storage(String),

    /// A blocking worker died before producing a result.
    #[error("background task failed: {0}")]
    Task(String),
}

impl From<rusqlite::Error> for RetrievalError {
    fn from(err: rusqlite::Error) -> Self {
        RetrievalError::Storage(err.to_string())
    }
}

impl From<RetrievalError> for AppError {
    fn from(err: RetrievalError) -> Self {
        AppError::Retrieval(err.to_string())
    }
}

/// Convenience type alias for retrieval results.
pub type RetrievalResult<T> = Result<T, RetrievalError>;
