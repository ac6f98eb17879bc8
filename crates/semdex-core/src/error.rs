//! Error types shared by the semdex pipeline.
//!
//! Each collaborator gets its own error so callers can apply the
//! per-stage failure policy: embedding failures drop a document,
//! classification failures only drop its metadata, store failures are
//! returned to whoever issued the store operation.

use thiserror::Error;

/// Failure to obtain an embedding vector for a piece of text.
#[derive(Error, Debug)]
pub enum EmbedError {
    /// The provider is configured as `disabled`.
    #[error("embedding provider is disabled")]
    Disabled,

    /// Transport-level failure (connect, timeout, TLS).
    #[error("embedding request failed: {0}")]
    Request(String),

    /// The provider answered with a non-success status.
    #[error("embedding API error {status}: {body}")]
    Api { status: u16, body: String },

    /// The provider answered, but not with a usable vector.
    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),

    /// The vector length differs from the dimension the corpus uses.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Failure of the classification collaborator. Never fatal to a document.
#[derive(Error, Debug)]
pub enum ClassifyError {
    #[error("classification request failed: {0}")]
    Request(String),

    #[error("classification API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("invalid classification response: {0}")]
    InvalidResponse(String),
}

/// Failure of a vector store operation.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The backing datastore reported an error.
    #[error("store backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A document's embedding length differs from the rest of the corpus.
    #[error("embedding dimension mismatch: corpus uses {expected}, document has {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A stored row could not be decoded back into a document.
    #[error("corrupt record {id}: {reason}")]
    Corrupt { id: String, reason: String },
}

impl StoreError {
    /// Wrap any backend error (sqlx, I/O, ...) as [`StoreError::Backend`].
    pub fn backend<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        StoreError::Backend(err.into())
    }
}

/// Failure of a search request after the short-circuit checks.
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("could not embed query: {0}")]
    Embedding(#[from] EmbedError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
