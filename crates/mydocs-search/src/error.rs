//! Search error types.

use mydocs_embeddings::EmbeddingError;
use mydocs_store::StoreError;
use thiserror::Error;

/// Errors returned by [`crate::SearchService`].
///
/// Reranker failures never appear here; the service falls back to vector
/// order instead.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Reranking was required but no reranker is loaded
    #[error("Reranking requested but no reranker is available")]
    RerankerUnavailable,

    /// Query embedding failed
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    /// Vector store failure
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The caller cancelled the request
    #[error("Search cancelled")]
    Cancelled,
}
