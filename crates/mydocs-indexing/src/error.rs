//! Error types for the indexing pipeline.

use mydocs_embeddings::EmbeddingError;
use mydocs_store::StoreError;
use thiserror::Error;

/// Errors that can occur while indexing files
#[derive(Error, Debug)]
pub enum IndexingError {
    /// The indexing root is missing or not a directory
    #[error("Invalid directory: {0}")]
    InvalidDirectory(String),

    /// Reading a source file failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Store operation failed
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Embedding generation error
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    /// A worker task panicked or was aborted
    #[error("Worker error: {0}")]
    Worker(String),

    /// The run was cancelled before it finished
    #[error("Indexing cancelled")]
    Cancelled,
}
