//! Store error types.

use thiserror::Error;

/// Errors that can occur in the vector store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// RocksDB operation failed
    #[error("Database error: {0}")]
    Database(#[from] rocksdb::Error),

    /// usearch index error
    #[error("Index error: {0}")]
    Index(String),

    /// Column family not found
    #[error("Column family not found: {0}")]
    ColumnFamilyNotFound(String),

    /// Key encoding/decoding error
    #[error("Key error: {0}")]
    Key(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Dimension mismatch
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A document with this path already exists
    #[error("Document already exists: {0}")]
    DuplicatePath(String),

    /// Store directory or document not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Mutation attempted on a read-only handle
    #[error("Store is open read-only")]
    ReadOnly,

    /// A lock was poisoned by a panicking thread
    #[error("Lock poisoned: {0}")]
    Poisoned(&'static str),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}
