//! Embedding error types.

use thiserror::Error;

/// Errors that can occur during tokenization or embedding.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// Candle model error
    #[error("Candle error: {0}")]
    Candle(#[from] candle_core::Error),

    /// Vocabulary could not be loaded
    #[error("Vocabulary error: {0}")]
    Vocab(String),

    /// Model file not found
    #[error("Model file not found: {0}")]
    ModelNotFound(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Network output did not have the expected shape
    #[error("Unexpected output shape: expected {expected}, got {actual}")]
    Shape { expected: String, actual: String },

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Dimension mismatch
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}
