//! Reranker error types.

use mydocs_embeddings::EmbeddingError;
use thiserror::Error;

/// Errors that can occur while loading or running a cross-encoder.
#[derive(Debug, Error)]
pub enum RerankError {
    /// Candle model error
    #[error("Candle error: {0}")]
    Candle(#[from] candle_core::Error),

    /// Tokenizer or model file error
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid model configuration
    #[error("Invalid model config: {0}")]
    Config(String),

    /// Network output did not have the expected shape
    #[error("Unexpected output shape: expected {expected}, got {actual}")]
    Shape { expected: String, actual: String },
}
