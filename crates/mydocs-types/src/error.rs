//! Error types shared across mydocs crates.

use thiserror::Error;

/// Unified error type for configuration and input handling.
#[derive(Debug, Error)]
pub enum MydocsError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid input error
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
