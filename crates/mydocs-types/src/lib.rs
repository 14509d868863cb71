//! # mydocs-types
//!
//! Shared domain types for mydocs, the local semantic search engine over
//! markdown documents.
//!
//! - Documents: indexed source files keyed by path
//! - Chunks: heading-scoped passages handed to the store
//! - Search results: passage/document projections with distance or score
//! - Settings: layered configuration

pub mod config;
pub mod document;
pub mod error;

pub use config::Settings;
pub use document::{Chunk, Document, ScoredResult, SearchResult};
pub use error::MydocsError;
