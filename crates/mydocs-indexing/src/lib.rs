//! # mydocs-indexing
//!
//! Turns a directory of markdown files into stored, embedded passages.
//!
//! - [`MarkdownChunker`] splits a file into heading-scoped passages
//! - [`Indexer`] walks a directory and indexes changed files in parallel,
//!   pruning documents whose files disappeared

pub mod chunker;
pub mod error;
pub mod files;
pub mod indexer;

pub use chunker::{Chunker, MarkdownChunker};
pub use error::IndexingError;
pub use files::{collect_markdown_files, extract_title, hash_content};
pub use indexer::{
    resolve_directory, FileOutcome, IndexStats, Indexer, IndexerConfig, ProgressFn,
};
