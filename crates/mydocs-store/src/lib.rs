//! # mydocs-store
//!
//! Durable storage for mydocs: documents, heading-scoped passages and their
//! embedding vectors, with an HNSW index for approximate nearest-neighbor
//! search by cosine distance.
//!
//! ## Usage
//! ```ignore
//! use mydocs_store::VectorStore;
//!
//! let store = VectorStore::open("mydocs.db", 384)?;
//! let id = store.insert_document("/docs/guide.md", &hash, "Guide")?;
//! store.insert_passages(id, &chunks, &vectors)?;
//! let hits = store.search(&query_vector, 10)?;
//! ```

pub mod column_families;
pub mod error;
pub mod hnsw;
pub mod keys;
pub mod records;
pub mod store;

pub use error::StoreError;
pub use hnsw::{HnswConfig, HnswIndex};
pub use records::{PassageRecord, StoreStats};
pub use store::VectorStore;
