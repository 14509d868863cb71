//! Stored passage record and store statistics.

use serde::{Deserialize, Serialize};

use mydocs_types::Chunk;

/// A passage as persisted in the `passages` column family.
///
/// The vector lives separately in `passage_vectors` so that rebuilding the
/// ANN index never has to parse passage text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassageRecord {
    pub id: u64,
    pub document_id: u64,
    pub heading_path: String,
    pub heading_level: u32,
    pub content: String,
    pub start_line: u32,
}

impl PassageRecord {
    pub fn from_chunk(id: u64, document_id: u64, chunk: &Chunk) -> Self {
        Self {
            id,
            document_id,
            heading_path: chunk.heading_path.clone(),
            heading_level: chunk.heading_level,
            content: chunk.content.clone(),
            start_line: chunk.start_line,
        }
    }
}

/// Counts reported by [`crate::VectorStore::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StoreStats {
    pub documents: usize,
    pub passages: usize,
    /// Passages present in the ANN index
    pub vectors: usize,
    pub dimension: usize,
    /// Mutation counter of the database
    pub generation: u64,
}
