//! Document, chunk and search result types.
//!
//! A [`Document`] owns many passages. Passages enter the store as [`Chunk`]s
//! and come back out of a vector query as [`SearchResult`]s.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Breadcrumb used for text that precedes any heading.
pub const ROOT_HEADING_PATH: &str = "(root)";

/// An indexed source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Store-assigned identifier
    pub id: u64,
    /// File path (unique key)
    pub file_path: String,
    /// Hex SHA-256 of the raw file contents
    pub file_hash: String,
    /// Display title
    pub title: String,
    /// When the document was indexed
    pub indexed_at: DateTime<Utc>,
}

/// A heading-scoped span of a document, as produced by a chunker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Breadcrumb such as `# Guide > ## Install`
    pub heading_path: String,
    /// Depth of the innermost heading (0 for root text)
    pub heading_level: u32,
    /// Raw passage text
    pub content: String,
    /// 1-based line the passage starts on
    pub start_line: u32,
}

impl Chunk {
    pub fn new(
        heading_path: impl Into<String>,
        heading_level: u32,
        content: impl Into<String>,
        start_line: u32,
    ) -> Self {
        Self {
            heading_path: heading_path.into(),
            heading_level,
            content: content.into(),
            start_line,
        }
    }

    /// Chunk for text outside any heading.
    pub fn root(content: impl Into<String>) -> Self {
        Self::new(ROOT_HEADING_PATH, 0, content, 1)
    }
}

/// A passage joined with its document, plus its cosine distance to a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Passage identifier
    pub passage_id: u64,
    pub file_path: String,
    pub title: String,
    pub heading_path: String,
    pub content: String,
    pub start_line: u32,
    /// Cosine distance: 0 = same direction, 2 = opposite
    pub distance: f32,
}

impl SearchResult {
    /// Similarity derived from the distance (`1 - distance`).
    pub fn similarity(&self) -> f32 {
        1.0 - self.distance
    }
}

/// A search result scored by a cross-encoder.
///
/// Scores are raw logits: higher is more relevant, and values are not
/// comparable across queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredResult {
    pub result: SearchResult,
    pub score: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(distance: f32) -> SearchResult {
        SearchResult {
            passage_id: 1,
            file_path: "/docs/a.md".to_string(),
            title: "A".to_string(),
            heading_path: "# A".to_string(),
            content: "text".to_string(),
            start_line: 1,
            distance,
        }
    }

    #[test]
    fn test_similarity_from_distance() {
        assert!((result(0.0).similarity() - 1.0).abs() < f32::EPSILON);
        assert!((result(0.25).similarity() - 0.75).abs() < f32::EPSILON);
        assert!((result(2.0).similarity() + 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_root_chunk() {
        let chunk = Chunk::root("preamble");
        assert_eq!(chunk.heading_path, ROOT_HEADING_PATH);
        assert_eq!(chunk.heading_level, 0);
        assert_eq!(chunk.start_line, 1);
    }

    #[test]
    fn test_document_serialization() {
        let doc = Document {
            id: 7,
            file_path: "/docs/guide.md".to_string(),
            file_hash: "abc".to_string(),
            title: "Guide".to_string(),
            indexed_at: Utc::now(),
        };
        let json = serde_json::to_string(&doc).unwrap();
        let decoded: Document = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, doc);
    }
}
