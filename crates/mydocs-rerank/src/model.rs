//! Reranker trait.

use mydocs_types::{ScoredResult, SearchResult};

use crate::error::RerankError;

/// Scores query/passage pairs.
///
/// Implementations must be thread-safe (Send + Sync) so one loaded model can
/// serve concurrent searches.
pub trait Reranker: Send + Sync {
    /// Score every candidate and return them by descending score.
    ///
    /// An empty candidate list yields an empty result, never an error.
    fn rerank(
        &self,
        query: &str,
        candidates: Vec<SearchResult>,
    ) -> Result<Vec<ScoredResult>, RerankError>;
}

/// Sort by descending score. Ties keep their input order.
pub fn sort_by_score(results: &mut [ScoredResult]) {
    results.sort_by(|a, b| b.score.total_cmp(&a.score));
}
