//! Search orchestration.
//!
//! embed query -> vector recall -> optional rerank -> truncate. A failing
//! reranker degrades to vector order; every other failure propagates.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use mydocs_embeddings::EmbeddingModel;
use mydocs_rerank::Reranker;
use mydocs_store::VectorStore;
use mydocs_types::{Document, ScoredResult, SearchResult};

use crate::error::SearchError;

/// Results returned when no limit is given
pub const DEFAULT_LIMIT: usize = 5;
/// Upper bound on returned results
pub const MAX_LIMIT: usize = 20;
/// Candidates recalled for reranking when none is given
pub const DEFAULT_CANDIDATES: usize = 50;
/// Upper bound on recalled candidates
pub const MAX_CANDIDATES: usize = 100;

/// One search request.
///
/// `limit` and `candidates` of `None` or `0` select the default; other
/// values are clamped into range. `rerank` of `None` reranks when a
/// reranker is loaded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchParams {
    pub query: String,
    pub limit: Option<i64>,
    pub candidates: Option<i64>,
    pub rerank: Option<bool>,
}

impl SearchParams {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_candidates(mut self, candidates: i64) -> Self {
        self.candidates = Some(candidates);
        self
    }

    pub fn with_rerank(mut self, rerank: bool) -> Self {
        self.rerank = Some(rerank);
        self
    }

    pub fn effective_limit(&self) -> usize {
        resolve(self.limit, DEFAULT_LIMIT, MAX_LIMIT)
    }

    pub fn effective_candidates(&self) -> usize {
        resolve(self.candidates, DEFAULT_CANDIDATES, MAX_CANDIDATES)
    }
}

fn resolve(value: Option<i64>, default: usize, max: usize) -> usize {
    match value {
        None | Some(0) => default,
        Some(v) => v.clamp(1, max as i64) as usize,
    }
}

/// Result of one search.
///
/// Item scores are similarities (`1 - distance`) for vector order and raw
/// cross-encoder logits when `reranked` is set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchOutcome {
    pub query: String,
    pub items: Vec<ScoredResult>,
    pub reranked: bool,
}

impl SearchOutcome {
    fn empty(query: &str) -> Self {
        Self {
            query: query.to_string(),
            items: vec![],
            reranked: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Stateless search over one store.
pub struct SearchService {
    embedder: Arc<dyn EmbeddingModel>,
    store: Arc<VectorStore>,
    reranker: Option<Arc<dyn Reranker>>,
}

impl SearchService {
    pub fn new(embedder: Arc<dyn EmbeddingModel>, store: Arc<VectorStore>) -> Self {
        Self {
            embedder,
            store,
            reranker: None,
        }
    }

    /// Enable second-stage reranking.
    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    pub fn has_reranker(&self) -> bool {
        self.reranker.is_some()
    }

    pub fn store(&self) -> &Arc<VectorStore> {
        &self.store
    }

    /// All indexed documents, ordered by title.
    pub fn list_documents(&self) -> Result<Vec<Document>, SearchError> {
        Ok(self.store.list_documents()?)
    }

    /// Run one search.
    ///
    /// A blank query is rejected; otherwise the text is embedded and echoed
    /// exactly as given. Cancellation is checked before each stage; a stage in progress always
    /// runs to completion.
    pub fn search(
        &self,
        params: &SearchParams,
        cancel: &CancellationToken,
    ) -> Result<SearchOutcome, SearchError> {
        let query = params.query.as_str();
        if query.trim().is_empty() {
            return Err(SearchError::InvalidInput("query must not be empty".to_string()));
        }

        let limit = params.effective_limit();
        let reranker = match (params.rerank, &self.reranker) {
            (Some(true), None) => return Err(SearchError::RerankerUnavailable),
            (Some(false), _) => None,
            (_, reranker) => reranker.as_ref(),
        };
        let fetch = if reranker.is_some() {
            params.effective_candidates()
        } else {
            limit
        };

        debug!(query, limit, fetch, rerank = reranker.is_some(), "Search request");

        check(cancel)?;
        let start = Instant::now();
        let embedding = self.embedder.embed(query)?;
        debug!(
            duration_ms = start.elapsed().as_millis() as u64,
            "Query embedded"
        );

        check(cancel)?;
        let start = Instant::now();
        let candidates = self.store.search(&embedding.values, fetch)?;
        debug!(
            results = candidates.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Vector search complete"
        );

        if candidates.is_empty() {
            return Ok(SearchOutcome::empty(query));
        }

        if let Some(reranker) = reranker {
            check(cancel)?;
            let start = Instant::now();
            match reranker.rerank(query, candidates.clone()) {
                Ok(mut scored) => {
                    debug!(
                        results = scored.len(),
                        duration_ms = start.elapsed().as_millis() as u64,
                        "Rerank complete"
                    );
                    scored.truncate(limit);
                    info!(query, results = scored.len(), "Search complete (reranked)");
                    return Ok(SearchOutcome {
                        query: query.to_string(),
                        items: scored,
                        reranked: true,
                    });
                }
                Err(e) => {
                    warn!(error = %e, "Reranking failed, falling back to vector results");
                }
            }
        }

        let items = vector_order(candidates, limit);
        info!(query, results = items.len(), "Search complete");
        Ok(SearchOutcome {
            query: query.to_string(),
            items,
            reranked: false,
        })
    }
}

fn vector_order(candidates: Vec<SearchResult>, limit: usize) -> Vec<ScoredResult> {
    candidates
        .into_iter()
        .take(limit)
        .map(|result| ScoredResult {
            score: result.similarity(),
            result,
        })
        .collect()
}

fn check(cancel: &CancellationToken) -> Result<(), SearchError> {
    if cancel.is_cancelled() {
        return Err(SearchError::Cancelled);
    }
    Ok(())
}
