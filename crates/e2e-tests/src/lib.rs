//! End-to-end test infrastructure for mydocs.
//!
//! Provides a shared TestHarness with deterministic stand-ins for the
//! embedding and reranking models, so the whole index-to-query pipeline
//! runs without model files.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use mydocs_embeddings::{Embedding, EmbeddingError, EmbeddingModel, ModelInfo};
use mydocs_indexing::{IndexStats, Indexer, IndexerConfig};
use mydocs_rerank::{sort_by_score, RerankError, Reranker};
use mydocs_search::SearchService;
use mydocs_store::VectorStore;
use mydocs_types::{ScoredResult, SearchResult};

/// Width of [`HashEmbedder`] vectors
pub const TEST_DIM: usize = 64;

/// Bag-of-words embedder: each lowercase word is hashed onto one axis.
///
/// Texts sharing words point in similar directions, which is enough to make
/// retrieval assertions meaningful.
pub struct HashEmbedder {
    info: ModelInfo,
    calls: AtomicUsize,
}

impl HashEmbedder {
    pub fn new() -> Self {
        Self {
            info: ModelInfo {
                name: "hash-bow".to_string(),
                dimension: TEST_DIM,
                max_sequence_length: 256,
            },
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of texts embedded so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl EmbeddingModel for HashEmbedder {
    fn info(&self) -> &ModelInfo {
        &self.info
    }

    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut v = vec![0.0; TEST_DIM];
        for word in words(text) {
            v[word_axis(&word)] += 1.0;
        }
        // Keep empty texts off the origin so cosine stays defined.
        if v.iter().all(|x| *x == 0.0) {
            v[0] = 1.0;
        }
        Ok(Embedding::new(v))
    }
}

fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
}

fn word_axis(word: &str) -> usize {
    // FNV-1a
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in word.bytes() {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    (hash % TEST_DIM as u64) as usize
}

/// Scores passages by how often they mention the query's words.
pub struct KeywordReranker;

impl Reranker for KeywordReranker {
    fn rerank(
        &self,
        query: &str,
        candidates: Vec<SearchResult>,
    ) -> Result<Vec<ScoredResult>, RerankError> {
        let terms: Vec<String> = words(query).collect();
        let mut scored: Vec<ScoredResult> = candidates
            .into_iter()
            .map(|result| {
                let score = words(&result.content)
                    .filter(|w| terms.contains(w))
                    .count() as f32;
                ScoredResult { result, score }
            })
            .collect();
        sort_by_score(&mut scored);
        Ok(scored)
    }
}

/// Always fails, like a cross-encoder hitting a shape error.
pub struct FailingReranker;

impl Reranker for FailingReranker {
    fn rerank(
        &self,
        _query: &str,
        _candidates: Vec<SearchResult>,
    ) -> Result<Vec<ScoredResult>, RerankError> {
        Err(RerankError::Shape {
            expected: "[n, 1]".to_string(),
            actual: "[n, 2]".to_string(),
        })
    }
}

/// Shared test harness for E2E tests.
///
/// Owns a documents directory and a writer store, both in temp dirs.
pub struct TestHarness {
    /// Keeps temp dirs alive for the lifetime of the harness
    pub _store_dir: tempfile::TempDir,
    pub docs_dir: tempfile::TempDir,
    pub store_path: PathBuf,
    pub store: Arc<VectorStore>,
    pub embedder: Arc<HashEmbedder>,
}

impl TestHarness {
    pub fn new() -> Self {
        let store_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let docs_dir = tempfile::TempDir::new().expect("Failed to create docs dir");
        let store_path = store_dir.path().join("mydocs.db");
        let store =
            Arc::new(VectorStore::open(&store_path, TEST_DIM).expect("Failed to open store"));

        Self {
            _store_dir: store_dir,
            docs_dir,
            store_path,
            store,
            embedder: Arc::new(HashEmbedder::new()),
        }
    }

    /// Write a document relative to the docs dir; returns its store key.
    pub fn write_doc(&self, relative: &str, content: &str) -> String {
        let path = self.docs_dir.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create doc dir");
        }
        fs::write(&path, content).expect("Failed to write doc");
        doc_key(&path)
    }

    pub fn remove_doc(&self, relative: &str) {
        fs::remove_file(self.docs_dir.path().join(relative)).expect("Failed to remove doc");
    }

    pub fn indexer(&self) -> Indexer {
        Indexer::new(self.embedder.clone(), self.store.clone())
            .with_config(IndexerConfig::default().with_concurrency(4))
    }

    /// Index the docs dir and return the run's stats.
    pub async fn index(&self) -> IndexStats {
        self.indexer()
            .index_directory(self.docs_dir.path(), &CancellationToken::new())
            .await
            .expect("Indexing failed")
    }

    /// Search service over the writer store, without a reranker.
    pub fn service(&self) -> SearchService {
        SearchService::new(self.embedder.clone(), self.store.clone())
    }

    pub fn service_with(&self, reranker: Arc<dyn Reranker>) -> SearchService {
        self.service().with_reranker(reranker)
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Store key the indexer uses for `path`.
pub fn doc_key(path: &Path) -> String {
    fs::canonicalize(path)
        .expect("Failed to canonicalize doc path")
        .to_string_lossy()
        .into_owned()
}

/// A small documentation set with distinct topics per section.
pub fn write_sample_docs(harness: &TestHarness) {
    harness.write_doc(
        "install.md",
        "# Installation\n\nDownload the release archive and unpack it.\n\n\
         ## Linux\n\nUse the tarball and copy the binary into your path.\n\n\
         ## Windows\n\nRun the installer executable and follow the wizard.\n",
    );
    harness.write_doc(
        "config.md",
        "# Configuration\n\nSettings live in a toml file.\n\n\
         ## Environment\n\nEnvironment variables override the toml file.\n",
    );
    harness.write_doc(
        "guides/search.md",
        "Search tips for new users.\n\n\
         # Searching\n\nQueries match passages by meaning rather than exact words.\n",
    );
}
