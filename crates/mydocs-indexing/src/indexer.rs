//! Parallel directory indexing.
//!
//! Files are processed on blocking worker threads, bounded by a semaphore.
//! Each file goes through hash check, chunking, embedding, then replacement
//! of any previous version in the store. A failed file is logged and counted
//! without stopping the run.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use mydocs_embeddings::EmbeddingModel;
use mydocs_store::VectorStore;

use crate::chunker::{Chunker, MarkdownChunker};
use crate::error::IndexingError;
use crate::files::{collect_markdown_files, extract_title, hash_content};

/// Called after each file with (finished, total, path).
pub type ProgressFn = Arc<dyn Fn(usize, usize, &Path) + Send + Sync>;

/// Configuration for an indexing run.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    /// Maximum files processed at once
    pub concurrency: usize,
    /// Delete documents under the directory whose files are gone
    pub prune_missing: bool,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            concurrency: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            prune_missing: true,
        }
    }
}

impl IndexerConfig {
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_prune_missing(mut self, prune: bool) -> Self {
        self.prune_missing = prune;
        self
    }
}

/// Totals for one directory run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexStats {
    /// Files (re)indexed
    pub indexed: usize,
    /// Files whose hash matched the stored document
    pub skipped: usize,
    /// Files that could not be indexed
    pub failed: usize,
    /// Documents removed because their file disappeared
    pub pruned: usize,
    /// Passages written
    pub passages: usize,
}

/// What happened to a single file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    Indexed { passages: usize },
    Unchanged,
    Cancelled,
}

/// Indexes markdown files into a [`VectorStore`].
#[derive(Clone)]
pub struct Indexer {
    embedder: Arc<dyn EmbeddingModel>,
    store: Arc<VectorStore>,
    chunker: Arc<dyn Chunker>,
    config: IndexerConfig,
    progress: Option<ProgressFn>,
}

impl Indexer {
    pub fn new(embedder: Arc<dyn EmbeddingModel>, store: Arc<VectorStore>) -> Self {
        Self {
            embedder,
            store,
            chunker: Arc::new(MarkdownChunker::new()),
            config: IndexerConfig::default(),
            progress: None,
        }
    }

    pub fn with_config(mut self, config: IndexerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = chunker;
        self
    }

    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Index every markdown file under `dir`.
    ///
    /// Returns [`IndexingError::Cancelled`] once in-flight files have
    /// finished if `cancel` fires; pruning is skipped in that case.
    pub async fn index_directory(
        &self,
        dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<IndexStats, IndexingError> {
        let root = resolve_directory(dir)?;
        let start = Instant::now();

        let scan_root = root.clone();
        let files = tokio::task::spawn_blocking(move || collect_markdown_files(&scan_root))
            .await
            .map_err(|e| IndexingError::Worker(e.to_string()))?;
        let total = files.len();
        info!(root = ?root, files = total, concurrency = self.config.concurrency, "Indexing directory");

        let seen: HashSet<String> = files.iter().map(|p| path_key(p)).collect();
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let mut workers = JoinSet::new();
        let mut stats = IndexStats::default();
        let mut finished = 0;

        for path in files {
            if cancel.is_cancelled() {
                break;
            }
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| IndexingError::Worker(e.to_string()))?;

            let indexer = self.clone();
            let token = cancel.clone();
            workers.spawn_blocking(move || {
                let _permit = permit;
                let result = indexer.index_file(&path, &token);
                (path, result)
            });

            // Reap whatever already finished so progress stays current.
            while let Some(joined) = workers.try_join_next() {
                finished += 1;
                self.record(joined, &mut stats, finished, total);
            }
        }

        while let Some(joined) = workers.join_next().await {
            finished += 1;
            self.record(joined, &mut stats, finished, total);
        }

        if cancel.is_cancelled() {
            self.store.flush()?;
            info!(indexed = stats.indexed, "Indexing cancelled");
            return Err(IndexingError::Cancelled);
        }

        if self.config.prune_missing {
            stats.pruned = self.store.delete_documents_except(&root, &seen)?.len();
        }
        self.store.flush()?;

        info!(
            indexed = stats.indexed,
            skipped = stats.skipped,
            failed = stats.failed,
            pruned = stats.pruned,
            passages = stats.passages,
            duration_ms = start.elapsed().as_millis() as u64,
            "Indexing complete"
        );
        Ok(stats)
    }

    /// Index one file, replacing any stored version with a different hash.
    ///
    /// Blocking: embeds on the calling thread.
    pub fn index_file(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<FileOutcome, IndexingError> {
        if cancel.is_cancelled() {
            return Ok(FileOutcome::Cancelled);
        }

        let bytes = std::fs::read(path)?;
        let hash = hash_content(&bytes);
        let key = path_key(path);

        if self.store.file_unchanged(&key, &hash)? {
            debug!(path = %key, "Unchanged, skipping");
            return Ok(FileOutcome::Unchanged);
        }

        let source = String::from_utf8_lossy(&bytes);
        let chunks = self.chunker.chunk(&source);

        let embed_start = Instant::now();
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vectors: Vec<Vec<f32>> = self
            .embedder
            .embed_texts(&texts)?
            .into_iter()
            .map(|e| e.into_vec())
            .collect();
        debug!(
            path = %key,
            passages = chunks.len(),
            duration_ms = embed_start.elapsed().as_millis() as u64,
            "Embedded passages"
        );

        if cancel.is_cancelled() {
            return Ok(FileOutcome::Cancelled);
        }

        self.store.delete_document_by_path(&key)?;
        let title = extract_title(&source, path);
        let doc_id = self.store.insert_document(&key, &hash, &title)?;

        if let Err(e) = self.store.insert_passages(doc_id, &chunks, &vectors) {
            // Drop the bare document so the next run sees the file as changed.
            if let Err(cleanup) = self.store.delete_document_by_path(&key) {
                warn!(path = %key, error = %cleanup, "Failed to remove partial document");
            }
            return Err(e.into());
        }

        Ok(FileOutcome::Indexed {
            passages: chunks.len(),
        })
    }

    fn record(
        &self,
        joined: Result<(PathBuf, Result<FileOutcome, IndexingError>), tokio::task::JoinError>,
        stats: &mut IndexStats,
        finished: usize,
        total: usize,
    ) {
        match joined {
            Ok((path, outcome)) => {
                match outcome {
                    Ok(FileOutcome::Indexed { passages }) => {
                        stats.indexed += 1;
                        stats.passages += passages;
                    }
                    Ok(FileOutcome::Unchanged) => stats.skipped += 1,
                    Ok(FileOutcome::Cancelled) => {}
                    Err(e) => {
                        warn!(path = ?path, error = %e, "Failed to index file");
                        stats.failed += 1;
                    }
                }
                if let Some(progress) = &self.progress {
                    progress(finished, total, &path);
                }
            }
            Err(e) => {
                warn!(error = %e, "Indexing worker failed");
                stats.failed += 1;
            }
        }
    }
}

/// Absolute, symlink-free form of `dir`; errors unless it is a directory.
pub fn resolve_directory(dir: &Path) -> Result<PathBuf, IndexingError> {
    let root = std::fs::canonicalize(dir)
        .map_err(|e| IndexingError::InvalidDirectory(format!("{}: {}", dir.display(), e)))?;
    if !root.is_dir() {
        return Err(IndexingError::InvalidDirectory(format!(
            "{} is not a directory",
            root.display()
        )));
    }
    Ok(root)
}

/// Store key for a file path.
fn path_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use mydocs_embeddings::{Embedding, EmbeddingError, ModelInfo};
    use mydocs_store::StoreError;
    use tempfile::TempDir;

    const DIM: usize = 8;

    /// Hashes bytes onto a few axes. Text containing `FAIL` errors out and
    /// text containing `BADDIM` comes back with the wrong width.
    struct TestEmbedder {
        info: ModelInfo,
        calls: AtomicUsize,
    }

    impl TestEmbedder {
        fn new() -> Self {
            Self {
                info: ModelInfo {
                    name: "test".to_string(),
                    dimension: DIM,
                    max_sequence_length: 64,
                },
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl EmbeddingModel for TestEmbedder {
        fn info(&self) -> &ModelInfo {
            &self.info
        }

        fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if text.contains("FAIL") {
                return Err(EmbeddingError::InvalidInput("forced failure".to_string()));
            }
            let width = if text.contains("BADDIM") { 3 } else { DIM };
            let mut v = vec![0.1; width];
            for b in text.bytes() {
                v[b as usize % width] += 1.0;
            }
            Ok(Embedding::new(v))
        }
    }

    struct Fixture {
        _store_dir: TempDir,
        docs: TempDir,
        store: Arc<VectorStore>,
        embedder: Arc<TestEmbedder>,
    }

    impl Fixture {
        fn new() -> Self {
            let store_dir = TempDir::new().unwrap();
            let store = Arc::new(VectorStore::open(store_dir.path().join("db"), DIM).unwrap());
            Self {
                _store_dir: store_dir,
                docs: TempDir::new().unwrap(),
                store,
                embedder: Arc::new(TestEmbedder::new()),
            }
        }

        fn indexer(&self) -> Indexer {
            Indexer::new(self.embedder.clone(), self.store.clone())
                .with_config(IndexerConfig::default().with_concurrency(2))
        }

        fn write(&self, name: &str, content: &str) -> String {
            let path = self.docs.path().join(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(&path, content).unwrap();
            path_key(&fs::canonicalize(&path).unwrap())
        }

        async fn run(&self) -> IndexStats {
            self.indexer()
                .index_directory(self.docs.path(), &CancellationToken::new())
                .await
                .unwrap()
        }
    }

    #[tokio::test]
    async fn test_indexes_directory() {
        let fx = Fixture::new();
        let guide = fx.write("guide.md", "# Guide\n\nWelcome.\n\n## Install\n\nRun it.\n");
        fx.write("nested/notes.md", "Just notes.\n");
        fx.write("ignored.txt", "# Not markdown\n");

        let stats = fx.run().await;
        assert_eq!(
            stats,
            IndexStats {
                indexed: 2,
                skipped: 0,
                failed: 0,
                pruned: 0,
                passages: 3,
            }
        );

        let doc = fx.store.get_document_by_path(&guide).unwrap().unwrap();
        assert_eq!(doc.title, "Guide");
        assert_eq!(doc.file_hash, hash_content(&fs::read(&guide).unwrap()));
        assert_eq!(fx.store.passage_count().unwrap(), 3);

        let titles: Vec<String> = fx
            .store
            .list_documents()
            .unwrap()
            .into_iter()
            .map(|d| d.title)
            .collect();
        assert_eq!(titles, vec!["Guide", "notes.md"]);
    }

    /// One passage per blank-line separated paragraph.
    struct ParagraphChunker;

    impl Chunker for ParagraphChunker {
        fn chunk(&self, source: &str) -> Vec<mydocs_types::Chunk> {
            source
                .split("\n\n")
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(mydocs_types::Chunk::root)
                .collect()
        }
    }

    #[tokio::test]
    async fn test_custom_chunker() {
        let fx = Fixture::new();
        fx.write("a.md", "# A\n\nfirst\n\nsecond\n");

        let stats = fx
            .indexer()
            .with_chunker(Arc::new(ParagraphChunker))
            .index_directory(fx.docs.path(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(stats.passages, 3);
        assert_eq!(fx.store.passage_count().unwrap(), 3);
    }

    #[tokio::test]
    async fn test_unchanged_files_are_skipped() {
        let fx = Fixture::new();
        fx.write("a.md", "# A\n\nalpha\n");
        fx.write("b.md", "# B\n\nbeta\n");
        fx.run().await;
        let calls = fx.embedder.calls.load(Ordering::SeqCst);

        let stats = fx.run().await;
        assert_eq!(stats.indexed, 0);
        assert_eq!(stats.skipped, 2);
        assert_eq!(fx.embedder.calls.load(Ordering::SeqCst), calls);
    }

    #[tokio::test]
    async fn test_changed_file_replaces_passages() {
        let fx = Fixture::new();
        let path = fx.write("a.md", "# A\n\nold\n\n## Old section\n\nx\n");
        fx.run().await;
        let old_id = fx.store.get_document_by_path(&path).unwrap().unwrap().id;
        assert_eq!(fx.store.passage_count().unwrap(), 2);

        fx.write("a.md", "# A\n\nnew\n");
        let stats = fx.run().await;
        assert_eq!(stats.indexed, 1);

        let doc = fx.store.get_document_by_path(&path).unwrap().unwrap();
        assert_ne!(doc.id, old_id);
        assert_eq!(fx.store.passage_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_missing_files_are_pruned() {
        let fx = Fixture::new();
        fx.write("keep.md", "# Keep\n");
        let gone = fx.write("gone.md", "# Gone\n");
        fx.run().await;

        fs::remove_file(fx.docs.path().join("gone.md")).unwrap();
        let stats = fx.run().await;
        assert_eq!(stats.pruned, 1);
        assert!(fx.store.get_document_by_path(&gone).unwrap().is_none());
        assert_eq!(fx.store.document_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_prune_disabled() {
        let fx = Fixture::new();
        let gone = fx.write("gone.md", "# Gone\n");
        fx.run().await;
        fs::remove_file(fx.docs.path().join("gone.md")).unwrap();

        let stats = fx
            .indexer()
            .with_config(IndexerConfig::default().with_prune_missing(false))
            .index_directory(fx.docs.path(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(stats.pruned, 0);
        assert!(fx.store.get_document_by_path(&gone).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_failures_do_not_abort_run() {
        let fx = Fixture::new();
        fx.write("ok.md", "# Fine\n\ncontent\n");
        let failing = fx.write("bad.md", "# Broken\n\nFAIL here\n");

        let stats = fx.run().await;
        assert_eq!(stats.indexed, 1);
        assert_eq!(stats.failed, 1);
        assert!(fx.store.get_document_by_path(&failing).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_passage_insert_removes_document() {
        let fx = Fixture::new();
        let path = fx.write("odd.md", "# Odd\n\nBADDIM vector\n");

        let err = fx
            .indexer()
            .index_file(Path::new(&path), &CancellationToken::new())
            .unwrap_err();
        assert!(matches!(
            err,
            IndexingError::Store(StoreError::DimensionMismatch { .. })
        ));
        assert!(fx.store.get_document_by_path(&path).unwrap().is_none());
        assert_eq!(fx.store.document_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_empty_file_is_indexed_without_passages() {
        let fx = Fixture::new();
        let path = fx.write("empty.md", "   \n");

        let stats = fx.run().await;
        assert_eq!(stats.indexed, 1);
        assert_eq!(stats.passages, 0);
        let doc = fx.store.get_document_by_path(&path).unwrap().unwrap();
        assert_eq!(doc.title, "empty.md");
    }

    #[tokio::test]
    async fn test_cancelled_run() {
        let fx = Fixture::new();
        fx.write("a.md", "# A\n");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = fx.indexer().index_directory(fx.docs.path(), &cancel).await;
        assert!(matches!(result, Err(IndexingError::Cancelled)));
        assert_eq!(fx.store.document_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_invalid_directory() {
        let fx = Fixture::new();
        let file = fx.write("file.md", "x");

        let result = fx
            .indexer()
            .index_directory(Path::new("/nonexistent/mydocs-docs"), &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(IndexingError::InvalidDirectory(_))));

        let result = fx
            .indexer()
            .index_directory(Path::new(&file), &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(IndexingError::InvalidDirectory(_))));
    }

    #[tokio::test]
    async fn test_progress_reports_every_file() {
        let fx = Fixture::new();
        for i in 0..5 {
            fx.write(&format!("doc{i}.md"), &format!("# Doc {i}\n"));
        }
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        let stats = fx
            .indexer()
            .with_progress(Arc::new(move |done: usize, total: usize, _path: &Path| {
                sink.lock().unwrap().push((done, total));
            }))
            .index_directory(fx.docs.path(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(stats.indexed, 5);

        let mut reports = seen.lock().unwrap().clone();
        reports.sort();
        assert_eq!(reports, (1..=5).map(|i| (i, 5)).collect::<Vec<_>>());
    }
}
