//! Application composition.
//!
//! Loads settings-driven components once and hands them to whichever
//! command runs. The reranker is optional everywhere.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use mydocs_embeddings::{resolve_model_dir, resolve_reranker_dir, CandleEmbedder, EmbeddingModel};
use mydocs_rerank::{CrossEncoder, Reranker};
use mydocs_search::SearchService;
use mydocs_store::VectorStore;
use mydocs_types::Settings;

/// How the store is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    /// Single writer; creates the store if missing
    Writer,
    /// Shared reader; the store must already exist
    ReadOnly,
}

/// Loaded components.
pub struct App {
    pub settings: Settings,
    pub embedder: Arc<dyn EmbeddingModel>,
    pub store: Arc<VectorStore>,
    pub reranker: Option<Arc<dyn Reranker>>,
}

impl App {
    /// Load the embedding model, open the store, and load the reranker when
    /// `with_reranker` is set and one can be found.
    pub fn load(settings: Settings, mode: StoreMode, with_reranker: bool) -> Result<Self> {
        let model_dir = resolve_model_dir(settings.model_dir().as_deref())
            .context("Embedding model not found")?;
        info!(path = ?model_dir, "Loading embedding model");
        let embedder: Arc<dyn EmbeddingModel> = Arc::new(
            CandleEmbedder::load(&model_dir).context("Failed to load embedding model")?,
        );

        let store = open_store(&settings.expanded_db_path(), embedder.info().dimension, mode)?;

        let reranker = if with_reranker {
            load_reranker(&settings)
        } else {
            None
        };

        Ok(Self::from_parts(settings, embedder, Arc::new(store), reranker))
    }

    /// Assemble from already-built components.
    pub fn from_parts(
        settings: Settings,
        embedder: Arc<dyn EmbeddingModel>,
        store: Arc<VectorStore>,
        reranker: Option<Arc<dyn Reranker>>,
    ) -> Self {
        Self {
            settings,
            embedder,
            store,
            reranker,
        }
    }

    pub fn search_service(&self) -> SearchService {
        let service = SearchService::new(self.embedder.clone(), self.store.clone());
        match &self.reranker {
            Some(reranker) => service.with_reranker(reranker.clone()),
            None => service,
        }
    }
}

fn open_store(path: &Path, dimension: usize, mode: StoreMode) -> Result<VectorStore> {
    match mode {
        StoreMode::Writer => {
            info!(path = ?path, "Opening store");
            VectorStore::open(path, dimension)
                .with_context(|| format!("Failed to open store at {}", path.display()))
        }
        StoreMode::ReadOnly => {
            if !path.exists() {
                anyhow::bail!(
                    "Store not found at {}. Run 'mydocs index <directory>' first",
                    path.display()
                );
            }
            info!(path = ?path, "Opening store read-only");
            VectorStore::open_read_only(path, dimension)
                .with_context(|| format!("Failed to open store at {}", path.display()))
        }
    }
}

fn load_reranker(settings: &Settings) -> Option<Arc<dyn Reranker>> {
    let Some(dir) = resolve_reranker_dir(settings.reranker_dir().as_deref()) else {
        info!("Reranker not found, using vector-only search");
        return None;
    };
    match CrossEncoder::load(&dir) {
        Ok(encoder) => {
            info!(path = ?dir, "Reranker enabled");
            Some(Arc::new(encoder))
        }
        Err(e) => {
            warn!(path = ?dir, error = %e, "Failed to load reranker, using vector-only search");
            None
        }
    }
}
