//! HNSW index over passage vectors using usearch.
//!
//! Parameters tuned for quality over speed:
//! - M = 16 (connections per layer)
//! - ef_construction = 200 (build-time quality)
//! - ef_search = 100 (search-time quality)
//!
//! The graph is approximate: a query may miss a true nearest neighbor.
//! Keys are passage ids. The on-disk file is paired with a generation file
//! recording which database generation the graph reflects.

use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info};
use usearch::{Index, IndexOptions, MetricKind, ScalarKind};

use crate::error::StoreError;

/// Index file name inside the store directory
pub const INDEX_FILE: &str = "hnsw.usearch";

/// Generation file name inside the store directory
pub const GENERATION_FILE: &str = "hnsw.generation";

/// Smallest capacity reserved when the index grows
const MIN_RESERVE: usize = 64;

/// HNSW index configuration
#[derive(Debug, Clone)]
pub struct HnswConfig {
    /// Embedding dimension (must match model)
    pub dimension: usize,
    /// Number of connections per layer (M parameter)
    pub connectivity: usize,
    /// Build-time search depth (ef_construction)
    pub expansion_add: usize,
    /// Query-time search depth (ef_search)
    pub expansion_search: usize,
}

impl HnswConfig {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            connectivity: 16,
            expansion_add: 200,
            expansion_search: 100,
        }
    }

    fn options(&self) -> IndexOptions {
        IndexOptions {
            dimensions: self.dimension,
            metric: MetricKind::Cos,
            quantization: ScalarKind::F32,
            connectivity: self.connectivity,
            expansion_add: self.expansion_add,
            expansion_search: self.expansion_search,
            multi: false,
        }
    }
}

/// The usearch graph plus slot accounting.
///
/// Removed keys keep their slot until the graph is rebuilt or reloaded, so
/// growth is decided by `slots`, not by `Index::size`.
struct Graph {
    index: Index,
    /// Slots consumed since create/load, removed keys included
    slots: usize,
    /// Keys currently present
    live: usize,
}

/// HNSW index wrapper around usearch.
pub struct HnswIndex {
    graph: RwLock<Graph>,
    config: HnswConfig,
}

impl HnswIndex {
    /// Create an empty in-memory index.
    pub fn create(config: HnswConfig) -> Result<Self, StoreError> {
        let index = Index::new(&config.options()).map_err(|e| StoreError::Index(e.to_string()))?;
        Ok(Self {
            graph: RwLock::new(Graph {
                index,
                slots: 0,
                live: 0,
            }),
            config,
        })
    }

    /// Load a previously saved index file.
    pub fn load(config: HnswConfig, file: &Path) -> Result<Self, StoreError> {
        let index = Index::new(&config.options()).map_err(|e| StoreError::Index(e.to_string()))?;
        index
            .load(path_str(file)?)
            .map_err(|e| StoreError::Index(format!("Failed to load: {}", e)))?;

        if index.dimensions() != config.dimension {
            return Err(StoreError::DimensionMismatch {
                expected: config.dimension,
                actual: index.dimensions(),
            });
        }

        let size = index.size();
        info!(path = ?file, vectors = size, "Loaded vector index");
        Ok(Self {
            graph: RwLock::new(Graph {
                index,
                slots: size,
                live: size,
            }),
            config,
        })
    }

    pub fn dimension(&self) -> usize {
        self.config.dimension
    }

    /// Number of live keys.
    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.read()?.live)
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    /// Slots still held by removed keys.
    pub fn removed_slots(&self) -> Result<usize, StoreError> {
        let graph = self.read()?;
        Ok(graph.slots.saturating_sub(graph.live))
    }

    pub fn contains(&self, key: u64) -> Result<bool, StoreError> {
        Ok(self.read()?.index.contains(key))
    }

    /// Add vectors, growing capacity as needed. Vectors must already be
    /// `dimension` wide.
    pub fn add_all(&self, items: &[(u64, &[f32])]) -> Result<(), StoreError> {
        if items.is_empty() {
            return Ok(());
        }
        for (_, values) in items {
            if values.len() != self.config.dimension {
                return Err(StoreError::DimensionMismatch {
                    expected: self.config.dimension,
                    actual: values.len(),
                });
            }
        }

        let mut graph = self.write()?;
        let needed = graph.slots + items.len();
        let capacity = graph.index.capacity();
        if needed > capacity {
            let target = needed.max(capacity * 2).max(MIN_RESERVE);
            graph
                .index
                .reserve(target)
                .map_err(|e| StoreError::Index(e.to_string()))?;
            debug!(capacity = target, slots = graph.slots, "Grew vector index");
        }

        for (key, values) in items {
            graph
                .index
                .add(*key, *values)
                .map_err(|e| StoreError::Index(e.to_string()))?;
            graph.slots += 1;
            graph.live += 1;
        }

        debug!(count = items.len(), "Added vectors");
        Ok(())
    }

    /// Remove keys; returns how many were present.
    pub fn remove_all(&self, keys: &[u64]) -> Result<usize, StoreError> {
        let mut graph = self.write()?;
        let mut removed = 0;
        for &key in keys {
            removed += graph
                .index
                .remove(key)
                .map_err(|e| StoreError::Index(e.to_string()))?;
        }
        graph.live = graph.live.saturating_sub(removed);
        if removed > 0 {
            debug!(count = removed, "Removed vectors");
        }
        Ok(removed)
    }

    /// Swap in the contents of `fresh`, typically a compacted rebuild.
    pub fn replace_with(&self, fresh: HnswIndex) -> Result<(), StoreError> {
        if fresh.config.dimension != self.config.dimension {
            return Err(StoreError::DimensionMismatch {
                expected: self.config.dimension,
                actual: fresh.config.dimension,
            });
        }
        let graph = fresh
            .graph
            .into_inner()
            .map_err(|_| StoreError::Poisoned("vector index"))?;
        *self.write()? = graph;
        Ok(())
    }

    /// Up to `k` nearest keys with their cosine distances, nearest first.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(u64, f32)>, StoreError> {
        if query.len() != self.config.dimension {
            return Err(StoreError::DimensionMismatch {
                expected: self.config.dimension,
                actual: query.len(),
            });
        }

        let graph = self.read()?;
        if graph.live == 0 {
            return Ok(vec![]);
        }
        let matches = graph
            .index
            .search(query, k)
            .map_err(|e| StoreError::Index(e.to_string()))?;

        let hits: Vec<(u64, f32)> = matches
            .keys
            .iter()
            .copied()
            .zip(matches.distances.iter().copied())
            .collect();

        debug!(k, found = hits.len(), "Search complete");
        Ok(hits)
    }

    /// Write the index next to `file` and rename it into place.
    pub fn save_atomic(&self, file: &Path) -> Result<(), StoreError> {
        let graph = self.read()?;
        let tmp = file.with_extension("usearch.tmp");
        graph
            .index
            .save(path_str(&tmp)?)
            .map_err(|e| StoreError::Index(format!("Failed to save: {}", e)))?;
        std::fs::rename(&tmp, file)?;

        info!(path = ?file, vectors = graph.live, "Saved vector index");
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Graph>, StoreError> {
        self.graph.read().map_err(|_| StoreError::Poisoned("vector index"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Graph>, StoreError> {
        self.graph.write().map_err(|_| StoreError::Poisoned("vector index"))
    }
}

/// Generation recorded next to a saved index, if readable.
pub fn read_generation(store_dir: &Path) -> Option<u64> {
    std::fs::read_to_string(generation_path(store_dir))
        .ok()
        .and_then(|s| s.trim().parse().ok())
}

/// Record the generation a saved index reflects.
pub fn write_generation(store_dir: &Path, generation: u64) -> Result<(), StoreError> {
    let path = generation_path(store_dir);
    let tmp = path.with_extension("generation.tmp");
    std::fs::write(&tmp, generation.to_string())?;
    std::fs::rename(&tmp, &path)?;
    Ok(())
}

pub fn index_path(store_dir: &Path) -> PathBuf {
    store_dir.join(INDEX_FILE)
}

fn generation_path(store_dir: &Path) -> PathBuf {
    store_dir.join(GENERATION_FILE)
}

fn path_str(path: &Path) -> Result<&str, StoreError> {
    path.to_str()
        .ok_or_else(|| StoreError::Index("Invalid path encoding".to_string()))
}
