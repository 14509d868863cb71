//! Document and passage store with an approximate vector index.
//!
//! Layout of a store directory:
//! - `rocksdb/`: documents, passages, vectors and counters
//! - `hnsw.usearch` + `hnsw.generation`: the saved ANN graph and the
//!   database generation it reflects
//!
//! Every mutation commits as one `WriteBatch` and bumps the generation. The
//! graph is saved on [`VectorStore::flush`] and on drop; an open that finds
//! a graph from another generation rebuilds it from the stored vectors.
//! Deletes compact the graph the same way once removed keys hold more
//! slots than live ones.
//!
//! One process may hold the store for writing. Read-only handles never
//! take the database lock, so any number of them can run next to a writer;
//! each sees the data as of its own open.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rocksdb::{ColumnFamily, Direction, IteratorMode, Options, WriteBatch, DB};
use tracing::{debug, info, warn};

use mydocs_types::{Chunk, Document, SearchResult};

use crate::column_families::{
    build_cf_descriptors, ALL_CF_NAMES, CF_DOCUMENTS, CF_DOCUMENT_PATHS, CF_PASSAGES,
    CF_PASSAGE_OWNER, CF_PASSAGE_VECTORS, CF_STORE_META,
};
use crate::error::StoreError;
use crate::hnsw::{index_path, read_generation, write_generation, HnswConfig, HnswIndex};
use crate::keys::{
    decode_id, decode_vector, encode_vector, id_key, PassageKey, META_DIMENSION,
    META_GENERATION, META_NEXT_DOCUMENT_ID, META_NEXT_PASSAGE_ID,
};
use crate::records::{PassageRecord, StoreStats};

/// RocksDB directory inside the store directory
const DB_DIR: &str = "rocksdb";

/// Vectors added per index call during a rebuild
const REBUILD_BATCH: usize = 1024;

/// Removed-slot count below which the graph is never compacted
const COMPACT_MIN_REMOVED: usize = 256;

/// Counters owned by the single writer.
#[derive(Debug)]
struct WriterState {
    generation: u64,
    saved_generation: u64,
    next_document_id: u64,
    next_passage_id: u64,
}

/// Durable store of documents and passage vectors.
pub struct VectorStore {
    db: DB,
    index: HnswIndex,
    dir: PathBuf,
    dimension: usize,
    read_only: bool,
    writer: Mutex<WriterState>,
}

impl VectorStore {
    /// Open a store for writing, creating it if necessary.
    ///
    /// Schema creation is idempotent. Fails if the store was created with a
    /// different vector dimension.
    pub fn open(path: impl AsRef<Path>, dimension: usize) -> Result<Self, StoreError> {
        let dir = path.as_ref().to_path_buf();
        check_dimension_arg(dimension)?;
        info!(path = ?dir, dimension, "Opening vector store");

        std::fs::create_dir_all(&dir)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.set_max_background_jobs(4);

        let db = DB::open_cf_descriptors(&db_opts, dir.join(DB_DIR), build_cf_descriptors())?;
        check_stored_dimension(&db, dimension, true)?;

        Self::from_db(db, dir, dimension, false)
    }

    /// Open an existing store without write access.
    ///
    /// Every mutation on the returned handle fails with
    /// [`StoreError::ReadOnly`].
    pub fn open_read_only(path: impl AsRef<Path>, dimension: usize) -> Result<Self, StoreError> {
        let dir = path.as_ref().to_path_buf();
        check_dimension_arg(dimension)?;

        let db_dir = dir.join(DB_DIR);
        if !db_dir.is_dir() {
            return Err(StoreError::NotFound(dir.display().to_string()));
        }
        info!(path = ?dir, "Opening vector store read-only");

        let db = DB::open_cf_for_read_only(&Options::default(), &db_dir, ALL_CF_NAMES, false)?;
        check_stored_dimension(&db, dimension, false)?;

        Self::from_db(db, dir, dimension, true)
    }

    fn from_db(db: DB, dir: PathBuf, dimension: usize, read_only: bool) -> Result<Self, StoreError> {
        let generation = read_counter(&db, META_GENERATION)?;
        let next_document_id = read_counter(&db, META_NEXT_DOCUMENT_ID)?.max(1);
        let next_passage_id = read_counter(&db, META_NEXT_PASSAGE_ID)?.max(1);

        let config = HnswConfig::new(dimension);
        let file = index_path(&dir);
        let saved = read_generation(&dir);

        let loaded = if saved == Some(generation) && file.is_file() {
            match HnswIndex::load(config.clone(), &file) {
                Ok(index) => Some(index),
                Err(e) => {
                    warn!(error = %e, path = ?file, "Vector index unreadable, rebuilding");
                    None
                }
            }
        } else {
            if file.is_file() {
                info!(saved = ?saved, generation, "Vector index is stale, rebuilding");
            }
            None
        };

        let (index, saved_generation) = match loaded {
            Some(index) => (index, generation),
            None => {
                let index = rebuild_index(&db, config)?;
                if read_only {
                    (index, saved.unwrap_or(0))
                } else {
                    index.save_atomic(&file)?;
                    write_generation(&dir, generation)?;
                    (index, generation)
                }
            }
        };

        Ok(Self {
            db,
            index,
            dir,
            dimension,
            read_only,
            writer: Mutex::new(WriterState {
                generation,
                saved_generation,
                next_document_id,
                next_passage_id,
            }),
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily, StoreError> {
        cf_handle(&self.db, name)
    }

    fn lock_writer(&self) -> Result<MutexGuard<'_, WriterState>, StoreError> {
        if self.read_only {
            return Err(StoreError::ReadOnly);
        }
        self.writer
            .lock()
            .map_err(|_| StoreError::Poisoned("store writer"))
    }

    /// Write `batch` together with the next generation.
    fn commit(&self, state: &mut WriterState, mut batch: WriteBatch) -> Result<(), StoreError> {
        let generation = state.generation + 1;
        batch.put_cf(self.cf(CF_STORE_META)?, META_GENERATION, id_key(generation));
        self.db.write(batch)?;
        state.generation = generation;
        Ok(())
    }

    // ==================== Documents ====================

    /// True iff a document with exactly this path and hash exists.
    pub fn file_unchanged(&self, path: &str, hash: &str) -> Result<bool, StoreError> {
        Ok(self
            .get_document_by_path(path)?
            .is_some_and(|doc| doc.file_hash == hash))
    }

    pub fn get_document(&self, id: u64) -> Result<Option<Document>, StoreError> {
        match self.db.get_cf(self.cf(CF_DOCUMENTS)?, id_key(id))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn get_document_by_path(&self, path: &str) -> Result<Option<Document>, StoreError> {
        match self.document_id_for(path)? {
            Some(id) => self.get_document(id),
            None => Ok(None),
        }
    }

    fn document_id_for(&self, path: &str) -> Result<Option<u64>, StoreError> {
        self.db
            .get_cf(self.cf(CF_DOCUMENT_PATHS)?, path.as_bytes())?
            .map(|bytes| decode_id(&bytes))
            .transpose()
    }

    /// Insert a new document and return its id.
    ///
    /// Fails with [`StoreError::DuplicatePath`] if the path is taken; updates
    /// go through delete-then-insert.
    pub fn insert_document(&self, path: &str, hash: &str, title: &str) -> Result<u64, StoreError> {
        let mut state = self.lock_writer()?;

        if self.document_id_for(path)?.is_some() {
            return Err(StoreError::DuplicatePath(path.to_string()));
        }

        let id = state.next_document_id;
        let doc = Document {
            id,
            file_path: path.to_string(),
            file_hash: hash.to_string(),
            title: title.to_string(),
            indexed_at: Utc::now(),
        };

        let mut batch = WriteBatch::default();
        batch.put_cf(self.cf(CF_DOCUMENTS)?, id_key(id), serde_json::to_vec(&doc)?);
        batch.put_cf(self.cf(CF_DOCUMENT_PATHS)?, path.as_bytes(), id_key(id));
        batch.put_cf(self.cf(CF_STORE_META)?, META_NEXT_DOCUMENT_ID, id_key(id + 1));
        self.commit(&mut state, batch)?;
        state.next_document_id = id + 1;

        debug!(id, path, "Inserted document");
        Ok(id)
    }

    /// Delete a document and all of its passages atomically.
    ///
    /// Returns false (not an error) when no document has this path.
    pub fn delete_document_by_path(&self, path: &str) -> Result<bool, StoreError> {
        let mut state = self.lock_writer()?;

        let Some(doc_id) = self.document_id_for(path)? else {
            return Ok(false);
        };
        let passage_ids = self.passage_ids_of(doc_id)?;

        let passages_cf = self.cf(CF_PASSAGES)?;
        let owner_cf = self.cf(CF_PASSAGE_OWNER)?;
        let vectors_cf = self.cf(CF_PASSAGE_VECTORS)?;

        let mut batch = WriteBatch::default();
        for &pid in &passage_ids {
            batch.delete_cf(passages_cf, PassageKey::new(doc_id, pid).to_bytes());
            batch.delete_cf(owner_cf, id_key(pid));
            batch.delete_cf(vectors_cf, id_key(pid));
        }
        batch.delete_cf(self.cf(CF_DOCUMENTS)?, id_key(doc_id));
        batch.delete_cf(self.cf(CF_DOCUMENT_PATHS)?, path.as_bytes());
        self.commit(&mut state, batch)?;

        self.index.remove_all(&passage_ids)?;
        self.compact_if_needed()?;

        debug!(id = doc_id, path, passages = passage_ids.len(), "Deleted document");
        Ok(true)
    }

    /// Rebuild the graph from stored vectors once removed keys hold more
    /// slots than live ones. Callers hold the writer lock.
    fn compact_if_needed(&self) -> Result<(), StoreError> {
        let removed = self.index.removed_slots()?;
        let live = self.index.len()?;
        if removed < COMPACT_MIN_REMOVED || removed <= live {
            return Ok(());
        }
        let fresh = rebuild_index(&self.db, HnswConfig::new(self.dimension))?;
        self.index.replace_with(fresh)?;
        info!(removed, live, "Compacted vector index");
        Ok(())
    }

    /// Delete every document under `root` whose path is not in `keep`.
    ///
    /// Returns the deleted paths.
    pub fn delete_documents_except(
        &self,
        root: &Path,
        keep: &HashSet<String>,
    ) -> Result<Vec<String>, StoreError> {
        if self.read_only {
            return Err(StoreError::ReadOnly);
        }

        let mut stale = Vec::new();
        for item in self
            .db
            .iterator_cf(self.cf(CF_DOCUMENT_PATHS)?, IteratorMode::Start)
        {
            let (key, _) = item?;
            let path = String::from_utf8_lossy(&key).into_owned();
            if Path::new(&path).starts_with(root) && !keep.contains(&path) {
                stale.push(path);
            }
        }

        for path in &stale {
            self.delete_document_by_path(path)?;
        }
        if !stale.is_empty() {
            info!(root = ?root, count = stale.len(), "Pruned missing documents");
        }
        Ok(stale)
    }

    /// All documents ordered by title (case-sensitive).
    pub fn list_documents(&self) -> Result<Vec<Document>, StoreError> {
        let mut docs = Vec::new();
        for item in self
            .db
            .iterator_cf(self.cf(CF_DOCUMENTS)?, IteratorMode::Start)
        {
            let (_, value) = item?;
            docs.push(serde_json::from_slice::<Document>(&value)?);
        }
        docs.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(docs)
    }

    pub fn document_count(&self) -> Result<usize, StoreError> {
        self.count_cf(CF_DOCUMENTS)
    }

    // ==================== Passages ====================

    /// Insert a document's passages and their vectors in one batch.
    ///
    /// `vectors[i]` belongs to `passages[i]`. An empty vector stores the
    /// passage without one; otherwise it must be `dimension` wide.
    /// Non-finite components are stored as 0.
    pub fn insert_passages(
        &self,
        document_id: u64,
        passages: &[Chunk],
        vectors: &[Vec<f32>],
    ) -> Result<Vec<u64>, StoreError> {
        if passages.len() != vectors.len() {
            return Err(StoreError::InvalidInput(format!(
                "{} passages but {} vectors",
                passages.len(),
                vectors.len()
            )));
        }

        let mut state = self.lock_writer()?;

        if self.get_document(document_id)?.is_none() {
            return Err(StoreError::NotFound(format!("document {}", document_id)));
        }
        if passages.is_empty() {
            return Ok(vec![]);
        }

        let prepared = vectors
            .iter()
            .map(|v| self.prepare_vector(v))
            .collect::<Result<Vec<_>, _>>()?;

        let passages_cf = self.cf(CF_PASSAGES)?;
        let owner_cf = self.cf(CF_PASSAGE_OWNER)?;
        let vectors_cf = self.cf(CF_PASSAGE_VECTORS)?;

        let first_id = state.next_passage_id;
        let next_id = first_id + passages.len() as u64;
        let ids: Vec<u64> = (first_id..next_id).collect();

        let mut batch = WriteBatch::default();
        for ((&pid, chunk), vector) in ids.iter().zip(passages).zip(&prepared) {
            let record = PassageRecord::from_chunk(pid, document_id, chunk);
            batch.put_cf(
                passages_cf,
                PassageKey::new(document_id, pid).to_bytes(),
                serde_json::to_vec(&record)?,
            );
            batch.put_cf(owner_cf, id_key(pid), id_key(document_id));
            if let Some(values) = vector {
                batch.put_cf(vectors_cf, id_key(pid), encode_vector(values));
            }
        }
        batch.put_cf(self.cf(CF_STORE_META)?, META_NEXT_PASSAGE_ID, id_key(next_id));

        let items: Vec<(u64, &[f32])> = ids
            .iter()
            .zip(&prepared)
            .filter_map(|(&pid, v)| v.as_deref().map(|v| (pid, v)))
            .collect();
        let keys: Vec<u64> = items.iter().map(|(pid, _)| *pid).collect();

        // Ids are never reused, even when this insert fails.
        state.next_passage_id = next_id;

        // Graph entries without committed rows are invisible to search.
        let result = self
            .index
            .add_all(&items)
            .and_then(|()| self.commit(&mut state, batch));
        if let Err(e) = result {
            if let Err(undo) = self.index.remove_all(&keys) {
                warn!(error = %undo, "Failed to roll back vector index entries");
            }
            return Err(e);
        }

        debug!(
            document_id,
            count = ids.len(),
            vectors = keys.len(),
            "Inserted passages"
        );
        Ok(ids)
    }

    fn prepare_vector(&self, values: &[f32]) -> Result<Option<Vec<f32>>, StoreError> {
        if values.is_empty() {
            return Ok(None);
        }
        if values.len() != self.dimension {
            return Err(StoreError::DimensionMismatch {
                expected: self.dimension,
                actual: values.len(),
            });
        }
        Ok(Some(
            values
                .iter()
                .map(|&v| if v.is_finite() { v } else { 0.0 })
                .collect(),
        ))
    }

    fn passage_ids_of(&self, document_id: u64) -> Result<Vec<u64>, StoreError> {
        let prefix = PassageKey::document_prefix(document_id);
        let mut ids = Vec::new();
        for item in self.db.iterator_cf(
            self.cf(CF_PASSAGES)?,
            IteratorMode::From(&prefix, Direction::Forward),
        ) {
            let (key, _) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            ids.push(PassageKey::from_bytes(&key)?.passage_id);
        }
        Ok(ids)
    }

    pub fn passage_count(&self) -> Result<usize, StoreError> {
        self.count_cf(CF_PASSAGE_OWNER)
    }

    // ==================== Search ====================

    /// Up to `k` passages nearest to `query`, by ascending cosine distance.
    ///
    /// Approximate: the graph may miss a true nearest neighbor. An empty
    /// store yields an empty list.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>, StoreError> {
        if k == 0 {
            return Err(StoreError::InvalidInput("k must be positive".to_string()));
        }
        if query.len() != self.dimension {
            return Err(StoreError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let hits = self.index.search(query, k)?;

        let owner_cf = self.cf(CF_PASSAGE_OWNER)?;
        let passages_cf = self.cf(CF_PASSAGES)?;
        let mut documents: HashMap<u64, Document> = HashMap::new();
        let mut results = Vec::with_capacity(hits.len());

        for (pid, distance) in hits {
            let Some(owner) = self.db.get_cf(owner_cf, id_key(pid))? else {
                debug!(passage_id = pid, "Skipping vector without a committed passage");
                continue;
            };
            let doc_id = decode_id(&owner)?;

            let Some(bytes) = self
                .db
                .get_cf(passages_cf, PassageKey::new(doc_id, pid).to_bytes())?
            else {
                continue;
            };
            let record: PassageRecord = serde_json::from_slice(&bytes)?;

            let doc = match documents.entry(doc_id) {
                Entry::Occupied(e) => e.into_mut(),
                Entry::Vacant(e) => match self.get_document(doc_id)? {
                    Some(doc) => e.insert(doc),
                    None => continue,
                },
            };

            results.push(SearchResult {
                passage_id: pid,
                file_path: doc.file_path.clone(),
                title: doc.title.clone(),
                heading_path: record.heading_path,
                content: record.content,
                start_line: record.start_line,
                distance,
            });
        }

        results.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        Ok(results)
    }

    // ==================== Maintenance ====================

    /// Persist the vector index if it changed since the last save.
    ///
    /// A no-op on read-only handles.
    pub fn flush(&self) -> Result<(), StoreError> {
        if self.read_only {
            return Ok(());
        }
        let mut state = self.lock_writer()?;
        if state.saved_generation == state.generation {
            return Ok(());
        }

        self.index.save_atomic(&index_path(&self.dir))?;
        write_generation(&self.dir, state.generation)?;
        state.saved_generation = state.generation;
        Ok(())
    }

    pub fn stats(&self) -> Result<StoreStats, StoreError> {
        let generation = self
            .writer
            .lock()
            .map_err(|_| StoreError::Poisoned("store writer"))?
            .generation;
        Ok(StoreStats {
            documents: self.document_count()?,
            passages: self.passage_count()?,
            vectors: self.index.len()?,
            dimension: self.dimension,
            generation,
        })
    }

    fn count_cf(&self, name: &str) -> Result<usize, StoreError> {
        let mut count = 0;
        for item in self.db.iterator_cf(self.cf(name)?, IteratorMode::Start) {
            item?;
            count += 1;
        }
        Ok(count)
    }
}

impl Drop for VectorStore {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!(error = %e, path = ?self.dir, "Failed to save vector index on close");
        }
    }
}

fn cf_handle<'a>(db: &'a DB, name: &str) -> Result<&'a ColumnFamily, StoreError> {
    db.cf_handle(name)
        .ok_or_else(|| StoreError::ColumnFamilyNotFound(name.to_string()))
}

fn read_counter(db: &DB, key: &[u8]) -> Result<u64, StoreError> {
    match db.get_cf(cf_handle(db, CF_STORE_META)?, key)? {
        Some(bytes) => decode_id(&bytes),
        None => Ok(0),
    }
}

fn check_dimension_arg(dimension: usize) -> Result<(), StoreError> {
    if dimension == 0 {
        return Err(StoreError::InvalidInput(
            "vector dimension must be positive".to_string(),
        ));
    }
    Ok(())
}

fn check_stored_dimension(db: &DB, dimension: usize, write: bool) -> Result<(), StoreError> {
    let meta = cf_handle(db, CF_STORE_META)?;
    match db.get_cf(meta, META_DIMENSION)? {
        Some(bytes) => {
            let stored = decode_id(&bytes)? as usize;
            if stored != dimension {
                return Err(StoreError::DimensionMismatch {
                    expected: stored,
                    actual: dimension,
                });
            }
        }
        None if write => db.put_cf(meta, META_DIMENSION, id_key(dimension as u64))?,
        None => {}
    }
    Ok(())
}

fn rebuild_index(db: &DB, config: HnswConfig) -> Result<HnswIndex, StoreError> {
    let dimension = config.dimension;
    let index = HnswIndex::create(config)?;

    let mut batch: Vec<(u64, Vec<f32>)> = Vec::with_capacity(REBUILD_BATCH);
    let mut total = 0usize;
    let flush_batch = |batch: &mut Vec<(u64, Vec<f32>)>| -> Result<(), StoreError> {
        let items: Vec<(u64, &[f32])> = batch.iter().map(|(k, v)| (*k, v.as_slice())).collect();
        index.add_all(&items)?;
        batch.clear();
        Ok(())
    };

    for item in db.iterator_cf(cf_handle(db, CF_PASSAGE_VECTORS)?, IteratorMode::Start) {
        let (key, value) = item?;
        let values = decode_vector(&value)?;
        if values.len() != dimension {
            warn!(
                passage_id = decode_id(&key)?,
                len = values.len(),
                "Skipping stored vector with wrong dimension"
            );
            continue;
        }
        batch.push((decode_id(&key)?, values));
        total += 1;
        if batch.len() >= REBUILD_BATCH {
            flush_batch(&mut batch)?;
        }
    }
    flush_batch(&mut batch)?;

    info!(vectors = total, "Rebuilt vector index");
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use std::sync::Arc;
    use tempfile::TempDir;

    const DIM: usize = 8;

    fn random_vector() -> Vec<f32> {
        let mut rng = rand::rng();
        let mut v: Vec<f32> = (0..DIM).map(|_| rng.random_range(-1.0..1.0)).collect();
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        v.iter_mut().for_each(|x| *x /= norm);
        v
    }

    fn chunk(text: &str, line: u32) -> Chunk {
        Chunk::new(format!("# {text}"), 1, text, line)
    }

    /// Insert a document with `n` passages; returns (doc id, passage ids, vectors).
    fn add_doc(
        store: &VectorStore,
        path: &str,
        title: &str,
        n: usize,
    ) -> (u64, Vec<u64>, Vec<Vec<f32>>) {
        let id = store.insert_document(path, "hash", title).unwrap();
        let chunks: Vec<Chunk> = (0..n)
            .map(|i| chunk(&format!("{title} part {i}"), i as u32 + 1))
            .collect();
        let vectors: Vec<Vec<f32>> = (0..n).map(|_| random_vector()).collect();
        let ids = store.insert_passages(id, &chunks, &vectors).unwrap();
        (id, ids, vectors)
    }

    #[test]
    fn test_round_trip_search() {
        let temp = TempDir::new().unwrap();
        let store = VectorStore::open(temp.path(), DIM).unwrap();
        let (_, ids, vectors) = add_doc(&store, "/docs/a.md", "A", 3);
        add_doc(&store, "/docs/b.md", "B", 3);

        let results = store.search(&vectors[1], 3).unwrap();
        assert_eq!(results[0].passage_id, ids[1]);
        assert!(results[0].distance.abs() < 1e-4);
        assert_eq!(results[0].file_path, "/docs/a.md");
        assert_eq!(results[0].title, "A");
        assert_eq!(results[0].content, "A part 1");
        assert_eq!(results[0].start_line, 2);
        for pair in results.windows(2) {
            assert!(pair[0].distance <= pair[1].distance);
        }
    }

    #[test]
    fn test_delete_cascades() {
        let temp = TempDir::new().unwrap();
        let store = VectorStore::open(temp.path(), DIM).unwrap();
        let (_, ids, vectors) = add_doc(&store, "/docs/a.md", "A", 4);
        add_doc(&store, "/docs/b.md", "B", 2);

        assert!(store.delete_document_by_path("/docs/a.md").unwrap());
        assert!(store.get_document_by_path("/docs/a.md").unwrap().is_none());
        assert_eq!(store.passage_count().unwrap(), 2);

        let results = store.search(&vectors[0], 10).unwrap();
        assert!(results.iter().all(|r| r.file_path != "/docs/a.md"));
        assert!(results.iter().all(|r| !ids.contains(&r.passage_id)));

        assert!(!store.delete_document_by_path("/docs/a.md").unwrap());
    }

    #[test]
    fn test_file_unchanged() {
        let temp = TempDir::new().unwrap();
        let store = VectorStore::open(temp.path(), DIM).unwrap();
        store.insert_document("/docs/a.md", "abc", "A").unwrap();

        assert!(store.file_unchanged("/docs/a.md", "abc").unwrap());
        assert!(store.file_unchanged("/docs/a.md", "abc").unwrap());
        assert!(!store.file_unchanged("/docs/a.md", "def").unwrap());
        assert!(!store.file_unchanged("/docs/new.md", "abc").unwrap());
    }

    #[test]
    fn test_duplicate_path_rejected() {
        let temp = TempDir::new().unwrap();
        let store = VectorStore::open(temp.path(), DIM).unwrap();
        store.insert_document("/docs/a.md", "h1", "A").unwrap();
        assert!(matches!(
            store.insert_document("/docs/a.md", "h2", "A"),
            Err(StoreError::DuplicatePath(_))
        ));
    }

    #[test]
    fn test_mismatched_counts_insert_nothing() {
        let temp = TempDir::new().unwrap();
        let store = VectorStore::open(temp.path(), DIM).unwrap();
        let id = store.insert_document("/docs/a.md", "h", "A").unwrap();

        let result = store.insert_passages(id, &[chunk("x", 1), chunk("y", 2)], &[random_vector()]);
        assert!(matches!(result, Err(StoreError::InvalidInput(_))));
        assert_eq!(store.passage_count().unwrap(), 0);

        let result = store.insert_passages(id, &[chunk("x", 1)], &[vec![1.0; DIM + 1]]);
        assert!(matches!(result, Err(StoreError::DimensionMismatch { .. })));
        assert_eq!(store.passage_count().unwrap(), 0);
        assert_eq!(store.stats().unwrap().vectors, 0);
    }

    #[test]
    fn test_passages_need_a_document() {
        let temp = TempDir::new().unwrap();
        let store = VectorStore::open(temp.path(), DIM).unwrap();
        let result = store.insert_passages(99, &[chunk("x", 1)], &[random_vector()]);
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_null_and_non_finite_vectors() {
        let temp = TempDir::new().unwrap();
        let store = VectorStore::open(temp.path(), DIM).unwrap();
        let id = store.insert_document("/docs/a.md", "h", "A").unwrap();

        let mut noisy = vec![0.0; DIM];
        noisy[0] = 1.0;
        noisy[1] = f32::NAN;
        noisy[2] = f32::INFINITY;

        let ids = store
            .insert_passages(id, &[chunk("null", 1), chunk("noisy", 2)], &[vec![], noisy])
            .unwrap();
        assert_eq!(store.passage_count().unwrap(), 2);
        assert_eq!(store.stats().unwrap().vectors, 1);

        let mut axis = vec![0.0; DIM];
        axis[0] = 1.0;
        let results = store.search(&axis, 5).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].passage_id, ids[1]);
        assert!(results[0].distance.abs() < 1e-4);
    }

    #[test]
    fn test_list_documents_by_title() {
        let temp = TempDir::new().unwrap();
        let store = VectorStore::open(temp.path(), DIM).unwrap();
        store.insert_document("/docs/b.md", "h", "Beta").unwrap();
        store.insert_document("/docs/a.md", "h", "Alpha").unwrap();
        store.insert_document("/docs/c.md", "h", "alpha").unwrap();

        let titles: Vec<String> = store
            .list_documents()
            .unwrap()
            .into_iter()
            .map(|d| d.title)
            .collect();
        assert_eq!(titles, vec!["Alpha", "Beta", "alpha"]);
    }

    #[test]
    fn test_search_edge_cases() {
        let temp = TempDir::new().unwrap();
        let store = VectorStore::open(temp.path(), DIM).unwrap();
        assert!(store.search(&random_vector(), 5).unwrap().is_empty());
        assert!(matches!(
            store.search(&random_vector(), 0),
            Err(StoreError::InvalidInput(_))
        ));
        assert!(matches!(
            store.search(&[1.0, 0.0], 3),
            Err(StoreError::DimensionMismatch { .. })
        ));

        add_doc(&store, "/docs/a.md", "A", 4);
        assert_eq!(store.search(&random_vector(), 100).unwrap().len(), 4);
    }

    #[test]
    fn test_read_only_rejects_mutations() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            VectorStore::open_read_only(temp.path(), DIM),
            Err(StoreError::NotFound(_))
        ));

        {
            let store = VectorStore::open(temp.path(), DIM).unwrap();
            add_doc(&store, "/docs/a.md", "A", 2);
        }

        let reader = VectorStore::open_read_only(temp.path(), DIM).unwrap();
        assert!(reader.is_read_only());
        assert!(matches!(
            reader.insert_document("/docs/x.md", "h", "X"),
            Err(StoreError::ReadOnly)
        ));
        assert!(matches!(
            reader.delete_document_by_path("/docs/a.md"),
            Err(StoreError::ReadOnly)
        ));
        assert!(matches!(
            reader.insert_passages(1, &[], &[]),
            Err(StoreError::ReadOnly)
        ));
        assert!(matches!(
            reader.delete_documents_except(Path::new("/docs"), &HashSet::new()),
            Err(StoreError::ReadOnly)
        ));
        assert_eq!(reader.document_count().unwrap(), 1);
        assert_eq!(reader.search(&random_vector(), 5).unwrap().len(), 2);
    }

    #[test]
    fn test_reader_alongside_writer() {
        let temp = TempDir::new().unwrap();
        let writer = VectorStore::open(temp.path(), DIM).unwrap();
        let (_, ids, vectors) = add_doc(&writer, "/docs/a.md", "A", 3);
        writer.flush().unwrap();

        let reader = VectorStore::open_read_only(temp.path(), DIM).unwrap();
        let results = reader.search(&vectors[2], 1).unwrap();
        assert_eq!(results[0].passage_id, ids[2]);

        // the writer keeps working while the reader is open
        add_doc(&writer, "/docs/b.md", "B", 1);
        assert_eq!(writer.document_count().unwrap(), 2);
    }

    #[test]
    fn test_stale_index_is_rebuilt() {
        let temp = TempDir::new().unwrap();
        let (ids, vectors) = {
            let store = VectorStore::open(temp.path(), DIM).unwrap();
            let (_, ids, vectors) = add_doc(&store, "/docs/a.md", "A", 5);
            (ids, vectors)
        };
        write_generation(temp.path(), 0).unwrap();

        let store = VectorStore::open(temp.path(), DIM).unwrap();
        assert_eq!(store.stats().unwrap().vectors, 5);
        assert_eq!(store.search(&vectors[4], 1).unwrap()[0].passage_id, ids[4]);
        assert_eq!(read_generation(temp.path()), Some(store.stats().unwrap().generation));
    }

    #[test]
    fn test_reopen_keeps_ids_monotonic() {
        let temp = TempDir::new().unwrap();
        let (doc_id, ids, _) = {
            let store = VectorStore::open(temp.path(), DIM).unwrap();
            add_doc(&store, "/docs/a.md", "A", 2)
        };

        let store = VectorStore::open(temp.path(), DIM).unwrap();
        let (doc_id2, ids2, _) = add_doc(&store, "/docs/b.md", "B", 2);
        assert!(doc_id2 > doc_id);
        assert!(ids2[0] > ids[1]);
    }

    #[test]
    fn test_dimension_fixed_at_creation() {
        let temp = TempDir::new().unwrap();
        drop(VectorStore::open(temp.path(), DIM).unwrap());
        assert!(matches!(
            VectorStore::open(temp.path(), DIM * 2),
            Err(StoreError::DimensionMismatch { .. })
        ));
        assert!(matches!(
            VectorStore::open(temp.path(), 0),
            Err(StoreError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_reinsert_churn_keeps_index_consistent() {
        let temp = TempDir::new().unwrap();
        let store = VectorStore::open(temp.path(), DIM).unwrap();
        add_doc(&store, "/docs/a.md", "A", 10);
        add_doc(&store, "/docs/b.md", "B", 10);

        let mut latest = Vec::new();
        for round in 0..30 {
            store.delete_document_by_path("/docs/churn.md").unwrap();
            let (_, ids, vectors) = add_doc(&store, "/docs/churn.md", "Churn", 20);
            latest = vectors;

            let stats = store.stats().unwrap();
            assert_eq!(stats.vectors, store.passage_count().unwrap(), "round {round}");
            assert_eq!(stats.passages, 40);
            assert_eq!(store.search(&latest[5], 1).unwrap()[0].passage_id, ids[5]);
        }

        add_doc(&store, "/docs/c.md", "C", 10);
        assert_eq!(store.stats().unwrap().vectors, 50);
        let results = store.search(&latest[0], 100).unwrap();
        assert_eq!(results.len(), 50);
        for pair in results.windows(2) {
            assert!(pair[0].distance <= pair[1].distance);
        }
    }

    #[test]
    fn test_delete_documents_except() {
        let temp = TempDir::new().unwrap();
        let store = VectorStore::open(temp.path(), DIM).unwrap();
        add_doc(&store, "/docs/keep.md", "Keep", 1);
        add_doc(&store, "/docs/gone.md", "Gone", 1);
        add_doc(&store, "/docs2/other.md", "Other", 1);

        let keep: HashSet<String> = ["/docs/keep.md".to_string()].into_iter().collect();
        let deleted = store
            .delete_documents_except(Path::new("/docs"), &keep)
            .unwrap();
        assert_eq!(deleted, vec!["/docs/gone.md".to_string()]);
        assert_eq!(store.document_count().unwrap(), 2);
        assert!(store.get_document_by_path("/docs2/other.md").unwrap().is_some());
    }

    #[test]
    fn test_concurrent_writers_share_one_handle() {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(VectorStore::open(temp.path(), DIM).unwrap());

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for i in 0..5 {
                        add_doc(&store, &format!("/docs/{t}-{i}.md"), "T", 2);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let stats = store.stats().unwrap();
        assert_eq!(stats.documents, 20);
        assert_eq!(stats.passages, 40);
        assert_eq!(stats.vectors, 40);
    }
}
