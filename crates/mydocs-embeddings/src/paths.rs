//! Model directory resolution.
//!
//! Models are plain directories holding the HuggingFace export of a BERT
//! checkpoint. When no directory is configured, well-known locations next
//! to the executable and the working directory are searched.

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::EmbeddingError;

/// Files a model directory must contain
pub const MODEL_FILES: &[&str] = &["config.json", "tokenizer.json", "model.safetensors"];

/// Subdirectory of `assets/models` holding the embedding model
const EMBED_SUBDIR: &str = "embed";

/// Subdirectory of `assets/models` holding the cross-encoder
const RERANK_SUBDIR: &str = "rerank";

/// Paths to model files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPaths {
    pub config: PathBuf,
    pub tokenizer: PathBuf,
    pub weights: PathBuf,
}

impl ModelPaths {
    /// Paths of the model files inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            config: dir.join(MODEL_FILES[0]),
            tokenizer: dir.join(MODEL_FILES[1]),
            weights: dir.join(MODEL_FILES[2]),
        }
    }

    /// Fail with the first missing file.
    pub fn ensure_present(&self) -> Result<(), EmbeddingError> {
        for path in [&self.config, &self.tokenizer, &self.weights] {
            if !path.is_file() {
                return Err(EmbeddingError::ModelNotFound(path.display().to_string()));
            }
        }
        Ok(())
    }
}

/// Locate the embedding model directory.
///
/// A configured directory must exist. Otherwise the first directory found
/// among the well-known locations wins.
pub fn resolve_model_dir(configured: Option<&Path>) -> Result<PathBuf, EmbeddingError> {
    if let Some(dir) = configured {
        if dir.is_dir() {
            return Ok(dir.to_path_buf());
        }
        return Err(EmbeddingError::ModelNotFound(dir.display().to_string()));
    }

    search_well_known(EMBED_SUBDIR).ok_or_else(|| {
        EmbeddingError::ModelNotFound(format!(
            "no embedding model under assets/models/{}",
            EMBED_SUBDIR
        ))
    })
}

/// Locate the cross-encoder directory, if one is installed.
pub fn resolve_reranker_dir(configured: Option<&Path>) -> Option<PathBuf> {
    match configured {
        Some(dir) if dir.is_dir() => Some(dir.to_path_buf()),
        Some(dir) => {
            debug!(path = ?dir, "Configured reranker directory does not exist");
            None
        }
        None => search_well_known(RERANK_SUBDIR),
    }
}

fn search_well_known(subdir: &str) -> Option<PathBuf> {
    candidate_roots()
        .into_iter()
        .map(|root| root.join("assets").join("models").join(subdir))
        .find(|dir| {
            let found = dir.is_dir();
            debug!(path = ?dir, found, "Probing model directory");
            found
        })
}

fn candidate_roots() -> Vec<PathBuf> {
    let mut roots = Vec::new();
    if let Some(exe_dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        roots.push(exe_dir.clone());
        roots.push(exe_dir.join(".."));
    }
    if let Ok(cwd) = std::env::current_dir() {
        roots.push(cwd);
    }
    roots
}
