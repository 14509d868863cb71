//! Configuration loading for mydocs.
//!
//! Layered config: defaults -> config file -> env vars -> CLI flags.
//! The default config file lives at ~/.config/mydocs/config.toml.

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::MydocsError;

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Path to the store directory
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Embedding model directory (config.json, tokenizer.json, model.safetensors).
    /// Resolved from well-known locations when unset.
    #[serde(default)]
    pub model_path: Option<String>,

    /// Cross-encoder model directory. Reranking is disabled when it cannot be found.
    #[serde(default)]
    pub reranker_path: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Parallel indexing workers (0 = number of available processors)
    #[serde(default)]
    pub index_concurrency: usize,

    /// Remove documents whose files disappeared from an indexed directory
    #[serde(default = "default_prune_missing")]
    pub prune_missing: bool,
}

fn default_db_path() -> String {
    "mydocs.db".to_string()
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_prune_missing() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            model_path: None,
            reranker_path: None,
            log_level: default_log_level(),
            index_concurrency: 0,
            prune_missing: default_prune_missing(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/mydocs/config.toml)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (MYDOCS_*)
    ///
    /// CLI flags should be applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, MydocsError> {
        let config_dir = ProjectDirs::from("", "", "mydocs")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            .set_default("db_path", default_db_path())
            .map_err(|e| MydocsError::Config(e.to_string()))?
            .set_default("log_level", default_log_level())
            .map_err(|e| MydocsError::Config(e.to_string()))?
            .set_default("index_concurrency", 0_i64)
            .map_err(|e| MydocsError::Config(e.to_string()))?
            .set_default("prune_missing", default_prune_missing())
            .map_err(|e| MydocsError::Config(e.to_string()))?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // MYDOCS_DB_PATH, MYDOCS_MODEL_PATH, MYDOCS_RERANKER_PATH, ...
        // Keys contain single underscores, so nesting uses a double one.
        builder = builder.add_source(
            Environment::with_prefix("MYDOCS")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| MydocsError::Config(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| MydocsError::Config(e.to_string()))
    }

    /// Store directory with a leading `~/` expanded.
    pub fn expanded_db_path(&self) -> PathBuf {
        expand_home(&self.db_path)
    }

    /// Configured embedding model directory, if any.
    pub fn model_dir(&self) -> Option<PathBuf> {
        self.model_path.as_deref().map(expand_home)
    }

    /// Configured reranker model directory, if any.
    pub fn reranker_dir(&self) -> Option<PathBuf> {
        self.reranker_path.as_deref().map(expand_home)
    }

    /// Effective worker count for indexing.
    pub fn effective_concurrency(&self) -> usize {
        if self.index_concurrency > 0 {
            self.index_concurrency
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        }
    }
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
