//! Command implementations for the mydocs binary.
//!
//! Handles:
//! - index: Walk a directory and index changed markdown files
//! - search: One-shot search printed for a terminal
//! - list: Print indexed documents
//! - serve: Stdio tool server for agents over a read-only store

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use mydocs_embeddings::EMBEDDING_DIM;
use mydocs_indexing::{Indexer, IndexerConfig, IndexingError};
use mydocs_search::{format_document_list, format_terminal_results, SearchParams};
use mydocs_store::VectorStore;
use mydocs_types::Settings;

use crate::app::{App, StoreMode};
use crate::cli::Cli;
use crate::mcp::McpServer;

/// Load settings and apply CLI overrides (highest precedence).
pub fn load_settings(cli: &Cli) -> Result<Settings> {
    let mut settings = Settings::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(db_path) = &cli.db_path {
        settings.db_path = db_path.clone();
    }
    if let Some(level) = cli.log_level_override() {
        settings.log_level = level;
    }
    Ok(settings)
}

/// Index `directory` into the store.
pub async fn run_index(settings: Settings, directory: &Path, no_prune: bool) -> Result<()> {
    let config = IndexerConfig::default()
        .with_concurrency(settings.effective_concurrency())
        .with_prune_missing(settings.prune_missing && !no_prune);

    let app = App::load(settings, StoreMode::Writer, false)?;
    info!(directory = ?directory, database = ?app.store.path(), "Starting indexing");

    let indexer = Indexer::new(app.embedder.clone(), app.store.clone())
        .with_config(config)
        .with_progress(Arc::new(|done: usize, total: usize, path: &Path| {
            eprint!("\r\x1b[K[{}/{}] {}", done, total, display_name(path));
        }));

    let cancel = CancellationToken::new();
    let watcher = tokio::spawn(cancel_on_signal(cancel.clone()));

    let result = indexer.index_directory(directory, &cancel).await;
    watcher.abort();
    eprint!("\r\x1b[K");

    let stats = match result {
        Ok(stats) => stats,
        Err(IndexingError::Cancelled) => {
            println!("Indexing cancelled.");
            return Ok(());
        }
        Err(e) => return Err(e).context("Indexing failed"),
    };

    println!("Indexing complete!");
    println!("  Indexed: {} files", stats.indexed);
    println!("  Skipped: {} unchanged files", stats.skipped);
    if stats.failed > 0 {
        println!("  Failed: {} files (see log)", stats.failed);
    }
    if stats.pruned > 0 {
        println!("  Pruned: {} missing files", stats.pruned);
    }
    println!("  Passages: {}", stats.passages);
    Ok(())
}

/// Run one search and print it for a terminal.
pub async fn run_search(
    settings: Settings,
    query: String,
    limit: Option<i64>,
    candidates: Option<i64>,
    rerank: Option<bool>,
) -> Result<()> {
    let app = App::load(settings, StoreMode::ReadOnly, rerank != Some(false))?;
    let service = app.search_service();
    let params = SearchParams {
        query,
        limit,
        candidates,
        rerank,
    };

    let outcome =
        tokio::task::spawn_blocking(move || service.search(&params, &CancellationToken::new()))
            .await
            .context("Search task failed")?
            .context("Search failed")?;

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(format_terminal_results(&outcome).as_bytes())?;
    Ok(())
}

/// Print indexed documents.
pub fn run_list(settings: Settings) -> Result<()> {
    let path = settings.expanded_db_path();
    if !path.exists() {
        println!("{}", format_document_list(&[]));
        return Ok(());
    }
    let store = VectorStore::open_read_only(&path, EMBEDDING_DIM)
        .with_context(|| format!("Failed to open store at {}", path.display()))?;
    let docs = store.list_documents().context("Failed to list documents")?;
    println!("{}", format_document_list(&docs).trim_end());
    Ok(())
}

/// Serve tools over stdin/stdout until EOF or a shutdown signal.
pub async fn run_serve(settings: Settings) -> Result<()> {
    let app = App::load(settings, StoreMode::ReadOnly, true)?;
    if app.reranker.is_some() {
        info!("Reranker enabled");
    } else {
        info!("Reranker not available, using vector-only search");
    }

    let cancel = CancellationToken::new();
    let watcher = tokio::spawn(cancel_on_signal(cancel.clone()));

    let server = McpServer::new(Arc::new(app.search_service()), cancel);
    let result = server
        .serve(
            tokio::io::BufReader::new(tokio::io::stdin()),
            tokio::io::stdout(),
        )
        .await;
    watcher.abort();

    result.context("Server error")
}

/// Cancel `token` on Ctrl-C or SIGTERM.
async fn cancel_on_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
        _ = terminate => info!("Received SIGTERM, shutting down..."),
    }
    token.cancel();
}

/// Path shortened to at most 50 characters for progress lines.
fn display_name(path: &Path) -> String {
    let full = path.to_string_lossy();
    let chars: Vec<char> = full.chars().collect();
    if chars.len() <= 50 {
        return full.into_owned();
    }
    let tail: String = chars[chars.len() - 47..].iter().collect();
    format!("...{}", tail)
}
