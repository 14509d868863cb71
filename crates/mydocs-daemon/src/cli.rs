//! CLI argument parsing for mydocs.
//!
//! CLI flags override every other configuration source.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// mydocs
///
/// Local semantic search over markdown documents, for terminals and agents.
#[derive(Parser, Debug)]
#[command(name = "mydocs")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/mydocs/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Verbose logging (same as --log-level debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Override store path
    #[arg(long, global = true)]
    pub db_path: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Index a directory of markdown files
    Index {
        /// Directory to index
        directory: PathBuf,

        /// Keep documents whose files were removed from the directory
        #[arg(long)]
        no_prune: bool,
    },

    /// Search indexed documents
    Search {
        /// Query text
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,

        /// Maximum results (default 5, max 20)
        #[arg(short = 'n', long)]
        limit: Option<i64>,

        /// Candidates fetched before reranking (default 50, max 100)
        #[arg(long)]
        candidates: Option<i64>,

        /// Require cross-encoder reranking
        #[arg(long, conflicts_with = "no_rerank")]
        rerank: bool,

        /// Skip reranking even when a reranker is available
        #[arg(long)]
        no_rerank: bool,
    },

    /// List indexed documents
    List,

    /// Serve the search tools to an agent over stdio
    Serve,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Log level implied by the flags, if any.
    pub fn log_level_override(&self) -> Option<String> {
        if self.verbose {
            Some("debug".to_string())
        } else {
            self.log_level.clone()
        }
    }
}

/// Tri-state rerank preference from the two search flags.
pub fn rerank_preference(rerank: bool, no_rerank: bool) -> Option<bool> {
    match (rerank, no_rerank) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_index() {
        let cli = Cli::parse_from(["mydocs", "index", "./docs"]);
        match cli.command {
            Commands::Index {
                directory,
                no_prune,
            } => {
                assert_eq!(directory, PathBuf::from("./docs"));
                assert!(!no_prune);
            }
            _ => panic!("Expected Index command"),
        }
    }

    #[test]
    fn test_cli_search_joins_words() {
        let cli = Cli::parse_from([
            "mydocs",
            "search",
            "how",
            "to",
            "install",
            "-n",
            "3",
            "--candidates",
            "20",
        ]);
        match cli.command {
            Commands::Search {
                query,
                limit,
                candidates,
                rerank,
                no_rerank,
            } => {
                assert_eq!(query.join(" "), "how to install");
                assert_eq!(limit, Some(3));
                assert_eq!(candidates, Some(20));
                assert_eq!(rerank_preference(rerank, no_rerank), None);
            }
            _ => panic!("Expected Search command"),
        }
    }

    #[test]
    fn test_cli_search_requires_query() {
        assert!(Cli::try_parse_from(["mydocs", "search"]).is_err());
    }

    #[test]
    fn test_cli_rerank_flags_conflict() {
        assert!(Cli::try_parse_from(["mydocs", "search", "q", "--rerank", "--no-rerank"]).is_err());

        let cli = Cli::parse_from(["mydocs", "search", "q", "--no-rerank"]);
        match cli.command {
            Commands::Search {
                rerank, no_rerank, ..
            } => assert_eq!(rerank_preference(rerank, no_rerank), Some(false)),
            _ => panic!("Expected Search command"),
        }
    }

    #[test]
    fn test_cli_global_flags() {
        let cli = Cli::parse_from([
            "mydocs",
            "list",
            "--db-path",
            "/tmp/store",
            "--config",
            "/tmp/c.toml",
            "-l",
            "info",
        ]);
        assert!(matches!(cli.command, Commands::List));
        assert_eq!(cli.db_path.as_deref(), Some("/tmp/store"));
        assert_eq!(cli.config.as_deref(), Some("/tmp/c.toml"));
        assert_eq!(cli.log_level_override().as_deref(), Some("info"));
    }

    #[test]
    fn test_cli_verbose_wins() {
        let cli = Cli::parse_from(["mydocs", "-v", "-l", "error", "serve"]);
        assert!(matches!(cli.command, Commands::Serve));
        assert_eq!(cli.log_level_override().as_deref(), Some("debug"));
    }
}
