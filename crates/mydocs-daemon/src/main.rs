//! mydocs
//!
//! Local semantic search over markdown documents.
//!
//! # Usage
//!
//! ```bash
//! mydocs index <directory>
//! mydocs search <query...> [-n LIMIT] [--candidates N] [--rerank | --no-rerank]
//! mydocs list
//! mydocs serve
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/mydocs/config.toml)
//! 3. Environment variables (MYDOCS_*)
//! 4. CLI flags

use anyhow::Result;
use clap::Parser;

use mydocs_daemon::{
    init_logging, load_settings, rerank_preference, run_index, run_list, run_search, run_serve,
    Cli, Commands,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(&cli)?;
    init_logging(&settings.log_level)?;

    match cli.command {
        Commands::Index {
            directory,
            no_prune,
        } => {
            run_index(settings, &directory, no_prune).await?;
        }
        Commands::Search {
            query,
            limit,
            candidates,
            rerank,
            no_rerank,
        } => {
            run_search(
                settings,
                query.join(" "),
                limit,
                candidates,
                rerank_preference(rerank, no_rerank),
            )
            .await?;
        }
        Commands::List => {
            run_list(settings)?;
        }
        Commands::Serve => {
            run_serve(settings).await?;
            // The stdin reader thread may still be parked in a read.
            std::process::exit(0);
        }
    }

    Ok(())
}
