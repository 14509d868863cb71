//! mydocs binary library exports.
//!
//! # Modules
//!
//! - `cli`: Command-line argument parsing with clap
//! - `app`: Component loading and composition
//! - `commands`: Command implementations (index, search, list, serve)
//! - `mcp`: Stdio tool server for agents
//! - `logging`: Tracing subscriber setup

pub mod app;
pub mod cli;
pub mod commands;
pub mod logging;
pub mod mcp;

pub use app::{App, StoreMode};
pub use cli::{rerank_preference, Cli, Commands};
pub use commands::{load_settings, run_index, run_list, run_search, run_serve};
pub use logging::init_logging;
pub use mcp::McpServer;
