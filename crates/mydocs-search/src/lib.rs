//! # mydocs-search
//!
//! Query orchestration: embed the query, recall candidates from the vector
//! store, optionally rerank them with a cross-encoder, and render the
//! agent-facing text reports.

pub mod error;
pub mod report;
pub mod service;

pub use error::SearchError;
pub use report::{
    format_document_list, format_search_report, format_terminal_results, NO_DOCUMENTS,
    NO_RESULTS,
};
pub use service::{
    SearchOutcome, SearchParams, SearchService, DEFAULT_CANDIDATES, DEFAULT_LIMIT,
    MAX_CANDIDATES, MAX_LIMIT,
};
