//! Text reports for agents and terminals.
//!
//! The agent-facing formats are part of the tool contract: an empty result
//! is the literal sentinel, never an empty string.

use std::fmt::Write;

use mydocs_types::Document;

use crate::service::SearchOutcome;

/// Sentinel for a search with no hits
pub const NO_RESULTS: &str = "No results found.";

/// Sentinel for an empty store
pub const NO_DOCUMENTS: &str =
    "No documents indexed yet. Run 'mydocs index <directory>' to index documents.";

/// Content lines shown per result in terminal output
const TERMINAL_MAX_LINES: usize = 6;

/// Markdown report of a search outcome.
pub fn format_search_report(outcome: &SearchOutcome) -> String {
    if outcome.items.is_empty() {
        return NO_RESULTS.to_string();
    }

    let mut out = String::new();
    let suffix = if outcome.reranked { " (reranked)" } else { "" };
    let _ = write!(
        out,
        "Found {} results for: {:?}{}\n\n",
        outcome.items.len(),
        outcome.query,
        suffix
    );

    for (i, item) in outcome.items.iter().enumerate() {
        if outcome.reranked {
            let _ = writeln!(out, "## Result {} (relevance: {:.2})", i + 1, item.score);
        } else {
            let _ = writeln!(out, "## Result {} ({:.1}% similar)", i + 1, item.score * 100.0);
        }
        let r = &item.result;
        let _ = writeln!(out, "**File:** {}:{}", r.file_path, r.start_line);
        let _ = write!(out, "**Section:** {}\n\n", r.heading_path);
        let _ = write!(out, "```\n{}\n```\n\n", r.content);
    }
    out
}

/// Markdown list of indexed documents.
pub fn format_document_list(docs: &[Document]) -> String {
    if docs.is_empty() {
        return NO_DOCUMENTS.to_string();
    }

    let mut out = String::new();
    let _ = write!(out, "Indexed {} documents:\n\n", docs.len());
    for doc in docs {
        let _ = write!(out, "- **{}**\n  {}\n", doc.title, doc.file_path);
    }
    out
}

/// Compact rendering for the `search` command.
pub fn format_terminal_results(outcome: &SearchOutcome) -> String {
    if outcome.items.is_empty() {
        return format!("{}\n", NO_RESULTS);
    }

    let mut out = String::new();
    let suffix = if outcome.reranked { " (reranked)" } else { "" };
    let _ = write!(
        out,
        "Found {} results for: {:?}{}\n\n",
        outcome.items.len(),
        outcome.query,
        suffix
    );

    for (i, item) in outcome.items.iter().enumerate() {
        let r = &item.result;
        let _ = writeln!(out, "{}", "─".repeat(61));
        if outcome.reranked {
            let _ = writeln!(
                out,
                "[{}] {} (relevance: {:.2})",
                i + 1,
                r.heading_path,
                item.score
            );
        } else {
            let _ = writeln!(
                out,
                "[{}] {} ({:.1}% similar)",
                i + 1,
                r.heading_path,
                item.score * 100.0
            );
        }
        let _ = write!(out, "    File: {}:{}\n\n", r.file_path, r.start_line);

        let lines: Vec<&str> = r.content.trim().lines().collect();
        for line in lines.iter().take(TERMINAL_MAX_LINES) {
            let _ = writeln!(out, "    {}", line);
        }
        if lines.len() > TERMINAL_MAX_LINES {
            let _ = writeln!(
                out,
                "    ... ({} more lines)",
                lines.len() - TERMINAL_MAX_LINES
            );
        }
        out.push('\n');
    }
    out
}
