//! Heading-scoped markdown chunking.
//!
//! Each heading opens a passage that runs up to the next heading at any
//! level. Text before the first heading becomes a `(root)` passage.

use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};

use mydocs_types::Chunk;

/// Splits a source document into passages.
pub trait Chunker: Send + Sync {
    fn chunk(&self, source: &str) -> Vec<Chunk>;
}

/// CommonMark chunker backed by pulldown-cmark.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownChunker;

impl MarkdownChunker {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Debug)]
struct Heading {
    level: u32,
    text: String,
    /// Byte offset where the heading block begins
    start: usize,
}

impl Chunker for MarkdownChunker {
    fn chunk(&self, source: &str) -> Vec<Chunk> {
        let headings = scan_headings(source);

        if headings.is_empty() {
            let content = source.trim();
            if content.is_empty() {
                return vec![];
            }
            return vec![Chunk::root(content)];
        }

        let mut chunks = Vec::with_capacity(headings.len() + 1);

        let preamble = source[..headings[0].start].trim();
        if !preamble.is_empty() {
            chunks.push(Chunk::root(preamble));
        }

        let mut stack: Vec<(u32, &str)> = Vec::new();
        for (i, heading) in headings.iter().enumerate() {
            while stack.last().is_some_and(|(level, _)| *level >= heading.level) {
                stack.pop();
            }
            stack.push((heading.level, heading.text.as_str()));

            let end = headings.get(i + 1).map_or(source.len(), |next| next.start);
            chunks.push(Chunk::new(
                heading_path(&stack),
                heading.level,
                source[heading.start..end].trim(),
                line_number(source, heading.start),
            ));
        }

        chunks
    }
}

/// Headings in document order with their flattened inline text.
fn scan_headings(source: &str) -> Vec<Heading> {
    let mut headings = Vec::new();
    let mut current: Option<Heading> = None;

    for (event, range) in Parser::new_ext(source, Options::empty()).into_offset_iter() {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                current = Some(Heading {
                    level: level as u32,
                    text: String::new(),
                    start: range.start,
                });
            }
            Event::End(TagEnd::Heading(_)) => {
                if let Some(mut heading) = current.take() {
                    heading.text = heading.text.trim().to_string();
                    headings.push(heading);
                }
            }
            Event::Text(text) | Event::Code(text) => {
                if let Some(heading) = current.as_mut() {
                    heading.text.push_str(&text);
                }
            }
            Event::SoftBreak | Event::HardBreak => {
                if let Some(heading) = current.as_mut() {
                    heading.text.push(' ');
                }
            }
            _ => {}
        }
    }

    headings
}

/// Breadcrumb such as `# Guide > ## Install`.
fn heading_path(stack: &[(u32, &str)]) -> String {
    stack
        .iter()
        .map(|(level, text)| format!("{} {}", "#".repeat(*level as usize), text))
        .collect::<Vec<_>>()
        .join(" > ")
}

/// 1-based line containing byte `offset`.
fn line_number(source: &str, offset: usize) -> u32 {
    source.as_bytes()[..offset]
        .iter()
        .filter(|b| **b == b'\n')
        .count() as u32
        + 1
}
