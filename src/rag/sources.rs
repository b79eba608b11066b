//! Source citations for generated answers.

use super::RetrievedChunk;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Maximum citations attached to an answer.
pub const MAX_SOURCES: usize = 3;

/// Characters of chunk text shown in a citation preview.
pub const PREVIEW_CHARS: usize = 200;

/// A document passage cited in an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub file: String,
    /// Page number, or "N/A".
    pub page: String,
    pub content_preview: String,
}

/// Cite up to three distinct (file, page) pairs, in retrieval order.
pub fn extract_sources(chunks: &[RetrievedChunk]) -> Vec<Source> {
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut sources = Vec::new();

    for retrieved in chunks {
        let file = retrieved.chunk.source_file.clone();
        let page = retrieved.chunk.page_label();

        if !seen.insert((file.clone(), page.clone())) {
            continue;
        }

        sources.push(Source {
            file,
            page,
            content_preview: preview(&retrieved.chunk.text, PREVIEW_CHARS),
        });

        if sources.len() == MAX_SOURCES {
            break;
        }
    }

    sources
}

/// First `max_chars` characters of `text`, with "..." when cut.
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
