//! Recursive separator chunking.
//!
//! Tries paragraph breaks, then line breaks, then spaces, then single characters,
//! and merges the resulting pieces back into windows of at most `chunk_size`
//! characters that overlap by up to `chunk_overlap` characters.

use super::{Chunk, Chunker, ChunkingConfig};
use crate::document::DocumentPage;
use std::collections::VecDeque;
use tracing::{debug, warn};

/// Separators from coarsest to finest. The empty separator splits into characters.
const DEFAULT_SEPARATORS: &[&str] = &["\n\n", "\n", " ", ""];

/// Recursive character chunker.
pub struct RecursiveChunker {
    config: ChunkingConfig,
}

impl RecursiveChunker {
    pub fn new(config: ChunkingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    /// Split a single text into chunk strings.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Vec::new();
        }
        if char_len(trimmed) <= self.config.chunk_size {
            return vec![trimmed.to_string()];
        }
        self.split_recursive(trimmed, DEFAULT_SEPARATORS)
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let mut separator = separators.last().copied().unwrap_or("");
        let mut finer: &[&str] = &[];

        for (i, &sep) in separators.iter().enumerate() {
            if sep.is_empty() {
                separator = sep;
                finer = &[];
                break;
            }
            if text.contains(sep) {
                separator = sep;
                finer = &separators[i + 1..];
                break;
            }
        }

        let pieces: Vec<&str> = if separator.is_empty() {
            text.char_indices()
                .map(|(i, c)| &text[i..i + c.len_utf8()])
                .collect()
        } else {
            text.split(separator).filter(|p| !p.is_empty()).collect()
        };

        let mut chunks = Vec::new();
        let mut fitting: Vec<&str> = Vec::new();

        for piece in pieces {
            if char_len(piece) < self.config.chunk_size {
                fitting.push(piece);
                continue;
            }

            if !fitting.is_empty() {
                chunks.extend(self.merge(&fitting, separator));
                fitting.clear();
            }

            if finer.is_empty() {
                chunks.push(piece.to_string());
            } else {
                chunks.extend(self.split_recursive(piece, finer));
            }
        }

        if !fitting.is_empty() {
            chunks.extend(self.merge(&fitting, separator));
        }

        chunks
    }

    /// Merge small pieces into windows, keeping a tail of up to `chunk_overlap`
    /// characters as the start of the next window.
    fn merge(&self, pieces: &[&str], separator: &str) -> Vec<String> {
        let size = self.config.chunk_size;
        let overlap = self.config.chunk_overlap;
        let sep_len = char_len(separator);

        let mut merged = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(piece);
            let joiner = if window.is_empty() { 0 } else { sep_len };

            if total + len + joiner > size {
                if total > size {
                    warn!("Created a chunk of {} characters, longer than {}", total, size);
                }

                if !window.is_empty() {
                    if let Some(chunk) = join_window(&window, separator) {
                        merged.push(chunk);
                    }

                    while total > overlap
                        || (total > 0
                            && total + len + if window.is_empty() { 0 } else { sep_len } > size)
                    {
                        let extra = if window.len() > 1 { sep_len } else { 0 };
                        match window.pop_front() {
                            Some(first) => {
                                total = total.saturating_sub(char_len(first) + extra);
                            }
                            None => {
                                total = 0;
                                break;
                            }
                        }
                    }
                }
            }

            window.push_back(piece);
            total += len + if window.len() > 1 { sep_len } else { 0 };
        }

        if let Some(chunk) = join_window(&window, separator) {
            merged.push(chunk);
        }

        merged
    }
}

impl Default for RecursiveChunker {
    fn default() -> Self {
        Self::new(ChunkingConfig::default())
    }
}

impl Chunker for RecursiveChunker {
    fn split(&self, pages: &[DocumentPage]) -> Vec<Chunk> {
        let mut chunks = Vec::new();

        for page in pages {
            for text in self.split_text(&page.text) {
                let index = chunks.len();
                chunks.push(Chunk::new(text, &page.metadata, index));
            }
        }

        debug!("Split {} pages into {} chunks", pages.len(), chunks.len());
        chunks
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn join_window(window: &VecDeque<&str>, separator: &str) -> Option<String> {
    let joined = window.iter().copied().collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
