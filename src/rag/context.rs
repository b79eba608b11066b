//! Context assembly under a character budget.

use super::RetrievedChunk;

/// Returned when there is nothing to pack.
pub const EMPTY_CONTEXT: &str = "No relevant documents found.";

/// Appended when later chunks did not fit the budget.
pub const TRUNCATION_MARKER: &str = "\n... (Additional documents truncated due to length limit) ...";

const BLOCK_SEPARATOR: &str = "\n";

/// Pack retrieved chunks into a prompt context of at most `max_chars` characters,
/// plus the truncation marker when one is added.
///
/// Chunks are added whole, in retrieval order. The first chunk is always included;
/// once a later chunk would exceed the budget the truncation marker is appended
/// and packing stops.
pub fn pack(chunks: &[RetrievedChunk], max_chars: usize) -> String {
    if chunks.is_empty() {
        return EMPTY_CONTEXT.to_string();
    }

    let mut blocks: Vec<String> = Vec::with_capacity(chunks.len());
    let mut total = 0usize;
    let mut truncated = false;

    for (i, retrieved) in chunks.iter().enumerate() {
        let block = format!(
            "\n--- Document {}: {} (Page {}) ---\n{}",
            i + 1,
            retrieved.chunk.source_file,
            retrieved.chunk.page_label(),
            retrieved.chunk.text.trim()
        );
        let joiner = if blocks.is_empty() { 0 } else { BLOCK_SEPARATOR.len() };
        let addition = block.chars().count() + joiner;

        if total + addition > max_chars && !blocks.is_empty() {
            truncated = true;
            break;
        }

        total += addition;
        blocks.push(block);
    }

    let mut context = blocks.join(BLOCK_SEPARATOR);
    // The marker carries its own leading newline.
    if truncated {
        context.push_str(TRUNCATION_MARKER);
    }
    context
}
