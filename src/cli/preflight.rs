//! Pre-flight checks before expensive operations.
//!
//! Validates that required configuration is available before starting
//! operations that would otherwise fail midway.

use crate::error::{HandbookError, Result};
use std::path::Path;

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Ingestion embeds chunks, so it needs the API key.
    Ingest,
    /// Asking and searching embed the query and need the API key.
    Ask,
    /// Status and reset only touch the local store.
    Status,
}

/// Run pre-flight checks for the given operation.
pub fn check(operation: Operation) -> Result<()> {
    match operation {
        Operation::Ingest | Operation::Ask => check_api_key(|key| std::env::var(key).ok()),
        Operation::Status => Ok(()),
    }
}

/// Check that `dir` exists and is a directory.
pub fn check_documents_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        return Err(HandbookError::NotFound(format!(
            "documents directory {} does not exist",
            dir.display()
        )));
    }
    if !dir.is_dir() {
        return Err(HandbookError::InvalidInput(format!(
            "{} is not a directory",
            dir.display()
        )));
    }
    Ok(())
}

fn check_api_key<F>(lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup("OPENAI_API_KEY") {
        Some(key) if !key.trim().is_empty() => Ok(()),
        Some(_) => Err(HandbookError::Config(
            "OPENAI_API_KEY is empty. Set it with: export OPENAI_API_KEY='sk-...'".to_string(),
        )),
        None => Err(HandbookError::Config(
            "OPENAI_API_KEY not set. Set it with: export OPENAI_API_KEY='sk-...' or add it to .env"
                .to_string(),
        )),
    }
}
