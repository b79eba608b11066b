//! Update command implementation.

use super::require;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Assistant;
use anyhow::Result;
use std::path::PathBuf;

/// Run the update command: clear the collection and re-index the directory.
pub async fn run_update(dir: Option<PathBuf>, settings: Settings) -> Result<()> {
    require(Operation::Ingest)?;

    let dir = dir.unwrap_or_else(|| settings.documents_dir());
    preflight::check_documents_dir(&dir)?;

    let assistant = Assistant::new(settings).await?;

    let spinner = Output::spinner("Rebuilding knowledge base...");
    let result = assistant.update(&dir).await;
    spinner.finish_and_clear();

    match result {
        Ok(report) => {
            if report.success {
                Output::success("Knowledge base rebuilt.");
            } else {
                Output::warning("Rebuild finished with problems.");
            }
            Output::ingest_report(&report);
            Ok(())
        }
        Err(e) => {
            Output::error(&format!("Update failed: {}", e));
            Err(e.into())
        }
    }
}
