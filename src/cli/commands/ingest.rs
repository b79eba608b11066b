//! Ingest command implementation.

use super::require;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Assistant;
use anyhow::Result;
use std::path::PathBuf;

/// Run the ingest command.
pub async fn run_ingest(dir: Option<PathBuf>, force: bool, settings: Settings) -> Result<()> {
    require(Operation::Ingest)?;

    let dir = dir.unwrap_or_else(|| settings.documents_dir());
    if let Err(e) = preflight::check_documents_dir(&dir) {
        Output::error(&e.to_string());
        return Err(e.into());
    }

    let assistant = Assistant::new(settings).await?;

    let spinner = Output::spinner(&format!("Indexing documents in {}...", dir.display()));
    let result = assistant.initialize(&dir, force).await;
    spinner.finish_and_clear();

    match result {
        Ok(report) => {
            if report.success {
                Output::success("Knowledge base is ready.");
            } else if report.chunk_count == 0 && report.failed_files.is_empty() {
                Output::warning(&format!("No supported documents found in {}", dir.display()));
            } else {
                Output::warning("Ingestion finished with problems.");
            }
            Output::ingest_report(&report);
        }
        Err(e) => {
            Output::error(&format!("Ingestion failed: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
