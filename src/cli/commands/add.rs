//! Add command implementation.

use super::require;
use crate::cli::preflight::Operation;
use crate::cli::Output;
use crate::config::Settings;
use crate::document::is_supported;
use crate::orchestrator::Assistant;
use anyhow::Result;
use std::path::Path;

/// Run the add command.
pub async fn run_add(file: &Path, settings: Settings) -> Result<()> {
    require(Operation::Ingest)?;

    if !file.is_file() {
        Output::error(&format!("{} is not a file", file.display()));
        anyhow::bail!("file not found: {}", file.display());
    }
    if !is_supported(file) {
        Output::error("Only PDF, text and Markdown files can be added.");
        anyhow::bail!("unsupported document: {}", file.display());
    }

    let assistant = Assistant::new(settings).await?;

    let spinner = Output::spinner(&format!("Indexing {}...", file.display()));
    let result = assistant.add_document(file).await;
    spinner.finish_and_clear();

    let report = result?;
    if report.success {
        Output::success(&format!("Added {}", file.display()));
    } else {
        Output::warning(&format!("{} was not indexed", file.display()));
    }
    Output::ingest_report(&report);

    Ok(())
}
