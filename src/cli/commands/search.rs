//! Search command implementation.

use super::{require, search_mode};
use crate::cli::preflight::Operation;
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Assistant;
use crate::vector_store::MetadataFilter;
use anyhow::Result;

/// Run the search command.
pub async fn run_search(
    query: &str,
    limit: usize,
    mmr: bool,
    file: Option<String>,
    settings: Settings,
) -> Result<()> {
    require(Operation::Ask)?;

    let mode = search_mode(mmr, &settings);
    let filter = file.map(MetadataFilter::source);
    let assistant = Assistant::new(settings).await?;

    let spinner = Output::spinner("Searching...");
    let results = assistant.search(query, limit, mode, filter.as_ref()).await;
    spinner.finish_and_clear();

    match results {
        Ok(hits) => {
            if hits.is_empty() {
                Output::warning("No results found matching your query.");
            } else {
                Output::success(&format!("Found {} results ({})", hits.len(), mode));
                for hit in &hits {
                    Output::search_result(hit);
                }
                println!();
            }
        }
        Err(e) => {
            Output::error(&format!("Search failed: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
