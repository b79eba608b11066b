//! Status command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Assistant;
use anyhow::Result;

/// Run the status command.
pub async fn run_status(settings: Settings) -> Result<()> {
    let assistant = Assistant::new(settings).await?;
    let status = assistant.status().await?;

    Output::header("Knowledge Base");
    Output::kv("Ready", if status.is_ready { "yes" } else { "no" });
    Output::kv("Collection", &status.collection_name);
    Output::kv("Chunks", &status.chunk_count.to_string());
    Output::kv("Embedding model", &status.embedding_model);
    Output::kv("Generation model", &status.generation_model);

    if status.sources.is_empty() {
        println!();
        Output::info("No documents indexed yet. Use 'handbook ingest' to add your policies.");
        return Ok(());
    }

    Output::header(&format!("Indexed Documents ({})", status.sources.len()));
    for source in &status.sources {
        let pages = source
            .page_count
            .map(|p| format!(", {} pages", p))
            .unwrap_or_default();
        Output::list_item(&format!(
            "{} [{}] ({} chunks{})",
            source.source_file, source.category, source.chunk_count, pages
        ));
    }
    println!();

    Ok(())
}
