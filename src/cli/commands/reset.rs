//! Reset command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Assistant;
use anyhow::Result;
use console::style;
use std::io::{self, Write};

/// Run the reset command.
pub async fn run_reset(yes: bool, settings: Settings) -> Result<()> {
    let assistant = Assistant::new(settings).await?;
    let collection = assistant.settings().vector_store.collection_name.clone();

    if !yes && !prompt_confirm(&format!("Delete every chunk in '{}'?", collection))? {
        Output::info("Reset cancelled.");
        return Ok(());
    }

    if assistant.reset().await {
        Output::success(&format!("Collection '{}' cleared.", collection));
        Ok(())
    } else {
        Output::error("Failed to reset the knowledge base. Run with -v for details.");
        anyhow::bail!("reset failed")
    }
}

fn prompt_confirm(message: &str) -> io::Result<bool> {
    print!("{} {} ", style("?").cyan(), message);
    print!("{} ", style("[y/N]").dim());
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    Ok(is_yes(&input))
}

fn is_yes(input: &str) -> bool {
    matches!(input.trim().to_lowercase().as_str(), "y" | "yes")
}
