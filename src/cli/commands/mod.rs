//! CLI command implementations.

mod add;
mod ask;
mod chat;
mod config;
mod doctor;
mod ingest;
mod reset;
mod search;
mod serve;
mod status;
mod update;

pub use add::run_add;
pub use ask::run_ask;
pub use chat::run_chat;
pub use config::run_config;
pub use doctor::run_doctor;
pub use ingest::run_ingest;
pub use reset::run_reset;
pub use search::run_search;
pub use serve::run_serve;
pub use status::run_status;
pub use update::run_update;

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::rag::SearchMode;

/// Run pre-flight checks, pointing at `handbook doctor` on failure.
fn require(operation: Operation) -> anyhow::Result<()> {
    if let Err(e) = preflight::check(operation) {
        Output::error(&e.to_string());
        Output::info("Run 'handbook doctor' for detailed diagnostics.");
        return Err(e.into());
    }
    Ok(())
}

/// `--mmr` wins over the configured search mode.
fn search_mode(mmr: bool, settings: &Settings) -> SearchMode {
    if mmr {
        SearchMode::Mmr
    } else {
        settings.retrieval.search_mode
    }
}
