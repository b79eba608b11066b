//! Ask command implementation.

use super::{require, search_mode};
use crate::cli::preflight::Operation;
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Assistant;
use crate::rag::AnswerResponse;
use anyhow::Result;

/// Run the ask command.
pub async fn run_ask(question: &str, mmr: bool, mut settings: Settings) -> Result<()> {
    require(Operation::Ask)?;

    settings.retrieval.search_mode = search_mode(mmr, &settings);
    let assistant = Assistant::new(settings).await?;
    let mut session = assistant.new_session();

    let spinner = Output::spinner("Searching policies...");
    let response = assistant.answer(&mut session, question, None).await;
    spinner.finish_and_clear();

    print_response(&response);

    if let Some(error) = &response.error {
        anyhow::bail!("{}", error);
    }
    Ok(())
}

/// Print an answer with its warning and cited sources.
pub(super) fn print_response(response: &AnswerResponse) {
    println!("\n{}\n", response.answer);

    if let Some(warning) = &response.warning {
        Output::warning(warning);
    }

    if !response.sources.is_empty() {
        Output::header("Sources");
        for (i, source) in response.sources.iter().enumerate() {
            Output::source(i + 1, source);
        }
        println!();
    }
}
