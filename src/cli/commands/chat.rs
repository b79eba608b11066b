//! Interactive chat command.

use super::ask::print_response;
use super::{require, search_mode};
use crate::cli::preflight::Operation;
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Assistant;
use anyhow::Result;
use console::style;
use std::io::{self, BufRead, Write};

/// Run the interactive chat command.
///
/// The whole loop shares one session, so follow-up questions see the
/// earlier exchanges.
pub async fn run_chat(mmr: bool, mut settings: Settings) -> Result<()> {
    require(Operation::Ask)?;

    settings.retrieval.search_mode = search_mode(mmr, &settings);
    let assistant = Assistant::new(settings).await?;
    let mut session = assistant.new_session();

    if !assistant.pipeline().read_state().await.is_initialized {
        Output::warning("The knowledge base is empty. Run 'handbook ingest' first.");
    }

    println!("\n{}", style("Handbook Chat").bold().cyan());
    println!(
        "{}\n",
        style("Ask about your HR policies, or 'exit' to quit. Use 'clear' to reset the conversation.").dim()
    );

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("{} ", style("You:").green().bold());
        stdout.flush()?;

        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            println!();
            break;
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        match ChatCommand::parse(input) {
            ChatCommand::Exit => {
                Output::info("Goodbye!");
                break;
            }
            ChatCommand::Clear => {
                assistant.clear_history(&mut session);
                Output::info("Conversation history cleared.");
            }
            ChatCommand::Question(question) => {
                let spinner = Output::spinner("Thinking...");
                let response = assistant.answer(&mut session, question, None).await;
                spinner.finish_and_clear();

                print!("{}", style("Handbook:").cyan().bold());
                print_response(&response);
            }
        }
    }

    Ok(())
}

/// A line typed at the chat prompt.
#[derive(Debug, PartialEq)]
enum ChatCommand<'a> {
    Exit,
    Clear,
    Question(&'a str),
}

impl<'a> ChatCommand<'a> {
    fn parse(input: &'a str) -> Self {
        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            ChatCommand::Exit
        } else if input.eq_ignore_ascii_case("clear") {
            ChatCommand::Clear
        } else {
            ChatCommand::Question(input)
        }
    }
}
