//! CLI output formatting utilities.

use crate::orchestrator::{IngestReport, SearchHit};
use crate::rag::Source;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// Output helper for CLI formatting.
pub struct Output;

impl Output {
    /// Print an info message.
    pub fn info(msg: &str) {
        println!("{} {}", style(">>").cyan().bold(), msg);
    }

    /// Print a success message.
    pub fn success(msg: &str) {
        println!("{} {}", style(">>").green().bold(), msg);
    }

    /// Print a warning message.
    pub fn warning(msg: &str) {
        eprintln!("{} {}", style(">>").yellow().bold(), msg);
    }

    /// Print an error message.
    pub fn error(msg: &str) {
        eprintln!("{} {}", style(">>").red().bold(), msg);
    }

    /// Print a header.
    pub fn header(msg: &str) {
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print a key-value pair.
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", style(key).dim(), value);
    }

    /// Print a list item.
    pub fn list_item(msg: &str) {
        println!("  {} {}", style("*").cyan(), msg);
    }

    /// Print a cited source under an answer.
    pub fn source(index: usize, source: &Source) {
        println!(
            "\n{} {} (page {})",
            style(format!("[{}]", index)).green(),
            style(&source.file).bold(),
            style(&source.page).cyan()
        );
        println!("   {}", style(content_preview(&source.content_preview, 200)).dim());
    }

    /// Print a search hit.
    pub fn search_result(hit: &SearchHit) {
        println!(
            "\n{} {} @ page {} (score: {:.2})",
            style(">>").green(),
            style(&hit.source_file).bold(),
            style(&hit.page).cyan(),
            hit.score
        );
        println!("   {}", style(&hit.category).dim());
        println!("   {}", content_preview(&hit.content, 200));
    }

    /// Print the summary of an ingestion run.
    pub fn ingest_report(report: &IngestReport) {
        Output::kv("Chunks indexed", &report.chunk_count.to_string());
        Output::kv("Files indexed", &report.source_file_count.to_string());

        if !report.skipped_files.is_empty() {
            Output::kv("Already indexed", &report.skipped_files.len().to_string());
        }

        if !report.failed_files.is_empty() {
            Output::warning(&format!("{} file(s) failed:", report.failed_files.len()));
            for failed in &report.failed_files {
                Output::list_item(&format!("{}: {}", failed.file, failed.reason));
            }
        }
    }

    /// Create a spinner.
    pub fn spinner(msg: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        if let Ok(spinner_style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(spinner_style);
        }
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }
}

/// Flatten newlines and truncate to `max_chars` characters with an ellipsis.
fn content_preview(content: &str, max_chars: usize) -> String {
    let content = content.replace('\n', " ");
    if content.chars().count() <= max_chars {
        content
    } else {
        let truncated: String = content.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}
