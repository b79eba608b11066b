//! CLI module for Handbook.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Handbook - answers questions about your HR policy documents
///
/// Indexes PDF and text policies into a local vector store and answers
/// questions with citations to the source file and page.
#[derive(Parser, Debug)]
#[command(name = "handbook")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Index every policy document in a directory
    Ingest {
        /// Documents directory (defaults to the configured one)
        dir: Option<PathBuf>,

        /// Re-index files that are already in the knowledge base
        #[arg(short, long)]
        force: bool,
    },

    /// Index a single document, replacing its previous chunks
    Add {
        /// PDF, text or Markdown file
        file: PathBuf,
    },

    /// Rebuild the knowledge base from a directory
    Update {
        /// Documents directory (defaults to the configured one)
        dir: Option<PathBuf>,
    },

    /// Ask a single question
    Ask {
        /// The question to ask
        question: String,

        /// Use maximal marginal relevance retrieval
        #[arg(long)]
        mmr: bool,
    },

    /// Start an interactive conversation
    Chat {
        /// Use maximal marginal relevance retrieval
        #[arg(long)]
        mmr: bool,
    },

    /// Search policy passages without generating an answer
    Search {
        /// Search query
        query: String,

        /// Maximum number of results
        #[arg(short, long, default_value = "5")]
        limit: usize,

        /// Use maximal marginal relevance retrieval
        #[arg(long)]
        mmr: bool,

        /// Only search chunks from this file name
        #[arg(long)]
        file: Option<String>,
    },

    /// Show knowledge base status and indexed documents
    Status,

    /// Delete every indexed chunk
    Reset {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Start HTTP API server for integration with other systems
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },

    /// Check system requirements and configuration
    Doctor,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}
