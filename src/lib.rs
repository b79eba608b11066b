//! Handbook - HR policy question answering
//!
//! A local-first assistant that indexes policy documents and answers employee
//! questions with citations to the file and page the answer came from.
//!
//! # Overview
//!
//! Handbook allows you to:
//! - Index PDF, text and Markdown policy documents into a vector store
//! - Ask questions and get grounded answers with cited sources
//! - Keep multi-turn conversations per session
//! - Search policy passages by similarity or maximal marginal relevance
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Configuration and prompt templates
//! - `document` - PDF and text loading
//! - `chunking` - Recursive character chunking
//! - `embedding` - Embedding generation
//! - `vector_store` - Vector database abstraction
//! - `generation` - Chat completion backend
//! - `rag` - Retrieval, context packing, memory and the answer pipeline
//! - `orchestrator` - The `Assistant` that ties everything together
//!
//! # Example
//!
//! ```rust,no_run
//! use handbook::config::Settings;
//! use handbook::orchestrator::Assistant;
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let assistant = Assistant::new(settings).await?;
//!
//!     let report = assistant.initialize(Path::new("./documents"), false).await?;
//!     println!("Indexed {} chunks", report.chunk_count);
//!
//!     let mut session = assistant.new_session();
//!     let response = assistant
//!         .answer(&mut session, "How many vacation days do I get?", None)
//!         .await;
//!     println!("{}", response.answer);
//!
//!     Ok(())
//! }
//! ```

pub mod chunking;
pub mod cli;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod openai;
pub mod orchestrator;
pub mod rag;
pub mod vector_store;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{HandbookError, Result};
