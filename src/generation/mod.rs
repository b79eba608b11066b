//! Answer generation backends.

mod openai;

pub use openai::OpenAIGenerator;

use crate::error::Result;
use async_trait::async_trait;

/// Trait for language model backends that turn a prompt pair into an answer.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Complete a system/user prompt pair into answer text.
    async fn complete(&self, system: &str, user: &str) -> Result<String>;

    /// Name of the chat model, reported in status output.
    fn model_name(&self) -> &str;
}
