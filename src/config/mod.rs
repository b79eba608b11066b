//! Configuration module for Handbook.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{AssistantPrompts, Prompts};
pub use settings::{
    ChunkingSettings, EmbeddingSettings, GeneralSettings, GenerationSettings, MemorySettings,
    OpenAISettings, PromptSettings, RetrievalSettings, Settings, VectorStoreSettings,
};
