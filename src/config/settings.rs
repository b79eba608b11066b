//! Configuration settings for Handbook.

use crate::error::{HandbookError, Result};
use crate::rag::SearchMode;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub openai: OpenAISettings,
    pub embedding: EmbeddingSettings,
    pub generation: GenerationSettings,
    pub chunking: ChunkingSettings,
    pub retrieval: RetrievalSettings,
    pub memory: MemorySettings,
    pub vector_store: VectorStoreSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
    /// Directory scanned for policy documents.
    pub documents_dir: String,
    /// Log level used when no `-v` flag is given (trace, debug, info, warn, error).
    pub log_level: String,
}

impl GeneralSettings {
    /// Tracing filter directive for the given `-v` count.
    pub fn log_directive(&self, verbose: u8) -> String {
        let level = match verbose {
            0 => self.log_level.trim().to_lowercase(),
            1 => "info".to_string(),
            2 => "debug".to_string(),
            _ => "trace".to_string(),
        };
        format!("handbook={}", level)
    }
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.handbook".to_string(),
            documents_dir: "./documents".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Connection settings shared by the OpenAI-backed collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAISettings {
    /// Alternative API base (for proxies or compatible servers).
    pub api_base: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout_seconds: u64,
}

impl Default for OpenAISettings {
    fn default() -> Self {
        Self {
            api_base: None,
            timeout_seconds: 60,
        }
    }
}

/// Embedding generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Embedding model to use.
    pub model: String,
    /// Embedding dimensions.
    pub dimensions: u32,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
        }
    }
}

/// Answer generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    /// Chat model used to write answers.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Maximum tokens in a generated answer.
    pub max_tokens: u32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.1,
            max_tokens: 500,
        }
    }
}

/// Text chunking settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Characters shared between adjacent chunks.
    pub chunk_overlap: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

/// Retrieval and context assembly settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Number of chunks retrieved per question.
    pub max_retrieval_docs: usize,
    /// Character budget of the assembled context.
    pub max_context_chars: usize,
    /// Retrieval strategy (similarity, mmr).
    pub search_mode: SearchMode,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            max_retrieval_docs: 4,
            max_context_chars: 4000,
            search_mode: SearchMode::Similarity,
        }
    }
}

/// Conversation memory bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemorySettings {
    /// Exchanges kept per session.
    pub session_bound: usize,
    /// Exchanges kept from a caller-supplied transcript.
    pub request_bound: usize,
    /// Session exchanges injected into the prompt.
    pub prompt_window: usize,
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self {
            session_bound: 10,
            request_bound: 5,
            prompt_window: 3,
        }
    }
}

/// Vector store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreSettings {
    /// Vector store provider (sqlite, memory).
    pub provider: String,
    /// Path to SQLite database (for sqlite provider).
    pub sqlite_path: String,
    /// Name of the collection holding the indexed chunks.
    pub collection_name: String,
}

impl Default for VectorStoreSettings {
    fn default() -> Self {
        Self {
            provider: "sqlite".to_string(),
            sqlite_path: "~/.handbook/vectors.db".to_string(),
            collection_name: "hr_policies".to_string(),
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    ///
    /// Environment overrides are applied on top of the file contents.
    pub fn load_from(path: Option<&PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        let mut settings = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Settings::default()
        };

        settings.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    /// Apply overrides from a key lookup (the process environment in practice).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("OPENAI_MODEL") {
            self.generation.model = v;
        }
        if let Some(v) = lookup("OPENAI_EMBEDDING_MODEL") {
            self.embedding.model = v;
        }
        if let Some(v) = lookup("DOCUMENTS_PATH") {
            self.general.documents_dir = v;
        }
        if let Some(v) = lookup("COLLECTION_NAME") {
            self.vector_store.collection_name = v;
        }
        if let Some(v) = lookup("CHUNK_SIZE") {
            self.chunking.chunk_size = parse_override("CHUNK_SIZE", &v)?;
        }
        if let Some(v) = lookup("CHUNK_OVERLAP") {
            self.chunking.chunk_overlap = parse_override("CHUNK_OVERLAP", &v)?;
        }
        if let Some(v) = lookup("MAX_RETRIEVAL_DOCS") {
            self.retrieval.max_retrieval_docs = parse_override("MAX_RETRIEVAL_DOCS", &v)?;
        }
        if let Some(v) = lookup("TEMPERATURE") {
            self.generation.temperature = parse_override("TEMPERATURE", &v)?;
        }
        if let Some(v) = lookup("MAX_TOKENS") {
            self.generation.max_tokens = parse_override("MAX_TOKENS", &v)?;
        }
        if let Some(v) = lookup("LOG_LEVEL") {
            self.general.log_level = v;
        }
        Ok(())
    }

    /// Check that the settings describe a usable pipeline.
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            return Err(HandbookError::Config("chunking.chunk_size must be positive".to_string()));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(HandbookError::Config(format!(
                "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }
        if self.retrieval.max_retrieval_docs == 0 {
            return Err(HandbookError::Config(
                "retrieval.max_retrieval_docs must be positive".to_string(),
            ));
        }
        if self.memory.session_bound == 0 || self.memory.request_bound == 0 {
            return Err(HandbookError::Config("memory bounds must be positive".to_string()));
        }
        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return Err(HandbookError::Config(format!(
                "generation.temperature must be between 0 and 2, got {}",
                self.generation.temperature
            )));
        }
        Ok(())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| HandbookError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("handbook")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded documents directory path.
    pub fn documents_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.documents_dir)
    }

    /// Get the expanded SQLite database path.
    pub fn sqlite_path(&self) -> PathBuf {
        Self::expand_path(&self.vector_store.sqlite_path)
    }
}

fn parse_override<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| HandbookError::Config(format!("{} has an invalid value: {}", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        assert_eq!(settings.chunking.chunk_size, 1000);
        assert_eq!(settings.chunking.chunk_overlap, 200);
        assert_eq!(settings.retrieval.max_retrieval_docs, 4);
        assert_eq!(settings.retrieval.max_context_chars, 4000);
        assert_eq!(settings.memory.session_bound, 10);
        assert_eq!(settings.memory.request_bound, 5);
        assert!((settings.generation.temperature - 0.1).abs() < f32::EPSILON);
        assert_eq!(settings.generation.max_tokens, 500);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk_size() {
        let mut settings = Settings::default();
        settings.chunking.chunk_overlap = 1000;
        assert!(matches!(settings.validate(), Err(HandbookError::Config(_))));
    }

    #[test]
    fn test_env_style_overrides() {
        let vars: HashMap<&str, &str> = [
            ("CHUNK_SIZE", "500"),
            ("CHUNK_OVERLAP", "50"),
            ("MAX_RETRIEVAL_DOCS", "6"),
            ("TEMPERATURE", "0.3"),
            ("COLLECTION_NAME", "benefits"),
        ]
        .into_iter()
        .collect();

        let mut settings = Settings::default();
        settings
            .apply_overrides(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(settings.chunking.chunk_size, 500);
        assert_eq!(settings.chunking.chunk_overlap, 50);
        assert_eq!(settings.retrieval.max_retrieval_docs, 6);
        assert_eq!(settings.vector_store.collection_name, "benefits");
        assert!((settings.generation.temperature - 0.3).abs() < f32::EPSILON);
    }

    #[test]
    fn test_log_directive_prefers_verbose_flag() {
        let mut settings = Settings::default();
        settings
            .apply_overrides(|k| (k == "LOG_LEVEL").then(|| "DEBUG".to_string()))
            .unwrap();

        assert_eq!(settings.general.log_directive(0), "handbook=debug");
        assert_eq!(settings.general.log_directive(1), "handbook=info");
        assert_eq!(settings.general.log_directive(3), "handbook=trace");
        assert_eq!(Settings::default().general.log_directive(0), "handbook=info");
    }

    #[test]
    fn test_bad_override_is_config_error() {
        let mut settings = Settings::default();
        let result = settings.apply_overrides(|k| (k == "CHUNK_SIZE").then(|| "big".to_string()));
        assert!(matches!(result, Err(HandbookError::Config(_))));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            [retrieval]
            search_mode = "mmr"

            [chunking]
            chunk_size = 800
            "#,
        )
        .unwrap();

        assert_eq!(settings.retrieval.search_mode, SearchMode::Mmr);
        assert_eq!(settings.retrieval.max_retrieval_docs, 4);
        assert_eq!(settings.chunking.chunk_size, 800);
        assert_eq!(settings.chunking.chunk_overlap, 200);
    }
}
