//! OpenAI embeddings implementation.

use super::Embedder;
use crate::config::Settings;
use crate::error::{HandbookError, Result};
use crate::openai::create_client_with;
use async_openai::config::OpenAIConfig;
use async_openai::types::{CreateEmbeddingRequest, CreateEmbeddingRequestArgs, EmbeddingInput};
use async_openai::Client;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, instrument};

/// Inputs per embeddings request.
const BATCH_SIZE: usize = 100;

/// OpenAI-based embedder.
pub struct OpenAIEmbedder {
    client: Client<OpenAIConfig>,
    model: String,
    dimensions: usize,
}

impl OpenAIEmbedder {
    /// Create an embedder from application settings.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let client = create_client_with(
            settings.openai.api_base.as_deref(),
            Duration::from_secs(settings.openai.timeout_seconds),
        )?;
        Ok(Self::with_client(
            client,
            &settings.embedding.model,
            settings.embedding.dimensions as usize,
        ))
    }

    /// Create an embedder around an existing client.
    pub fn with_client(client: Client<OpenAIConfig>, model: &str, dimensions: usize) -> Self {
        Self {
            client,
            model: model.to_string(),
            dimensions,
        }
    }

    /// Only the `text-embedding-3` family accepts a `dimensions` parameter.
    fn supports_dimensions(&self) -> bool {
        self.model.starts_with("text-embedding-3")
    }

    fn build_request(&self, batch: &[String]) -> Result<CreateEmbeddingRequest> {
        let mut args = CreateEmbeddingRequestArgs::default();
        args.model(&self.model)
            .input(EmbeddingInput::StringArray(batch.to_vec()));
        if self.supports_dimensions() {
            args.dimensions(self.dimensions as u32);
        }
        args.build()
            .map_err(|e| HandbookError::Embedding(format!("Failed to build request: {}", e)))
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    #[instrument(skip(self, text))]
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embeddings = self.embed_batch(&[text.to_string()]).await?;
        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| HandbookError::Embedding("Empty embedding response".to_string()))
    }

    #[instrument(skip(self, texts), fields(count = texts.len()))]
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());

        let mut all_embeddings = Vec::with_capacity(texts.len());

        for batch in texts.chunks(BATCH_SIZE) {
            let request = self.build_request(batch)?;

            let response = self
                .client
                .embeddings()
                .create(request)
                .await
                .map_err(|e| HandbookError::OpenAI(format!("Embedding API error: {}", e)))?;

            if response.data.len() != batch.len() {
                return Err(HandbookError::Embedding(format!(
                    "Expected {} embeddings, got {}",
                    batch.len(),
                    response.data.len()
                )));
            }

            let mut embeddings = response.data;
            embeddings.sort_by_key(|e| e.index);
            all_embeddings.extend(embeddings.into_iter().map(|e| e.embedding));
        }

        debug!("Generated {} embeddings", all_embeddings.len());
        Ok(all_embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
