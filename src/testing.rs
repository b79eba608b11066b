//! Deterministic collaborators for tests.

use crate::embedding::Embedder;
use crate::error::{HandbookError, Result};
use crate::generation::GenerationBackend;
use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Bag-of-words embedder: each lowercase word is hashed into one dimension.
pub struct FakeEmbedder {
    dimensions: usize,
    calls: AtomicUsize,
    fail: AtomicBool,
    delay: Option<Duration>,
}

impl FakeEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
            delay: None,
        }
    }

    /// Sleep for `delay` on every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Number of embed/embed_batch calls made.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn vector(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0; self.dimensions];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            v[(hasher.finish() as usize) % self.dimensions] += 1.0;
        }
        v
    }

    async fn check(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(HandbookError::Embedding("embedding service unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Embedder for FakeEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.check().await?;
        Ok(self.vector(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.check().await?;
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        "fake-embedding"
    }
}

/// Generator returning a canned answer and recording every prompt it receives.
pub struct FakeGenerator {
    answer: String,
    prompts: Mutex<Vec<(String, String)>>,
    fail: AtomicBool,
    delay: Option<Duration>,
}

impl FakeGenerator {
    pub fn new(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            prompts: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or(0)
    }

    /// The user prompt of the most recent call.
    pub fn last_user_prompt(&self) -> Option<String> {
        self.prompts
            .lock()
            .ok()
            .and_then(|p| p.last().map(|(_, user)| user.clone()))
    }
}

#[async_trait]
impl GenerationBackend for FakeGenerator {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push((system.to_string(), user.to_string()));
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(HandbookError::Generation("model overloaded".to_string()));
        }
        Ok(self.answer.clone())
    }

    fn model_name(&self) -> &str {
        "fake-chat"
    }
}
