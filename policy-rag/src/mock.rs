//! Deterministic offline stand-ins for the embedding provider and the
//! language model.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::llm::LanguageModel;

/// Embeds text as a normalized bag of hashed, lowercased words.
///
/// Texts sharing words get a positive cosine similarity; identical texts
/// get identical vectors.
#[derive(Debug)]
pub struct HashEmbeddingProvider {
    dimensions: usize,
    calls: AtomicUsize,
    fail: bool,
}

impl HashEmbeddingProvider {
    /// A provider producing `dimensions`-sized vectors.
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions: dimensions.max(1), calls: AtomicUsize::new(0), fail: false }
    }

    /// A provider whose every call fails with [`RagError::EmbeddingError`].
    pub fn failing(dimensions: usize) -> Self {
        Self { fail: true, ..Self::new(dimensions) }
    }

    /// Number of `embed`/`embed_batch` calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn vector(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for word in text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
            vector[fnv1a(&word.to_lowercase()) as usize % self.dimensions] += 1.0;
        }
        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }

    fn check(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(RagError::EmbeddingError {
                provider: "Hash".to_string(),
                message: "embedding service unavailable".to_string(),
            });
        }
        Ok(())
    }
}

fn fnv1a(word: &str) -> u64 {
    word.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0100_0000_01b3)
    })
}

#[async_trait]
impl EmbeddingProvider for HashEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.check()?;
        Ok(self.vector(text))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.check()?;
        Ok(texts.iter().map(|text| self.vector(text)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "Hash"
    }
}

/// A language model that returns canned replies and records its prompts.
#[derive(Debug)]
pub struct MockLanguageModel {
    replies: Mutex<Vec<Result<String>>>,
    fallback: String,
    prompts: Mutex<Vec<String>>,
}

impl MockLanguageModel {
    /// A model that always answers `reply`.
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            replies: Mutex::new(Vec::new()),
            fallback: reply.into(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Queue a one-off outcome, returned before the fallback reply.
    pub fn push(&self, outcome: Result<String>) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.insert(0, outcome);
        }
    }

    /// The prompts received so far.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LanguageModel for MockLanguageModel {
    async fn complete(&self, prompt: &str) -> Result<String> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        let queued = self.replies.lock().ok().and_then(|mut replies| replies.pop());
        queued.unwrap_or_else(|| Ok(self.fallback.clone()))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vectorstore::cosine_similarity;

    #[tokio::test]
    async fn shared_words_score_higher() {
        let provider = HashEmbeddingProvider::new(64);
        let query = provider.embed("annual deductible").await.unwrap();
        let close = provider.embed("The annual deductible is $500.").await.unwrap();
        let far = provider.embed("Windshield glass repair").await.unwrap();
        assert!(cosine_similarity(&query, &close) > cosine_similarity(&query, &far));
    }

    #[tokio::test]
    async fn queued_replies_come_first_in_order() {
        let model = MockLanguageModel::new("fallback");
        model.push(Ok("first".into()));
        model.push(Ok("second".into()));
        assert_eq!(model.complete("a").await.unwrap(), "first");
        assert_eq!(model.complete("b").await.unwrap(), "second");
        assert_eq!(model.complete("c").await.unwrap(), "fallback");
        assert_eq!(model.prompts(), vec!["a", "b", "c"]);
    }
}
