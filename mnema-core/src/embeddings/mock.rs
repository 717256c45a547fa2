//! Deterministic mock embedding provider.
//!
//! Hash-seeded and fully offline. The vectors carry no semantics, but the
//! same text always maps to the same unit vector, which is what index,
//! retrieval, and round-trip tests need.

use async_trait::async_trait;

use super::provider::{EmbeddingProvider, ProviderError};
use super::similarity::normalize;

/// Mock provider for tests and offline operation.
pub struct MockProvider {
    dimensions: usize,
}

impl MockProvider {
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    /// Deterministic embedding from the text's hash.
    #[must_use]
    pub fn embedding_for(&self, text: &str) -> Vec<f32> {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let mut seed = hasher.finish();

        let mut embedding = Vec::with_capacity(self.dimensions);
        for _ in 0..self.dimensions {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            let value = ((seed >> 16) as f32) / 32768.0 - 1.0;
            embedding.push(value);
        }

        normalize(embedding)
    }
}

#[async_trait]
impl EmbeddingProvider for MockProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        Ok(self.embedding_for(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        Ok(texts.iter().map(|t| self.embedding_for(t)).collect())
    }

    fn name(&self) -> &str {
        "mock"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::cosine_similarity;

    #[tokio::test]
    async fn same_text_same_vector() {
        let provider = MockProvider::new(64);
        let a = provider.embed("modal interchange").await.unwrap();
        let b = provider.embed("modal interchange").await.unwrap();
        assert_eq!(a, b);
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn different_text_different_vector() {
        let provider = MockProvider::new(64);
        let a = provider.embed("modal interchange").await.unwrap();
        let b = provider.embed("secondary dominants").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn vectors_are_unit_length() {
        let provider = MockProvider::new(128);
        let v = provider.embed("voice leading").await.unwrap();
        assert_eq!(v.len(), 128);
        let mag: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((mag - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn batch_matches_single() {
        let provider = MockProvider::new(32);
        let texts = vec!["a".to_string(), "b".to_string()];
        let batch = provider.embed_batch(&texts).await.unwrap();
        assert_eq!(batch[0], provider.embed("a").await.unwrap());
        assert_eq!(batch[1], provider.embed("b").await.unwrap());
    }
}
