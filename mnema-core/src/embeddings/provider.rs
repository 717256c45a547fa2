//! Embedding provider trait, error taxonomy, and retry helper.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// What went wrong inside a provider, by cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    RateLimited,
    Unauthorized,
    Network,
    BadInput,
    DimensionMismatch,
}

/// Tagged provider failure.
#[derive(Debug, Clone, thiserror::Error)]
#[error("embedding provider error ({kind:?}): {detail}")]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub detail: String,
}

impl ProviderError {
    #[must_use]
    pub fn new(kind: ProviderErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    /// Rate limits and transient network failures are worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            ProviderErrorKind::RateLimited | ProviderErrorKind::Network
        )
    }
}

/// Capability that converts text into vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;

    /// Generate embeddings for multiple texts.
    ///
    /// Default implementation embeds sequentially; HTTP providers override
    /// with a single batched request.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    /// Model name/identifier.
    fn name(&self) -> &str;

    /// Fixed output dimension for this provider.
    fn dimensions(&self) -> usize;
}

/// Backoff policy for retryable provider errors.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
        }
    }
}

/// Run an embedding call, retrying rate-limited and network failures with
/// exponential backoff. Other kinds surface on first occurrence.
pub async fn with_retry<T, F, Fut>(policy: RetryPolicy, mut call: F) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, ProviderError>>,
{
    let mut delay = policy.base_delay;
    let mut attempt = 0;

    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < policy.max_retries => {
                attempt += 1;
                tracing::warn!(
                    kind = ?err.kind,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "embedding call failed, retrying"
                );
                tokio::time::sleep(delay).await;
                delay = std::cmp::min(delay * 2, policy.max_delay);
            }
            Err(err) => return Err(err),
        }
    }
}

/// The enumerated provider set. Selected once at engine construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderKind {
    /// Deterministic hash-seeded provider for tests and offline runs.
    Mock { dimensions: usize },
    #[cfg(feature = "remote-embeddings")]
    OpenAi { api_key: String, model: String },
    #[cfg(feature = "remote-embeddings")]
    Voyage { api_key: String, model: String },
    #[cfg(feature = "remote-embeddings")]
    Ollama { base_url: String, model: String },
}

/// Build a provider from the enumerated set. No globals past startup.
#[must_use]
pub fn provider_from_kind(kind: ProviderKind) -> Arc<dyn EmbeddingProvider> {
    match kind {
        ProviderKind::Mock { dimensions } => Arc::new(super::MockProvider::new(dimensions)),
        #[cfg(feature = "remote-embeddings")]
        ProviderKind::OpenAi { api_key, model } => {
            Arc::new(super::OpenAiProvider::new(api_key, model))
        }
        #[cfg(feature = "remote-embeddings")]
        ProviderKind::Voyage { api_key, model } => {
            Arc::new(super::VoyageProvider::new(api_key, model))
        }
        #[cfg(feature = "remote-embeddings")]
        ProviderKind::Ollama { base_url, model } => {
            Arc::new(super::OllamaProvider::new(base_url, model))
        }
    }
}
