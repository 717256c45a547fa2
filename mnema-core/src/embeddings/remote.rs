//! HTTP-backed embedding providers (feature `remote-embeddings`).
//!
//! Three wire shapes cover the provider landscape: OpenAI-style
//! (`/v1/embeddings`, bearer auth, batched input), Voyage-style (same shape,
//! different host and field defaults), and Ollama-style (local daemon, one
//! prompt per request). Rate limits are retried here with the shared backoff
//! policy; every other failure surfaces immediately as a tagged error.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::provider::{
    with_retry, EmbeddingProvider, ProviderError, ProviderErrorKind, RetryPolicy,
};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

fn build_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .unwrap_or_default()
}

fn classify_status(status: reqwest::StatusCode, body: &str) -> ProviderError {
    let kind = if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        ProviderErrorKind::RateLimited
    } else if status == reqwest::StatusCode::UNAUTHORIZED
        || status == reqwest::StatusCode::FORBIDDEN
    {
        ProviderErrorKind::Unauthorized
    } else if status.is_client_error() {
        ProviderErrorKind::BadInput
    } else {
        ProviderErrorKind::Network
    };
    ProviderError::new(kind, format!("{status}: {body}"))
}

fn transport_error(err: &reqwest::Error) -> ProviderError {
    ProviderError::new(ProviderErrorKind::Network, err.to_string())
}

#[derive(Serialize)]
struct OpenAiStyleRequest<'a> {
    input: &'a [String],
    model: &'a str,
}

#[derive(Deserialize)]
struct OpenAiStyleResponse {
    data: Vec<OpenAiStyleDatum>,
}

#[derive(Deserialize)]
struct OpenAiStyleDatum {
    index: usize,
    embedding: Vec<f32>,
}

async fn post_openai_style(
    client: &reqwest::Client,
    url: &str,
    api_key: &str,
    model: &str,
    texts: &[String],
) -> Result<Vec<Vec<f32>>, ProviderError> {
    let request = OpenAiStyleRequest {
        input: texts,
        model,
    };

    let response = client
        .post(url)
        .bearer_auth(api_key)
        .json(&request)
        .send()
        .await
        .map_err(|e| transport_error(&e))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(classify_status(status, &body));
    }

    let mut parsed: OpenAiStyleResponse = response
        .json()
        .await
        .map_err(|e| ProviderError::new(ProviderErrorKind::BadInput, e.to_string()))?;

    // The API may reorder; indices restore input order.
    parsed.data.sort_by_key(|d| d.index);
    Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
}

fn dimensions_for_openai_model(model: &str) -> usize {
    match model {
        "text-embedding-3-large" => 3072,
        _ => 1536,
    }
}

/// OpenAI-style embedding provider.
pub struct OpenAiProvider {
    api_key: String,
    model: String,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl OpenAiProvider {
    #[must_use]
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            api_key,
            model,
            client: build_client(),
            retry: RetryPolicy::default(),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let batch = self.embed_batch(std::slice::from_ref(&text.to_string())).await?;
        batch
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::new(ProviderErrorKind::BadInput, "empty response"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        with_retry(self.retry, || {
            post_openai_style(
                &self.client,
                "https://api.openai.com/v1/embeddings",
                &self.api_key,
                &self.model,
                texts,
            )
        })
        .await
    }

    fn name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        dimensions_for_openai_model(&self.model)
    }
}

/// Voyage-style embedding provider. Same wire shape as OpenAI with a
/// different endpoint.
pub struct VoyageProvider {
    api_key: String,
    model: String,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl VoyageProvider {
    #[must_use]
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            api_key,
            model,
            client: build_client(),
            retry: RetryPolicy::default(),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for VoyageProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let batch = self.embed_batch(std::slice::from_ref(&text.to_string())).await?;
        batch
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::new(ProviderErrorKind::BadInput, "empty response"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        with_retry(self.retry, || {
            post_openai_style(
                &self.client,
                "https://api.voyageai.com/v1/embeddings",
                &self.api_key,
                &self.model,
                texts,
            )
        })
        .await
    }

    fn name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        1024
    }
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct OllamaResponse {
    embedding: Vec<f32>,
}

/// Ollama-style provider talking to a local daemon.
pub struct OllamaProvider {
    base_url: String,
    model: String,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl OllamaProvider {
    #[must_use]
    pub fn new(base_url: String, model: String) -> Self {
        Self {
            base_url,
            model,
            client: build_client(),
            retry: RetryPolicy::default(),
        }
    }

    async fn embed_once(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let url = format!("{}/api/embeddings", self.base_url.trim_end_matches('/'));
        let request = OllamaRequest {
            model: &self.model,
            prompt: text,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        let parsed: OllamaResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::new(ProviderErrorKind::BadInput, e.to_string()))?;
        Ok(parsed.embedding)
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        with_retry(self.retry, || self.embed_once(text)).await
    }

    fn name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        // nomic-embed-text and friends; callers with other models pass
        // through the engine's startup dimension check.
        768
    }
}
