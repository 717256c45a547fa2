//! Embedding capability: pluggable providers that turn text into vectors.
//!
//! The engine never talks to a model API directly; it holds an
//! `Arc<dyn EmbeddingProvider>` selected at construction from the enumerated
//! provider set. Rate-limited calls are retried with exponential backoff;
//! all other provider failures surface as [`ProviderError`].

mod mock;
mod provider;
#[cfg(feature = "remote-embeddings")]
mod remote;
mod similarity;

pub use mock::MockProvider;
pub use provider::{
    provider_from_kind, with_retry, EmbeddingProvider, ProviderError, ProviderErrorKind,
    ProviderKind, RetryPolicy,
};
#[cfg(feature = "remote-embeddings")]
pub use remote::{OllamaProvider, OpenAiProvider, VoyageProvider};
pub use similarity::{cosine_similarity, normalize};
