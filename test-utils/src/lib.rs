//! # Test Utilities
//!
//! Shared fixtures for the mnema workspace:
//! - Tempdir-backed storage and engine factories
//! - Chunk, task, and context builders with sensible defaults
//! - Embedding helpers with controllable similarity

use std::collections::BTreeSet;
use std::sync::Arc;

use tempfile::TempDir;
use uuid::Uuid;

use mnema_core::chunk::{LearningContext, RetrievalContext};
use mnema_core::embeddings::{normalize, MockProvider};
use mnema_core::engine::MemoryEngine;
use mnema_core::types::{ChunkType, Confidence, MemoryConfig, Phase, SourceKind};
use mnema_storage_turso::TursoStorage;

/// Embedding dimension used across the test suite.
pub const TEST_DIMENSIONS: usize = 64;

/// Install a test-friendly tracing subscriber honoring `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Create a schema-initialized storage backend in a tempdir.
///
/// The `TempDir` must outlive the storage.
pub async fn test_storage() -> (Arc<TursoStorage>, TempDir) {
    let dir = TempDir::new().expect("tempdir");
    let db_path = dir.path().join("mnema-test.db");
    let db = libsql::Builder::new_local(&db_path)
        .build()
        .await
        .expect("local database");
    let storage = TursoStorage::from_database(db);
    storage.initialize_schema().await.expect("schema");
    (Arc::new(storage), dir)
}

/// Create a full engine over tempdir storage and the mock provider.
pub async fn test_engine() -> (MemoryEngine, TempDir) {
    test_engine_with_config(MemoryConfig::default()).await
}

/// Create an engine with a custom configuration.
pub async fn test_engine_with_config(config: MemoryConfig) -> (MemoryEngine, TempDir) {
    let (storage, dir) = test_storage().await;
    let provider = Arc::new(MockProvider::new(TEST_DIMENSIONS));
    let engine = MemoryEngine::open(storage, provider, None, config)
        .await
        .expect("engine open");
    (engine, dir)
}

/// The deterministic mock embedding for a text.
#[must_use]
pub fn embedding_for(text: &str) -> Vec<f32> {
    MockProvider::new(TEST_DIMENSIONS).embedding_for(text)
}

/// A unit vector whose cosine similarity to `base` is approximately
/// `min_sim`.
///
/// Blends the base with a perpendicularized direction; used to build the
/// near-duplicate embeddings contradiction tests need.
#[must_use]
pub fn similar_vector(base: &[f32], min_sim: f32) -> Vec<f32> {
    let alpha = min_sim.clamp(0.0, 1.0);
    let beta = (1.0 - alpha * alpha).sqrt();

    // Gram-Schmidt: take a probe direction, strip its projection on base.
    let mut probe = vec![0.0_f32; base.len()];
    probe[0] = 1.0;
    let dot: f32 = base.iter().zip(probe.iter()).map(|(b, p)| b * p).sum();
    let mut perp: Vec<f32> = probe
        .iter()
        .zip(base.iter())
        .map(|(p, b)| p - dot * b)
        .collect();
    if perp.iter().map(|x| x * x).sum::<f32>() < 1e-6 {
        perp = vec![0.0; base.len()];
        perp[1] = 1.0;
        let dot: f32 = base.iter().zip(perp.iter()).map(|(b, p)| b * p).sum();
        perp = perp
            .iter()
            .zip(base.iter())
            .map(|(p, b)| p - dot * b)
            .collect();
    }
    let perp = normalize(perp);

    let blended: Vec<f32> = base
        .iter()
        .zip(perp.iter())
        .map(|(b, p)| alpha * b + beta * p)
        .collect();
    normalize(blended)
}

/// A learning context with the given tick and research phase.
#[must_use]
pub fn learning_context(tick: u64) -> LearningContext {
    LearningContext::at_tick(tick, Phase::Research)
}

/// A learning context bound to a goal and skill area.
#[must_use]
pub fn goal_context(tick: u64, goal_id: Uuid, skill_area: &str) -> LearningContext {
    LearningContext {
        tick,
        task_id: None,
        goal_id: Some(goal_id),
        phase: Phase::Research,
        skill_area: Some(skill_area.to_string()),
        query_context: None,
        related_chunks: Vec::new(),
    }
}

/// The retrieval-side mirror of [`goal_context`].
#[must_use]
pub fn goal_retrieval_context(
    tick: u64,
    goal_id: Uuid,
    skill_area: &str,
    query: &str,
) -> RetrievalContext {
    RetrievalContext {
        tick,
        task_id: None,
        goal_id: Some(goal_id),
        phase: Some(Phase::Research),
        skill_area: Some(skill_area.to_string()),
        query_text: query.to_string(),
    }
}

/// Standard tag set for chunk fixtures.
#[must_use]
pub fn tags(list: &[&str]) -> BTreeSet<String> {
    list.iter().map(|s| (*s).to_string()).collect()
}

/// Default argument bundle for `store_learning` fixtures.
#[must_use]
pub fn research_defaults() -> (ChunkType, Confidence, SourceKind) {
    (
        ChunkType::Research,
        Confidence::Verified,
        SourceKind::Research,
    )
}
