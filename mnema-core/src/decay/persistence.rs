//! Persistence scoring: a composite prediction of how likely a chunk is to
//! stay useful, recomputed for active chunks after each decay sweep.
//!
//! `PS = 0.25·F + 0.20·S + 0.25·C + 0.15·R + 0.15·I`

use crate::chunk::Chunk;
use crate::types::{ChunkType, Confidence, SourceKind, Tick};

const W_FREQUENCY: f32 = 0.25;
const W_SALIENCE: f32 = 0.20;
const W_CONNECTION: f32 = 0.25;
const W_RECENCY: f32 = 0.15;
const W_IMPORTANCE: f32 = 0.15;

/// F: access frequency, saturating.
#[must_use]
pub fn frequency_component(access_count: u32) -> f32 {
    1.0 - (-0.3 * access_count as f32).exp()
}

/// S: fixed salience table over type, source, confidence, and tags.
#[must_use]
pub fn salience_component(chunk: &Chunk) -> f32 {
    let type_salience: f32 = match chunk.chunk_type {
        ChunkType::UserInput => 0.30,
        ChunkType::Decision => 0.25,
        ChunkType::Insight => 0.20,
        ChunkType::Research => 0.10,
        ChunkType::Attempt | ChunkType::Resource => 0.05,
    };
    let source_salience: f32 = match chunk.source {
        SourceKind::User => 0.20,
        SourceKind::Experiment => 0.15,
        SourceKind::Deduction => 0.10,
        SourceKind::Research => 0.0,
    };
    let confidence_salience: f32 = match chunk.confidence {
        Confidence::Verified => 0.15,
        Confidence::Inferred => 0.05,
        Confidence::Speculative => 0.0,
    };
    let tag_salience: f32 = if chunk.has_tag_containing("goal") || chunk.has_tag_containing("priority") {
        0.10
    } else {
        0.0
    };

    (type_salience + source_salience + confidence_salience + tag_salience).clamp(0.0, 1.0)
}

/// C: connectedness, saturating at 20 edges.
#[must_use]
pub fn connection_component(edge_count: usize) -> f32 {
    (edge_count as f32 / 20.0).min(1.0)
}

/// R: tick-based recency of last access; never-accessed chunks score 0.
#[must_use]
pub fn recency_component(chunk: &Chunk, current_tick: Tick) -> f32 {
    match chunk.ticks_since_access(current_tick) {
        Some(ticks) => (-(ticks as f32) / 100.0).exp(),
        None => 0.0,
    }
}

/// I: intrinsic importance from pins, type, and marker tags.
#[must_use]
pub fn importance_component(chunk: &Chunk) -> f32 {
    if chunk.pinned || chunk.chunk_type == ChunkType::UserInput {
        1.0
    } else if chunk.chunk_type == ChunkType::Decision {
        0.8
    } else if chunk.has_tag_containing("pinned") {
        1.0
    } else if chunk.has_tag_containing("core") {
        0.9
    } else if chunk.has_tag_containing("important") {
        0.7
    } else {
        0.0
    }
}

/// The full persistence score, in `[0, 1]`.
#[must_use]
pub fn persistence_score(chunk: &Chunk, edge_count: usize, current_tick: Tick) -> f32 {
    let score = W_FREQUENCY * frequency_component(chunk.access_count)
        + W_SALIENCE * salience_component(chunk)
        + W_CONNECTION * connection_component(edge_count)
        + W_RECENCY * recency_component(chunk, current_tick)
        + W_IMPORTANCE * importance_component(chunk);
    score.clamp(0.0, 1.0)
}
