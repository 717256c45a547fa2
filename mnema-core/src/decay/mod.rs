//! Decay engine: forgetting curves, status transitions, tombstone
//! archiving, persistence rescoring, and reactivation.
//!
//! Runs at tick boundaries, gated by the tick clock. Idempotent: the sweep
//! takes Δ from `(current_tick, last_decay_tick)` and the clock advances
//! `last_decay_tick` when the sweep commits, so a rerun sees Δ = 0 and
//! changes nothing.

mod persistence;

pub use persistence::{
    connection_component, frequency_component, importance_component, persistence_score,
    recency_component, salience_component,
};

use chrono::Utc;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::chunk::{category_multiplier, status_for_strength, Chunk};
use crate::error::Result;
use crate::events::{EventBus, MemoryEvent};
use crate::index::{Bm25Index, VectorIndex};
use crate::storage::StorageBackend;
use crate::types::{ChunkArchiveEntry, ChunkStatus, DecayFunction, Tick};

/// Maximum characters kept in a tombstone's archive summary.
const ARCHIVE_SUMMARY_CHARS: usize = 200;

/// Result of one decay sweep.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DecayOutcome {
    pub processed: usize,
    pub tombstoned: usize,
    pub avg_strength: f32,
}

/// Apply one chunk's forgetting curve over `delta` ticks.
///
/// The recency factor halves the effective rate for chunks touched this
/// instant and fades back to 1 as the last access recedes.
#[must_use]
pub fn decayed_strength(chunk: &Chunk, current_tick: Tick, delta: Tick) -> f32 {
    if delta == 0 || !chunk.decays() {
        return chunk.current_strength;
    }

    let recency_factor = match chunk.ticks_since_access(current_tick) {
        Some(ticks) => 1.0 - 0.5 * (-(ticks as f32) / 50.0).exp(),
        None => 1.0,
    };
    let lambda_eff = chunk.decay_rate * category_multiplier(chunk) * recency_factor;
    let delta = delta as f32;

    let strength = match chunk.decay_function {
        DecayFunction::Exponential => chunk.current_strength * (-lambda_eff * delta).exp(),
        DecayFunction::Linear => (chunk.current_strength - lambda_eff * delta).max(0.0),
        DecayFunction::PowerLaw => chunk.current_strength * (1.0 + 0.01 * delta).powf(-0.3),
        DecayFunction::None => chunk.current_strength,
    };

    strength.clamp(0.0, 1.0)
}

/// Truncate content to the archive summary budget on a char boundary.
fn summarize(content: &str) -> String {
    content.chars().take(ARCHIVE_SUMMARY_CHARS).collect()
}

/// Stable hex digest of the full original content.
#[must_use]
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// The decay and persistence engine for one storage backend.
pub struct DecayEngine {
    storage: Arc<dyn StorageBackend>,
    vector_index: Arc<VectorIndex>,
    bm25_index: Arc<Bm25Index>,
    events: EventBus,
}

impl DecayEngine {
    #[must_use]
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        vector_index: Arc<VectorIndex>,
        bm25_index: Arc<Bm25Index>,
        events: EventBus,
    ) -> Self {
        Self {
            storage,
            vector_index,
            bm25_index,
            events,
        }
    }

    /// Run one decay sweep over a project.
    ///
    /// Non-tombstoned decaying chunks lose strength; statuses only demote;
    /// chunks that hit zero are archived and dropped from both indexes.
    /// Persistence scores are recomputed for chunks still active afterwards.
    pub async fn run(
        &self,
        project_id: Uuid,
        current_tick: Tick,
        last_decay_tick: Tick,
    ) -> Result<DecayOutcome> {
        let delta = current_tick.saturating_sub(last_decay_tick);
        let chunks = self.storage.list_chunks(project_id).await?;

        let mut updated = Vec::new();
        let mut tombstoned = 0usize;
        let mut processed = 0usize;
        let mut strength_sum = 0.0f32;

        for mut chunk in chunks {
            if chunk.status.is_terminal() {
                continue;
            }
            if !chunk.decays() {
                // Pinned and user-input chunks skip the curve but still get
                // their persistence rescored.
                strength_sum += chunk.current_strength;
                processed += 1;
                if chunk.status == ChunkStatus::Active {
                    let edges = self.storage.relationship_count(chunk.id).await?;
                    chunk.persistence_score = persistence_score(&chunk, edges, current_tick);
                    updated.push(chunk);
                }
                continue;
            }

            processed += 1;
            chunk.current_strength = decayed_strength(&chunk, current_tick, delta);

            let computed = status_for_strength(chunk.current_strength);
            // Demote-only: the threshold ladder never promotes during decay.
            if computed > chunk.status {
                chunk.status = computed;
            }

            if chunk.status == ChunkStatus::Tombstone {
                self.tombstone(&mut chunk, current_tick).await?;
                tombstoned += 1;
                continue;
            }

            strength_sum += chunk.current_strength;

            if chunk.status == ChunkStatus::Active {
                let edges = self.storage.relationship_count(chunk.id).await?;
                chunk.persistence_score = persistence_score(&chunk, edges, current_tick);
            }
            updated.push(chunk);
        }

        if !updated.is_empty() {
            self.storage.update_chunks(&updated).await?;
        }

        let live = processed.saturating_sub(tombstoned);
        let avg_strength = if live > 0 {
            strength_sum / live as f32
        } else {
            0.0
        };

        info!(
            project = %project_id,
            processed,
            tombstoned,
            avg_strength,
            delta,
            "decay sweep complete"
        );
        self.events.publish(MemoryEvent::DecayRun {
            project_id,
            processed,
            tombstoned,
            avg_strength,
        });

        Ok(DecayOutcome {
            processed,
            tombstoned,
            avg_strength,
        })
    }

    /// Archive a chunk whose strength reached zero: one archive row, the
    /// chunk row kept for referential integrity, and both indexes cleared.
    async fn tombstone(&self, chunk: &mut Chunk, current_tick: Tick) -> Result<()> {
        let entry = ChunkArchiveEntry {
            chunk_id: chunk.id,
            project_id: chunk.project_id,
            summary: summarize(&chunk.content),
            content_hash: content_hash(&chunk.content),
            final_strength: chunk.current_strength,
            tick_archived: current_tick,
        };

        chunk.status = ChunkStatus::Tombstone;
        self.storage.archive_chunk(&entry, chunk).await?;

        self.vector_index.remove(chunk.id);
        self.bm25_index.remove(chunk.project_id, chunk.id);

        debug!(chunk = %chunk.id, "chunk tombstoned");
        Ok(())
    }

    /// Record that a chunk was surfaced, optionally that it helped.
    ///
    /// Helpful use boosts strength with diminishing returns, slows the decay
    /// rate, and may re-promote the chunk to active — the one promotion path
    /// in the lifecycle.
    pub async fn reactivate(
        &self,
        chunk: &mut Chunk,
        tick: Tick,
        was_helpful: bool,
    ) -> Result<()> {
        chunk.access_count += 1;
        chunk.tick_last_accessed = Some(tick);
        chunk.last_accessed = Utc::now();

        if was_helpful {
            chunk.successful_uses += 1;
            chunk.tick_last_useful = Some(tick);
            chunk.last_useful = Some(Utc::now());
            chunk.current_strength =
                (chunk.current_strength + 0.2 * (1.0 - chunk.current_strength)).min(1.0);
            if chunk.decay_rate > 0.0 {
                chunk.decay_rate = (chunk.decay_rate * 0.95).max(0.01);
            }
            if chunk.current_strength > 0.4 && chunk.status != ChunkStatus::Tombstone {
                chunk.status = ChunkStatus::Active;
            }
        }

        self.storage.update_chunk(chunk).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::LearningContext;
    use crate::types::{ChunkType, Confidence, Phase, SourceKind};
    use std::collections::BTreeSet;

    fn research_chunk() -> Chunk {
        Chunk::new(
            Uuid::new_v4(),
            "the ii-V-I is the core jazz cadence".to_string(),
            ChunkType::Research,
            BTreeSet::new(),
            Confidence::Verified,
            SourceKind::Research,
            LearningContext::at_tick(0, Phase::Research),
        )
    }

    #[test]
    fn zero_delta_changes_nothing() {
        let chunk = research_chunk();
        assert_eq!(decayed_strength(&chunk, 10, 0), chunk.current_strength);
    }

    #[test]
    fn exponential_decay_shrinks_strength() {
        let chunk = research_chunk();
        // rate 0.05, multiplier 1.0, never accessed so recency factor 1.
        let s = decayed_strength(&chunk, 10, 10);
        let expected = (-0.05_f32 * 10.0).exp();
        assert!((s - expected).abs() < 1e-5);
    }

    #[test]
    fn linear_decay_floors_at_zero() {
        let mut chunk = research_chunk();
        chunk.decay_function = DecayFunction::Linear;
        chunk.decay_rate = 0.02;
        let s = decayed_strength(&chunk, 1000, 1000);
        assert_eq!(s, 0.0);
    }

    #[test]
    fn power_law_decay_is_slow() {
        let mut chunk = research_chunk();
        chunk.decay_function = DecayFunction::PowerLaw;
        let s = decayed_strength(&chunk, 100, 100);
        let expected = (1.0_f32 + 0.01 * 100.0).powf(-0.3);
        assert!((s - expected).abs() < 1e-5);
        assert!(s > 0.5);
    }

    #[test]
    fn recent_access_slows_decay() {
        let mut accessed = research_chunk();
        accessed.tick_last_accessed = Some(100);
        let fresh = decayed_strength(&accessed, 100, 10);

        let untouched = research_chunk();
        let stale = decayed_strength(&untouched, 100, 10);

        assert!(fresh > stale);
    }

    #[test]
    fn decay_is_monotone_nonincreasing() {
        let chunk = research_chunk();
        let mut prev = chunk.current_strength;
        for delta in [1, 2, 5, 10, 50, 200] {
            let s = decayed_strength(&chunk, delta, delta);
            assert!(s <= prev + 1e-6);
            prev = s;
        }
    }

    #[test]
    fn superseded_chunks_decay_three_times_faster() {
        let plain = research_chunk();
        let mut superseded = research_chunk();
        superseded.superseded_by = Some(Uuid::new_v4());

        let s_plain = decayed_strength(&plain, 10, 10);
        let s_superseded = decayed_strength(&superseded, 10, 10);
        let expected = (-0.05_f32 * 3.0 * 10.0).exp();
        assert!((s_superseded - expected).abs() < 1e-5);
        assert!(s_superseded < s_plain);
    }

    #[test]
    fn summary_respects_char_budget() {
        let long = "ü".repeat(500);
        let s = summarize(&long);
        assert_eq!(s.chars().count(), 200);
    }

    #[test]
    fn content_hash_is_stable_and_distinct() {
        let a = content_hash("alpha");
        let b = content_hash("alpha");
        let c = content_hash("beta");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }
}
