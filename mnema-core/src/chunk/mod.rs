//! The chunk: one piece of stored knowledge with content, metadata,
//! strength, and the context it was learned in.

mod profile;

pub use profile::{category_multiplier, decay_profile, status_for_strength, DecayProfile};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::types::{ChunkStatus, ChunkType, Confidence, DecayFunction, Phase, SourceKind, Tick};

/// Situational metadata captured when a chunk is created.
///
/// Matched against [`RetrievalContext`] at query time for context boosting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningContext {
    pub tick: Tick,
    #[serde(default)]
    pub task_id: Option<Uuid>,
    #[serde(default)]
    pub goal_id: Option<Uuid>,
    pub phase: Phase,
    #[serde(default)]
    pub skill_area: Option<String>,
    #[serde(default)]
    pub query_context: Option<String>,
    #[serde(default)]
    pub related_chunks: Vec<Uuid>,
}

impl LearningContext {
    /// Bare context for writes that happen outside a cycle.
    #[must_use]
    pub fn at_tick(tick: Tick, phase: Phase) -> Self {
        Self {
            tick,
            task_id: None,
            goal_id: None,
            phase,
            skill_area: None,
            query_context: None,
            related_chunks: Vec::new(),
        }
    }
}

/// The analogous metadata presented at query time.
///
/// Every field except the query is optional: only supplied fields are
/// compared against a chunk's learning context, so a bare query gets no
/// context boost at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalContext {
    pub tick: Tick,
    #[serde(default)]
    pub task_id: Option<Uuid>,
    #[serde(default)]
    pub goal_id: Option<Uuid>,
    #[serde(default)]
    pub phase: Option<Phase>,
    #[serde(default)]
    pub skill_area: Option<String>,
    pub query_text: String,
}

impl RetrievalContext {
    /// Context carrying only the query text, for out-of-cycle lookups.
    #[must_use]
    pub fn bare(tick: Tick, query_text: impl Into<String>) -> Self {
        Self {
            tick,
            task_id: None,
            goal_id: None,
            phase: None,
            skill_area: None,
            query_text: query_text.into(),
        }
    }
}

/// One unit of stored knowledge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    // Identity
    pub id: Uuid,
    pub project_id: Uuid,
    pub content: String,
    pub chunk_type: ChunkType,
    pub tags: BTreeSet<String>,
    pub confidence: Confidence,
    pub source: SourceKind,

    // Wall-clock audit trail. Never consulted by scoring.
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub last_useful: Option<DateTime<Utc>>,

    // Cognitive time, the only inputs to decay and recency.
    pub tick_created: Tick,
    pub tick_last_accessed: Option<Tick>,
    pub tick_last_useful: Option<Tick>,

    pub learning_context: LearningContext,

    // Strength block
    pub initial_strength: f32,
    pub current_strength: f32,
    pub decay_function: DecayFunction,
    pub decay_rate: f32,
    pub persistence_score: f32,
    pub access_count: u32,
    pub successful_uses: u32,

    // Lifecycle
    pub status: ChunkStatus,
    pub pinned: bool,
    pub superseded_by: Option<Uuid>,
    pub valid_until_tick: Option<Tick>,
    /// Set when the embedding provider was down at write time; a re-embed
    /// job clears it.
    pub embedding_pending: bool,
}

impl Chunk {
    /// Create a chunk with full strength and the decay profile derived from
    /// its type and tags.
    #[must_use]
    pub fn new(
        project_id: Uuid,
        content: String,
        chunk_type: ChunkType,
        tags: BTreeSet<String>,
        confidence: Confidence,
        source: SourceKind,
        learning_context: LearningContext,
    ) -> Self {
        let now = Utc::now();
        let profile = decay_profile(chunk_type, &tags);
        Self {
            id: Uuid::new_v4(),
            project_id,
            content,
            chunk_type,
            tags,
            confidence,
            source,
            created_at: now,
            last_accessed: now,
            last_useful: None,
            tick_created: learning_context.tick,
            tick_last_accessed: None,
            tick_last_useful: None,
            learning_context,
            initial_strength: 1.0,
            current_strength: 1.0,
            decay_function: profile.function,
            decay_rate: profile.rate,
            persistence_score: 0.5,
            access_count: 0,
            successful_uses: 0,
            status: ChunkStatus::Active,
            pinned: false,
            superseded_by: None,
            valid_until_tick: None,
            embedding_pending: false,
        }
    }

    /// Pin the chunk: pinned chunks never decay.
    pub fn pin(&mut self) {
        self.pinned = true;
        self.decay_function = DecayFunction::None;
        self.decay_rate = 0.0;
    }

    /// Whether the decay sweep should touch this chunk at all.
    #[must_use]
    pub fn decays(&self) -> bool {
        !self.status.is_terminal() && self.decay_function != DecayFunction::None && !self.pinned
    }

    /// Whether this chunk has been replaced as current truth.
    #[must_use]
    pub fn is_superseded(&self) -> bool {
        self.superseded_by.is_some()
    }

    /// Ticks since the chunk was last accessed, if it ever was.
    #[must_use]
    pub fn ticks_since_access(&self, current_tick: Tick) -> Option<Tick> {
        self.tick_last_accessed
            .map(|t| current_tick.saturating_sub(t))
    }

    /// Whether any tag contains the given needle (case-insensitive).
    #[must_use]
    pub fn has_tag_containing(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.tags.iter().any(|t| t.to_lowercase().contains(&needle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make(chunk_type: ChunkType, tags: &[&str]) -> Chunk {
        Chunk::new(
            Uuid::new_v4(),
            "the tritone substitution replaces V7 with bII7".to_string(),
            chunk_type,
            tags.iter().map(|s| (*s).to_string()).collect(),
            Confidence::Verified,
            SourceKind::Research,
            LearningContext::at_tick(3, Phase::Research),
        )
    }

    #[test]
    fn new_chunk_starts_at_full_strength() {
        let chunk = make(ChunkType::Research, &[]);
        assert_eq!(chunk.initial_strength, 1.0);
        assert_eq!(chunk.current_strength, 1.0);
        assert_eq!(chunk.status, ChunkStatus::Active);
        assert_eq!(chunk.persistence_score, 0.5);
        assert_eq!(chunk.tick_created, 3);
        assert!(!chunk.is_superseded());
    }

    #[test]
    fn user_input_never_decays() {
        let chunk = make(ChunkType::UserInput, &[]);
        assert_eq!(chunk.decay_function, DecayFunction::None);
        assert_eq!(chunk.decay_rate, 0.0);
        assert!(!chunk.decays());
    }

    #[test]
    fn pinning_disables_decay() {
        let mut chunk = make(ChunkType::Research, &[]);
        assert!(chunk.decays());
        chunk.pin();
        assert!(!chunk.decays());
        assert_eq!(chunk.decay_function, DecayFunction::None);
    }

    #[test]
    fn tag_matching_is_substring_and_case_insensitive() {
        let chunk = make(ChunkType::Research, &["Current-Goal", "harmony"]);
        assert!(chunk.has_tag_containing("goal"));
        assert!(!chunk.has_tag_containing("priority"));
    }

    #[test]
    fn ticks_since_access_saturates() {
        let mut chunk = make(ChunkType::Research, &[]);
        assert_eq!(chunk.ticks_since_access(10), None);
        chunk.tick_last_accessed = Some(7);
        assert_eq!(chunk.ticks_since_access(10), Some(3));
        assert_eq!(chunk.ticks_since_access(5), Some(0));
    }
}
