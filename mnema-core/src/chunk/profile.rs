//! Decay profiles and status thresholds.
//!
//! The profile table decides, from a chunk's type and tags, which forgetting
//! curve it follows and how aggressively. The category multiplier feeds into
//! the effective decay rate at sweep time; superseded chunks get a separate
//! multiplier applied by the chunk store.

use std::collections::BTreeSet;

use crate::types::{ChunkStatus, ChunkType, DecayFunction};

/// Decay parameters derived from chunk origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecayProfile {
    pub function: DecayFunction,
    pub rate: f32,
    pub category_multiplier: f32,
}

/// Multiplier applied on top of the base rate when a chunk has been
/// superseded as current truth.
pub const SUPERSEDED_MULTIPLIER: f32 = 3.0;

fn tags_mark_goal(tags: &BTreeSet<String>) -> bool {
    tags.iter().any(|t| {
        let t = t.to_lowercase();
        t.contains("goal") || t.contains("priority")
    })
}

/// Derive the decay profile for a chunk being created.
///
/// Order matters: user input trumps everything, then decisions, then
/// goal/priority tags, then the per-type rows.
#[must_use]
pub fn decay_profile(chunk_type: ChunkType, tags: &BTreeSet<String>) -> DecayProfile {
    match chunk_type {
        ChunkType::UserInput => DecayProfile {
            function: DecayFunction::None,
            rate: 0.0,
            category_multiplier: 0.0,
        },
        ChunkType::Decision => DecayProfile {
            function: DecayFunction::Linear,
            rate: 0.02,
            category_multiplier: 0.3,
        },
        _ if tags_mark_goal(tags) => DecayProfile {
            function: DecayFunction::Exponential,
            rate: 0.02,
            category_multiplier: 0.4,
        },
        ChunkType::Attempt => DecayProfile {
            function: DecayFunction::Exponential,
            rate: 0.10,
            category_multiplier: 1.5,
        },
        ChunkType::Insight => DecayProfile {
            function: DecayFunction::Exponential,
            rate: 0.05,
            category_multiplier: 0.8,
        },
        ChunkType::Research | ChunkType::Resource => DecayProfile {
            function: DecayFunction::Exponential,
            rate: 0.05,
            category_multiplier: 1.0,
        },
    }
}

/// The category multiplier for an existing chunk, folding in supersession.
#[must_use]
pub fn category_multiplier(chunk: &super::Chunk) -> f32 {
    if chunk.is_superseded() {
        return SUPERSEDED_MULTIPLIER;
    }
    decay_profile(chunk.chunk_type, &chunk.tags).category_multiplier
}

/// Map a post-decay strength to its lifecycle status.
///
/// The ladder only demotes: callers must keep `max(old, new)` semantics on
/// the *status order* by never applying this to promote (reactivation is the
/// one promotion path and goes through the decay engine).
#[must_use]
pub fn status_for_strength(strength: f32) -> ChunkStatus {
    if strength >= 0.30 {
        ChunkStatus::Active
    } else if strength >= 0.15 {
        ChunkStatus::Warm
    } else if strength >= 0.05 {
        ChunkStatus::Cool
    } else if strength > 0.0 {
        ChunkStatus::Cold
    } else {
        ChunkStatus::Tombstone
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn profile_table_rows() {
        let p = decay_profile(ChunkType::UserInput, &tags(&[]));
        assert_eq!(p.function, DecayFunction::None);
        assert_eq!(p.rate, 0.0);
        assert_eq!(p.category_multiplier, 0.0);

        let p = decay_profile(ChunkType::Decision, &tags(&[]));
        assert_eq!(p.function, DecayFunction::Linear);
        assert!((p.rate - 0.02).abs() < f32::EPSILON);
        assert!((p.category_multiplier - 0.3).abs() < f32::EPSILON);

        let p = decay_profile(ChunkType::Research, &tags(&["current-goal"]));
        assert_eq!(p.function, DecayFunction::Exponential);
        assert!((p.rate - 0.02).abs() < f32::EPSILON);
        assert!((p.category_multiplier - 0.4).abs() < f32::EPSILON);

        let p = decay_profile(ChunkType::Attempt, &tags(&[]));
        assert!((p.rate - 0.10).abs() < f32::EPSILON);
        assert!((p.category_multiplier - 1.5).abs() < f32::EPSILON);

        let p = decay_profile(ChunkType::Insight, &tags(&[]));
        assert!((p.rate - 0.05).abs() < f32::EPSILON);
        assert!((p.category_multiplier - 0.8).abs() < f32::EPSILON);

        let p = decay_profile(ChunkType::Research, &tags(&[]));
        assert!((p.category_multiplier - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn decision_wins_over_goal_tag() {
        // Decisions keep the linear profile even when tagged as a goal.
        let p = decay_profile(ChunkType::Decision, &tags(&["goal"]));
        assert_eq!(p.function, DecayFunction::Linear);
        assert!((p.category_multiplier - 0.3).abs() < f32::EPSILON);
    }

    #[test]
    fn status_thresholds() {
        assert_eq!(status_for_strength(1.0), ChunkStatus::Active);
        assert_eq!(status_for_strength(0.30), ChunkStatus::Active);
        assert_eq!(status_for_strength(0.29), ChunkStatus::Warm);
        assert_eq!(status_for_strength(0.15), ChunkStatus::Warm);
        assert_eq!(status_for_strength(0.14), ChunkStatus::Cool);
        assert_eq!(status_for_strength(0.05), ChunkStatus::Cool);
        assert_eq!(status_for_strength(0.01), ChunkStatus::Cold);
        assert_eq!(status_for_strength(0.0), ChunkStatus::Tombstone);
    }
}
