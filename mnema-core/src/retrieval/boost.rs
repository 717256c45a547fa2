//! Context boosting: rescoring candidates by how closely the situation they
//! were learned in matches the situation asking for them.

use serde::Serialize;

use crate::chunk::{Chunk, RetrievalContext};

const W_GOAL: f32 = 0.35;
const W_SKILL: f32 = 0.25;
const W_TASK: f32 = 0.25;
const W_PHASE: f32 = 0.15;

/// Why a candidate's score was adjusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BoostReason {
    StrongContextMatch,
    ModerateContextMatch,
    /// A decayed chunk resurfaced because its learning context matches the
    /// current situation closely.
    MemoryReactivation,
}

/// Weighted agreement between a chunk's learning context and the retrieval
/// context, in `[0, 1]`.
///
/// Only fields the retrieval context actually supplies are compared; the
/// result is normalized over the weights of those fields. A context that
/// supplies nothing matches nothing.
#[must_use]
pub fn context_match(chunk: &Chunk, context: &RetrievalContext) -> f32 {
    let learned = &chunk.learning_context;
    let mut compared = 0.0_f32;
    let mut matched = 0.0_f32;

    if let Some(goal) = context.goal_id {
        compared += W_GOAL;
        if learned.goal_id == Some(goal) {
            matched += W_GOAL;
        }
    }
    if let Some(skill) = &context.skill_area {
        compared += W_SKILL;
        if learned
            .skill_area
            .as_ref()
            .is_some_and(|s| s.eq_ignore_ascii_case(skill))
        {
            matched += W_SKILL;
        }
    }
    if let Some(task) = context.task_id {
        compared += W_TASK;
        if learned.task_id == Some(task) {
            matched += W_TASK;
        }
    }
    if let Some(phase) = context.phase {
        compared += W_PHASE;
        if learned.phase == phase {
            matched += W_PHASE;
        }
    }

    if compared <= 0.0 {
        return 0.0;
    }
    (matched / compared).clamp(0.0, 1.0)
}

/// A candidate's score after context boosting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoostedScore {
    pub score: f32,
    pub boosted: bool,
    pub reason: Option<BoostReason>,
    pub context_match: f32,
}

/// Apply the boost ladder to one candidate.
///
/// The base is `current_strength · raw_similarity`. Strong matches multiply
/// up to ~1.3×, moderate up to ~1.15×. Memory time travel then lets a
/// well-matched but decayed chunk bypass its weak strength entirely.
#[must_use]
pub fn boost(chunk: &Chunk, context: &RetrievalContext, raw_similarity: f32) -> BoostedScore {
    let m = context_match(chunk, context);
    let base = chunk.current_strength * raw_similarity;

    let (mut score, mut boosted, mut reason) = if m > 0.7 {
        (
            base * (1.0 + 0.6 * (m - 0.5)),
            true,
            Some(BoostReason::StrongContextMatch),
        )
    } else if m > 0.4 {
        (
            base * (1.0 + 0.3 * (m - 0.3)),
            true,
            Some(BoostReason::ModerateContextMatch),
        )
    } else {
        (base, false, None)
    };

    if chunk.current_strength < 0.3 && m > 0.6 {
        let reactivated = m * raw_similarity * 0.7;
        if reactivated > score {
            score = reactivated;
        }
        boosted = true;
        reason = Some(BoostReason::MemoryReactivation);
    }

    BoostedScore {
        score: score.clamp(0.0, 1.0),
        boosted,
        reason,
        context_match: m,
    }
}
