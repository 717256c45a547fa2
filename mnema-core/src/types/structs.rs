//! Common entity structs: projects, working state, orientation, agent state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use super::enums::{Phase, QuestionStatus, SkillStatus, TaskStatus};

/// Tick counter type. One tick is one completed agent cycle.
pub type Tick = u64;

/// Top-level container. Owns everything else by cascading deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Project {
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
        }
    }
}

impl Default for Project {
    fn default() -> Self {
        Self::new()
    }
}

/// A work item the agent loop schedules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub project_id: Uuid,
    pub title: String,
    pub description: String,
    pub skill_area: Option<String>,
    pub status: TaskStatus,
    /// Task ids this task waits on; all must reach `Done`.
    pub depends_on: BTreeSet<Uuid>,
    /// Open question ids blocking this task.
    pub blocked_by: BTreeSet<Uuid>,
    pub outcome: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    pub failure_context: Option<serde_json::Value>,
}

impl Task {
    /// Create a new task. Starts `Blocked` when any dependency is named,
    /// because dependency completion is checked against storage by the caller.
    #[must_use]
    pub fn new(
        project_id: Uuid,
        title: String,
        description: String,
        skill_area: Option<String>,
        depends_on: BTreeSet<Uuid>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            project_id,
            title,
            description,
            skill_area,
            status: TaskStatus::Ready,
            depends_on,
            blocked_by: BTreeSet::new(),
            outcome: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
            failed_at: None,
            failure_reason: None,
            failure_context: None,
        }
    }

    /// A task is unblockable when no question holds it and every dependency
    /// in `done_deps` covers its `depends_on` set.
    #[must_use]
    pub fn is_satisfied(&self, done_deps: &BTreeSet<Uuid>) -> bool {
        self.blocked_by.is_empty() && self.depends_on.is_subset(done_deps)
    }
}

/// A clarification that blocks one or more tasks until answered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: Uuid,
    pub project_id: Uuid,
    pub text: String,
    pub context: Option<String>,
    pub status: QuestionStatus,
    pub answer: Option<String>,
    pub blocks_tasks: Vec<Uuid>,
    pub asked_at: DateTime<Utc>,
    pub answered_at: Option<DateTime<Utc>>,
}

impl Question {
    #[must_use]
    pub fn new(
        project_id: Uuid,
        text: String,
        context: Option<String>,
        blocks_tasks: Vec<Uuid>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id,
            text,
            context,
            status: QuestionStatus::Open,
            answer: None,
            blocks_tasks,
            asked_at: Utc::now(),
            answered_at: None,
        }
    }
}

/// An active objective. At most one active goal per project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goal {
    pub id: Uuid,
    pub project_id: Uuid,
    pub goal_text: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub outcome: Option<String>,
}

impl Goal {
    #[must_use]
    pub fn new(project_id: Uuid, goal_text: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id,
            goal_text,
            active: true,
            created_at: Utc::now(),
            completed_at: None,
            outcome: None,
        }
    }
}

/// Single-slot queue of the next goal, applied after the current cycle ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingGoal {
    pub project_id: Uuid,
    pub goal_text: String,
    pub queued_at: DateTime<Utc>,
}

/// One node of the orientation skill map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillNode {
    pub skill: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    pub status: SkillStatus,
    #[serde(default)]
    pub notes: Option<String>,
}

/// One row of the orientation progress snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEntry {
    pub area: String,
    pub status: String,
    #[serde(default)]
    pub percent: Option<u8>,
    #[serde(default)]
    pub blockers: Vec<String>,
}

/// Versioned strategic snapshot. Exactly one per project; replacement
/// archives the prior value as a `decision` chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Orientation {
    pub project_id: Uuid,
    pub vision_summary: String,
    pub success_criteria: Vec<String>,
    pub constraints: Vec<String>,
    pub skill_map: Vec<SkillNode>,
    pub current_phase: Phase,
    pub key_decisions: Vec<String>,
    pub active_priorities: Vec<String>,
    pub progress_snapshot: Vec<ProgressEntry>,
    pub last_rewritten: DateTime<Utc>,
    /// Monotonic; bumped on every save.
    pub version: u64,
}

impl Orientation {
    /// Fresh orientation for a newly created project.
    #[must_use]
    pub fn initial(project_id: Uuid, vision_summary: String) -> Self {
        Self {
            project_id,
            vision_summary,
            success_criteria: Vec::new(),
            constraints: Vec::new(),
            skill_map: Vec::new(),
            current_phase: Phase::Intake,
            key_decisions: Vec::new(),
            active_priorities: Vec::new(),
            progress_snapshot: Vec::new(),
            last_rewritten: Utc::now(),
            version: 1,
        }
    }
}

/// Per-project cognitive-time bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentState {
    pub project_id: Uuid,
    pub current_tick: Tick,
    pub last_decay_tick: Tick,
    pub last_consolidation_tick: Tick,
}

impl AgentState {
    #[must_use]
    pub fn new(project_id: Uuid) -> Self {
        Self {
            project_id,
            current_tick: 0,
            last_decay_tick: 0,
            last_consolidation_tick: 0,
        }
    }
}

/// Append-only activity log row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: Uuid,
    pub project_id: Uuid,
    pub action: String,
    pub details: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl Activity {
    #[must_use]
    pub fn new(project_id: Uuid, action: &str, details: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id,
            action: action.to_string(),
            details,
            timestamp: Utc::now(),
        }
    }
}

/// Archive row written before a chunk transitions to tombstone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkArchiveEntry {
    pub chunk_id: Uuid,
    pub project_id: Uuid,
    /// At most 200 characters of the original content.
    pub summary: String,
    /// SHA-256 of the full original content, hex-encoded.
    pub content_hash: String,
    pub final_strength: f32,
    pub tick_archived: super::structs::Tick,
}

/// Archive row written when an edge falls below the live-weight floor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipArchiveEntry {
    pub relationship_id: Uuid,
    pub project_id: Uuid,
    pub final_weight: f32,
    pub reason: String,
    /// Full serialized edge as it last existed.
    pub original_data: serde_json::Value,
    pub archived_at: DateTime<Utc>,
}

/// A contradiction kept for operator review instead of auto-resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoherenceWarning {
    pub id: Uuid,
    pub project_id: Uuid,
    pub new_chunk_id: Uuid,
    pub existing_chunk_id: Uuid,
    pub confidence: f32,
    pub conflict_type: String,
    pub explanation: String,
    pub created_at: DateTime<Utc>,
}
