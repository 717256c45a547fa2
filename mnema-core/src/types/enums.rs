//! Enumerations shared across the memory substrate.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of knowledge a chunk carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkType {
    Research,
    Insight,
    Decision,
    Resource,
    Attempt,
    UserInput,
}

impl ChunkType {
    /// Chunk types eligible for contradiction checking on store.
    #[must_use]
    pub fn is_contradictable(self) -> bool {
        matches!(
            self,
            ChunkType::Research | ChunkType::Insight | ChunkType::Decision
        )
    }
}

impl fmt::Display for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChunkType::Research => "research",
            ChunkType::Insight => "insight",
            ChunkType::Decision => "decision",
            ChunkType::Resource => "resource",
            ChunkType::Attempt => "attempt",
            ChunkType::UserInput => "user_input",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for ChunkType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "research" => Ok(ChunkType::Research),
            "insight" => Ok(ChunkType::Insight),
            "decision" => Ok(ChunkType::Decision),
            "resource" => Ok(ChunkType::Resource),
            "attempt" => Ok(ChunkType::Attempt),
            "user_input" => Ok(ChunkType::UserInput),
            other => Err(format!("unknown chunk type: {other}")),
        }
    }
}

/// How much the system trusts a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Verified,
    Inferred,
    Speculative,
}

impl Confidence {
    /// Multiplier applied to retrieval scores during query planning.
    #[must_use]
    pub fn score_multiplier(self) -> f32 {
        match self {
            Confidence::Verified => 1.0,
            Confidence::Inferred => 0.8,
            Confidence::Speculative => 0.5,
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Confidence::Verified => "verified",
            Confidence::Inferred => "inferred",
            Confidence::Speculative => "speculative",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for Confidence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "verified" => Ok(Confidence::Verified),
            "inferred" => Ok(Confidence::Inferred),
            "speculative" => Ok(Confidence::Speculative),
            other => Err(format!("unknown confidence: {other}")),
        }
    }
}

/// Where a chunk came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Research,
    User,
    Deduction,
    Experiment,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SourceKind::Research => "research",
            SourceKind::User => "user",
            SourceKind::Deduction => "deduction",
            SourceKind::Experiment => "experiment",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "research" => Ok(SourceKind::Research),
            "user" => Ok(SourceKind::User),
            "deduction" => Ok(SourceKind::Deduction),
            "experiment" => Ok(SourceKind::Experiment),
            other => Err(format!("unknown source: {other}")),
        }
    }
}

/// Lifecycle state of a chunk, derived from `current_strength`.
///
/// Decay may only demote; reactivation is the single promotion path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStatus {
    Active,
    Warm,
    Cool,
    Cold,
    Archived,
    Tombstone,
}

impl ChunkStatus {
    /// True for states excluded from retrieval and decay sweeps.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, ChunkStatus::Tombstone)
    }
}

impl fmt::Display for ChunkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChunkStatus::Active => "active",
            ChunkStatus::Warm => "warm",
            ChunkStatus::Cool => "cool",
            ChunkStatus::Cold => "cold",
            ChunkStatus::Archived => "archived",
            ChunkStatus::Tombstone => "tombstone",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for ChunkStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ChunkStatus::Active),
            "warm" => Ok(ChunkStatus::Warm),
            "cool" => Ok(ChunkStatus::Cool),
            "cold" => Ok(ChunkStatus::Cold),
            "archived" => Ok(ChunkStatus::Archived),
            "tombstone" => Ok(ChunkStatus::Tombstone),
            other => Err(format!("unknown chunk status: {other}")),
        }
    }
}

/// Forgetting curve shape applied at decay time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecayFunction {
    Exponential,
    Linear,
    PowerLaw,
    None,
}

impl fmt::Display for DecayFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DecayFunction::Exponential => "exponential",
            DecayFunction::Linear => "linear",
            DecayFunction::PowerLaw => "power_law",
            DecayFunction::None => "none",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for DecayFunction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exponential" => Ok(DecayFunction::Exponential),
            "linear" => Ok(DecayFunction::Linear),
            "power_law" => Ok(DecayFunction::PowerLaw),
            "none" => Ok(DecayFunction::None),
            other => Err(format!("unknown decay function: {other}")),
        }
    }
}

/// Typed edge between two chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipType {
    Supports,
    Contradicts,
    BuildsOn,
    Replaces,
    Requires,
    RelatedTo,
}

impl fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RelationshipType::Supports => "supports",
            RelationshipType::Contradicts => "contradicts",
            RelationshipType::BuildsOn => "builds_on",
            RelationshipType::Replaces => "replaces",
            RelationshipType::Requires => "requires",
            RelationshipType::RelatedTo => "related_to",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for RelationshipType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "supports" => Ok(RelationshipType::Supports),
            "contradicts" => Ok(RelationshipType::Contradicts),
            "builds_on" => Ok(RelationshipType::BuildsOn),
            "replaces" => Ok(RelationshipType::Replaces),
            "requires" => Ok(RelationshipType::Requires),
            "related_to" => Ok(RelationshipType::RelatedTo),
            other => Err(format!("unknown relationship type: {other}")),
        }
    }
}

/// Whether an edge was asserted or promoted from co-retrieval observations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipOrigin {
    Explicit,
    Implicit,
}

impl fmt::Display for RelationshipOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelationshipOrigin::Explicit => f.write_str("explicit"),
            RelationshipOrigin::Implicit => f.write_str("implicit"),
        }
    }
}

impl std::str::FromStr for RelationshipOrigin {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "explicit" => Ok(RelationshipOrigin::Explicit),
            "implicit" => Ok(RelationshipOrigin::Implicit),
            other => Err(format!("unknown relationship origin: {other}")),
        }
    }
}

/// Reason an edge was archived after its weight fell below the floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeakenReason {
    Contradicted,
    Replaced,
    Manual,
}

impl fmt::Display for WeakenReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeakenReason::Contradicted => f.write_str("contradicted"),
            WeakenReason::Replaced => f.write_str("replaced"),
            WeakenReason::Manual => f.write_str("manual"),
        }
    }
}

/// Work item lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Ready,
    InProgress,
    Blocked,
    Done,
    Cancelled,
    Failed,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Ready => "ready",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Blocked => "blocked",
            TaskStatus::Done => "done",
            TaskStatus::Cancelled => "cancelled",
            TaskStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ready" => Ok(TaskStatus::Ready),
            "in_progress" => Ok(TaskStatus::InProgress),
            "blocked" => Ok(TaskStatus::Blocked),
            "done" => Ok(TaskStatus::Done),
            "cancelled" => Ok(TaskStatus::Cancelled),
            "failed" => Ok(TaskStatus::Failed),
            other => Err(format!("unknown task status: {other}")),
        }
    }
}

/// Blocking-question lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionStatus {
    Open,
    Answered,
}

impl fmt::Display for QuestionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuestionStatus::Open => f.write_str("open"),
            QuestionStatus::Answered => f.write_str("answered"),
        }
    }
}

impl std::str::FromStr for QuestionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(QuestionStatus::Open),
            "answered" => Ok(QuestionStatus::Answered),
            other => Err(format!("unknown question status: {other}")),
        }
    }
}

/// Project phase recorded in the orientation snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Intake,
    Research,
    Planning,
    Execution,
    Refinement,
    Complete,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Intake => "intake",
            Phase::Research => "research",
            Phase::Planning => "planning",
            Phase::Execution => "execution",
            Phase::Refinement => "refinement",
            Phase::Complete => "complete",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "intake" => Ok(Phase::Intake),
            "research" => Ok(Phase::Research),
            "planning" => Ok(Phase::Planning),
            "execution" => Ok(Phase::Execution),
            "refinement" => Ok(Phase::Refinement),
            "complete" => Ok(Phase::Complete),
            other => Err(format!("unknown phase: {other}")),
        }
    }
}

/// Progress state of one skill-map node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillStatus {
    NotStarted,
    InProgress,
    Achieved,
}

/// How a detected contradiction relates two chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    /// The two statements cannot both hold.
    Direct,
    /// The new statement supersedes the old one in time.
    Temporal,
    /// The statements conflict only in part.
    Partial,
}

impl fmt::Display for ConflictType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictType::Direct => f.write_str("direct"),
            ConflictType::Temporal => f.write_str("temporal"),
            ConflictType::Partial => f.write_str("partial"),
        }
    }
}

/// What the contradiction detector recommends the writer do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContradictionAction {
    /// Replace the existing chunk as current truth.
    Supersede,
    /// Keep both, record a warning for operator review.
    FlagForReview,
    /// Keep both, nothing remarkable.
    Store,
}
