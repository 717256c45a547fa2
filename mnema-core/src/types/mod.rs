//! Common types used across the memory substrate.

mod config;
mod enums;
mod structs;

pub use config::{
    ConsolidationConfig, ContradictionConfig, DecayConfig, ImplicitEdgeConfig, MemoryConfig,
    RetrievalConfig, VectorConfig,
};
pub use enums::{
    ChunkStatus, ChunkType, Confidence, ConflictType, ContradictionAction, DecayFunction, Phase,
    QuestionStatus, RelationshipOrigin, RelationshipType, SkillStatus, SourceKind, TaskStatus,
    WeakenReason,
};
pub use structs::{
    Activity, AgentState, ChunkArchiveEntry, CoherenceWarning, Goal, Orientation, PendingGoal,
    ProgressEntry, Project, Question, RelationshipArchiveEntry, SkillNode, Task, Tick,
};
