//! Executor contract: the shape of results the external execution harness
//! hands back to the memory engine.
//!
//! The engine never executes tasks itself. It hands a task, the orientation,
//! and retrieved context to the executor capability and consumes the
//! structured result: learnings become chunks, blockage becomes a question,
//! research requests become new tasks, failures become failure state.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::retrieval::RetrievedChunk;
use crate::types::{ChunkType, Confidence, Orientation, SourceKind, Task};

/// How a task execution ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskResultStatus {
    Complete,
    Blocked,
    NeedsResearch,
    /// Ran out of turn budget; a normal outcome, not an error.
    Partial,
    Failed,
}

/// One learning emitted by the executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Learning {
    pub content: String,
    #[serde(rename = "type")]
    pub chunk_type: ChunkType,
    #[serde(default)]
    pub tags: Vec<String>,
    pub confidence: Confidence,
}

impl Learning {
    /// Source attribution per learning type: research output keeps its
    /// research provenance, everything else counts as deduction.
    #[must_use]
    pub fn source(&self) -> SourceKind {
        match self.chunk_type {
            ChunkType::Research | ChunkType::Resource => SourceKind::Research,
            _ => SourceKind::Deduction,
        }
    }
}

/// Structured result of one task execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub status: TaskResultStatus,
    #[serde(default)]
    pub outcome: Option<String>,
    #[serde(default)]
    pub learnings: Vec<Learning>,
    /// Blocking clarification, for `Blocked` results.
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub question_context: Option<String>,
    /// New research task, for `NeedsResearch` results.
    #[serde(default)]
    pub research_topic: Option<String>,
    #[serde(default)]
    pub research_description: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub failure_context: Option<serde_json::Value>,
}

impl TaskResult {
    /// A bare completed result.
    #[must_use]
    pub fn complete(outcome: impl Into<String>) -> Self {
        Self {
            status: TaskResultStatus::Complete,
            outcome: Some(outcome.into()),
            learnings: Vec::new(),
            question: None,
            question_context: None,
            research_topic: None,
            research_description: None,
            error: None,
            failure_context: None,
        }
    }

    /// Attach learnings.
    #[must_use]
    pub fn with_learnings(mut self, learnings: Vec<Learning>) -> Self {
        self.learnings = learnings;
        self
    }
}

/// The task-execution capability the agent loop plugs in.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(
        &self,
        task: &Task,
        orientation: Option<&Orientation>,
        retrieved_context: &[RetrievedChunk],
    ) -> Result<TaskResult>;
}
