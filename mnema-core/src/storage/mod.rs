//! Storage abstraction.
//!
//! One trait for durable backends. Multi-entity operations that must be
//! atomic (supersede, question answering, decay batches, orientation saves,
//! tombstone archiving) are trait methods of their own so a backend can run
//! them in a single transaction; callers never see a partial write.

use async_trait::async_trait;
use uuid::Uuid;

use crate::chunk::Chunk;
use crate::error::Result;
use crate::graph::{CoRetrievalRecord, Direction, Relationship};
use crate::index::VectorEntry;
use crate::types::{
    Activity, AgentState, ChunkArchiveEntry, CoherenceWarning, Goal, Orientation, PendingGoal,
    Project, Question, QuestionStatus, RelationshipArchiveEntry, RelationshipType, Task,
    TaskStatus, Tick,
};

/// Row counts exposed for dashboards and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StorageStatistics {
    pub chunk_count: usize,
    pub relationship_count: usize,
    pub task_count: usize,
    pub question_count: usize,
    pub tombstone_count: usize,
}

/// Unified durable-storage trait.
///
/// All operations are async. Implementations must enforce foreign keys and
/// run the composite methods transactionally.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    // ========== Projects ==========

    async fn create_project(&self, project: &Project) -> Result<()>;

    async fn get_project(&self, id: Uuid) -> Result<Option<Project>>;

    /// Delete a project and everything it owns.
    async fn delete_project(&self, id: Uuid) -> Result<()>;

    // ========== Orientation ==========

    async fn get_orientation(&self, project_id: Uuid) -> Result<Option<Orientation>>;

    /// Replace the orientation, archiving the prior version as a chunk.
    ///
    /// `archive_chunk` is the prior orientation serialized as a `decision`
    /// chunk; `None` on first save. Runs in one transaction.
    async fn save_orientation(
        &self,
        orientation: &Orientation,
        archive_chunk: Option<&Chunk>,
    ) -> Result<()>;

    // ========== Chunks ==========

    /// Insert a chunk and, when present, its embedding row. One transaction.
    async fn insert_chunk(&self, chunk: &Chunk, embedding: Option<&[f32]>) -> Result<()>;

    /// Insert a new chunk while atomically marking an existing chunk as
    /// superseded and recording the contradicts edge. One transaction.
    async fn insert_chunk_superseding(
        &self,
        chunk: &Chunk,
        embedding: Option<&[f32]>,
        superseded: &Chunk,
        edge: &Relationship,
    ) -> Result<()>;

    async fn get_chunk(&self, id: Uuid) -> Result<Option<Chunk>>;

    /// Fetch many chunks; missing ids are skipped.
    async fn get_chunks(&self, ids: &[Uuid]) -> Result<Vec<Chunk>>;

    async fn update_chunk(&self, chunk: &Chunk) -> Result<()>;

    /// Batch update written in one transaction (decay sweeps).
    async fn update_chunks(&self, chunks: &[Chunk]) -> Result<()>;

    /// Every chunk of a project, tombstones included.
    async fn list_chunks(&self, project_id: Uuid) -> Result<Vec<Chunk>>;

    /// Non-tombstoned chunks carrying the tag.
    async fn list_chunks_by_tag(&self, project_id: Uuid, tag: &str) -> Result<Vec<Chunk>>;

    /// Chunks written while the embedding provider was down.
    async fn list_chunks_pending_embedding(&self, project_id: Uuid) -> Result<Vec<Chunk>>;

    /// Tombstone transition: write the archive row, persist the updated
    /// chunk row, and delete the embedding row. One transaction.
    async fn archive_chunk(&self, entry: &ChunkArchiveEntry, chunk: &Chunk) -> Result<()>;

    async fn get_chunk_archive(&self, chunk_id: Uuid) -> Result<Option<ChunkArchiveEntry>>;

    // ========== Embeddings ==========

    /// Upsert an embedding row and clear the chunk's pending flag.
    async fn store_embedding(&self, chunk_id: Uuid, vector: &[f32]) -> Result<()>;

    async fn get_embedding(&self, chunk_id: Uuid) -> Result<Option<Vec<f32>>>;

    /// All persisted embeddings, for index rebuild at startup.
    async fn load_all_embeddings(&self) -> Result<Vec<VectorEntry>>;

    // ========== Relationships ==========

    async fn get_relationship(
        &self,
        from: Uuid,
        to: Uuid,
        relationship_type: RelationshipType,
    ) -> Result<Option<Relationship>>;

    async fn insert_relationship(&self, relationship: &Relationship) -> Result<()>;

    async fn update_relationship(&self, relationship: &Relationship) -> Result<()>;

    /// Edges touching a chunk, filtered and ranked by weight descending.
    async fn get_relationships(
        &self,
        chunk_id: Uuid,
        relationship_type: Option<RelationshipType>,
        min_weight: f32,
        direction: Direction,
        limit: usize,
    ) -> Result<Vec<Relationship>>;

    /// Count of live edges touching a chunk in either direction.
    async fn relationship_count(&self, chunk_id: Uuid) -> Result<usize>;

    /// Move an edge to the archive and delete the live row. One transaction.
    async fn archive_relationship(
        &self,
        entry: &RelationshipArchiveEntry,
        relationship_id: Uuid,
    ) -> Result<()>;

    // ========== Co-retrieval ==========

    /// Append co-retrieval observations as a single batch.
    async fn record_coretrievals(&self, records: &[CoRetrievalRecord]) -> Result<()>;

    /// Unordered pairs with observation counts at or above `min_count`.
    async fn coretrieval_pair_counts(
        &self,
        project_id: Uuid,
        min_count: u32,
    ) -> Result<Vec<(Uuid, Uuid, u32)>>;

    /// Drop co-retrieval rows observed before the given tick. Returns the
    /// number of rows removed.
    async fn cleanup_coretrieval(&self, project_id: Uuid, older_than_tick: Tick) -> Result<u64>;

    // ========== Tasks ==========

    async fn insert_task(&self, task: &Task) -> Result<()>;

    async fn get_task(&self, id: Uuid) -> Result<Option<Task>>;

    async fn update_task(&self, task: &Task) -> Result<()>;

    /// Update a completed/answered trigger and every task it unblocks in
    /// one transaction.
    async fn update_tasks(&self, tasks: &[Task]) -> Result<()>;

    async fn list_tasks(&self, project_id: Uuid, status: Option<TaskStatus>) -> Result<Vec<Task>>;

    // ========== Questions ==========

    async fn insert_question(&self, question: &Question) -> Result<()>;

    async fn get_question(&self, id: Uuid) -> Result<Option<Question>>;

    /// Persist the answered question and the tasks it released in one
    /// transaction.
    async fn answer_question(&self, question: &Question, updated_tasks: &[Task]) -> Result<()>;

    async fn list_questions(
        &self,
        project_id: Uuid,
        status: Option<QuestionStatus>,
    ) -> Result<Vec<Question>>;

    // ========== Goals ==========

    /// Activate a goal, completing the prior active goal if one exists.
    /// One transaction.
    async fn set_goal(&self, goal: &Goal, completed_prior: Option<&Goal>) -> Result<()>;

    async fn get_active_goal(&self, project_id: Uuid) -> Result<Option<Goal>>;

    async fn get_goal(&self, id: Uuid) -> Result<Option<Goal>>;

    async fn set_pending_goal(&self, pending: &PendingGoal) -> Result<()>;

    /// Remove and return the pending goal, if any.
    async fn take_pending_goal(&self, project_id: Uuid) -> Result<Option<PendingGoal>>;

    // ========== Activity log ==========

    async fn log_activity(&self, activity: &Activity) -> Result<()>;

    /// Most recent activities, newest first.
    async fn recent_activities(&self, project_id: Uuid, limit: usize) -> Result<Vec<Activity>>;

    // ========== Coherence warnings ==========

    async fn insert_coherence_warning(&self, warning: &CoherenceWarning) -> Result<()>;

    async fn list_coherence_warnings(&self, project_id: Uuid) -> Result<Vec<CoherenceWarning>>;

    // ========== Agent state ==========

    async fn get_agent_state(&self, project_id: Uuid) -> Result<Option<AgentState>>;

    async fn save_agent_state(&self, state: &AgentState) -> Result<()>;

    // ========== Diagnostics ==========

    async fn statistics(&self, project_id: Uuid) -> Result<StorageStatistics>;

    async fn health_check(&self) -> Result<bool>;
}
