//! `StorageBackend` trait implementation for [`TursoStorage`].

use async_trait::async_trait;
use mnema_core::chunk::Chunk;
use mnema_core::error::Result;
use mnema_core::graph::{CoRetrievalRecord, Direction, Relationship};
use mnema_core::index::VectorEntry;
use mnema_core::storage::{StorageBackend, StorageStatistics};
use mnema_core::types::{
    Activity, AgentState, ChunkArchiveEntry, CoherenceWarning, Goal, Orientation, PendingGoal,
    Project, Question, QuestionStatus, RelationshipArchiveEntry, RelationshipType, Task,
    TaskStatus, Tick,
};
use uuid::Uuid;

use crate::TursoStorage;

#[async_trait]
impl StorageBackend for TursoStorage {
    async fn create_project(&self, project: &Project) -> Result<()> {
        self.create_project(project).await
    }

    async fn get_project(&self, id: Uuid) -> Result<Option<Project>> {
        self.get_project(id).await
    }

    async fn delete_project(&self, id: Uuid) -> Result<()> {
        self.delete_project(id).await
    }

    async fn get_orientation(&self, project_id: Uuid) -> Result<Option<Orientation>> {
        self.get_orientation(project_id).await
    }

    async fn save_orientation(
        &self,
        orientation: &Orientation,
        archive_chunk: Option<&Chunk>,
    ) -> Result<()> {
        self.save_orientation(orientation, archive_chunk).await
    }

    async fn insert_chunk(&self, chunk: &Chunk, embedding: Option<&[f32]>) -> Result<()> {
        self.insert_chunk(chunk, embedding).await
    }

    async fn insert_chunk_superseding(
        &self,
        chunk: &Chunk,
        embedding: Option<&[f32]>,
        superseded: &Chunk,
        edge: &Relationship,
    ) -> Result<()> {
        self.insert_chunk_superseding(chunk, embedding, superseded, edge)
            .await
    }

    async fn get_chunk(&self, id: Uuid) -> Result<Option<Chunk>> {
        self.get_chunk(id).await
    }

    async fn get_chunks(&self, ids: &[Uuid]) -> Result<Vec<Chunk>> {
        self.get_chunks(ids).await
    }

    async fn update_chunk(&self, chunk: &Chunk) -> Result<()> {
        self.update_chunk(chunk).await
    }

    async fn update_chunks(&self, chunks: &[Chunk]) -> Result<()> {
        self.update_chunks(chunks).await
    }

    async fn list_chunks(&self, project_id: Uuid) -> Result<Vec<Chunk>> {
        self.list_chunks(project_id).await
    }

    async fn list_chunks_by_tag(&self, project_id: Uuid, tag: &str) -> Result<Vec<Chunk>> {
        self.list_chunks_by_tag(project_id, tag).await
    }

    async fn list_chunks_pending_embedding(&self, project_id: Uuid) -> Result<Vec<Chunk>> {
        self.list_chunks_pending_embedding(project_id).await
    }

    async fn archive_chunk(&self, entry: &ChunkArchiveEntry, chunk: &Chunk) -> Result<()> {
        self.archive_chunk(entry, chunk).await
    }

    async fn get_chunk_archive(&self, chunk_id: Uuid) -> Result<Option<ChunkArchiveEntry>> {
        self.get_chunk_archive(chunk_id).await
    }

    async fn store_embedding(&self, chunk_id: Uuid, vector: &[f32]) -> Result<()> {
        self.store_embedding(chunk_id, vector).await
    }

    async fn get_embedding(&self, chunk_id: Uuid) -> Result<Option<Vec<f32>>> {
        self.get_embedding(chunk_id).await
    }

    async fn load_all_embeddings(&self) -> Result<Vec<VectorEntry>> {
        self.load_all_embeddings().await
    }

    async fn get_relationship(
        &self,
        from: Uuid,
        to: Uuid,
        relationship_type: RelationshipType,
    ) -> Result<Option<Relationship>> {
        self.get_relationship(from, to, relationship_type).await
    }

    async fn insert_relationship(&self, relationship: &Relationship) -> Result<()> {
        self.insert_relationship(relationship).await
    }

    async fn update_relationship(&self, relationship: &Relationship) -> Result<()> {
        self.update_relationship(relationship).await
    }

    async fn get_relationships(
        &self,
        chunk_id: Uuid,
        relationship_type: Option<RelationshipType>,
        min_weight: f32,
        direction: Direction,
        limit: usize,
    ) -> Result<Vec<Relationship>> {
        self.get_relationships(chunk_id, relationship_type, min_weight, direction, limit)
            .await
    }

    async fn relationship_count(&self, chunk_id: Uuid) -> Result<usize> {
        self.relationship_count(chunk_id).await
    }

    async fn archive_relationship(
        &self,
        entry: &RelationshipArchiveEntry,
        relationship_id: Uuid,
    ) -> Result<()> {
        self.archive_relationship(entry, relationship_id).await
    }

    async fn record_coretrievals(&self, records: &[CoRetrievalRecord]) -> Result<()> {
        self.record_coretrievals(records).await
    }

    async fn coretrieval_pair_counts(
        &self,
        project_id: Uuid,
        min_count: u32,
    ) -> Result<Vec<(Uuid, Uuid, u32)>> {
        self.coretrieval_pair_counts(project_id, min_count).await
    }

    async fn cleanup_coretrieval(&self, project_id: Uuid, older_than_tick: Tick) -> Result<u64> {
        self.cleanup_coretrieval(project_id, older_than_tick).await
    }

    async fn insert_task(&self, task: &Task) -> Result<()> {
        self.insert_task(task).await
    }

    async fn get_task(&self, id: Uuid) -> Result<Option<Task>> {
        self.get_task(id).await
    }

    async fn update_task(&self, task: &Task) -> Result<()> {
        self.update_task(task).await
    }

    async fn update_tasks(&self, tasks: &[Task]) -> Result<()> {
        self.update_tasks(tasks).await
    }

    async fn list_tasks(&self, project_id: Uuid, status: Option<TaskStatus>) -> Result<Vec<Task>> {
        self.list_tasks(project_id, status).await
    }

    async fn insert_question(&self, question: &Question) -> Result<()> {
        self.insert_question(question).await
    }

    async fn get_question(&self, id: Uuid) -> Result<Option<Question>> {
        self.get_question(id).await
    }

    async fn answer_question(&self, question: &Question, updated_tasks: &[Task]) -> Result<()> {
        self.answer_question(question, updated_tasks).await
    }

    async fn list_questions(
        &self,
        project_id: Uuid,
        status: Option<QuestionStatus>,
    ) -> Result<Vec<Question>> {
        self.list_questions(project_id, status).await
    }

    async fn set_goal(&self, goal: &Goal, completed_prior: Option<&Goal>) -> Result<()> {
        self.set_goal(goal, completed_prior).await
    }

    async fn get_active_goal(&self, project_id: Uuid) -> Result<Option<Goal>> {
        self.get_active_goal(project_id).await
    }

    async fn get_goal(&self, id: Uuid) -> Result<Option<Goal>> {
        self.get_goal(id).await
    }

    async fn set_pending_goal(&self, pending: &PendingGoal) -> Result<()> {
        self.set_pending_goal(pending).await
    }

    async fn take_pending_goal(&self, project_id: Uuid) -> Result<Option<PendingGoal>> {
        self.take_pending_goal(project_id).await
    }

    async fn log_activity(&self, activity: &Activity) -> Result<()> {
        self.log_activity(activity).await
    }

    async fn recent_activities(&self, project_id: Uuid, limit: usize) -> Result<Vec<Activity>> {
        self.recent_activities(project_id, limit).await
    }

    async fn insert_coherence_warning(&self, warning: &CoherenceWarning) -> Result<()> {
        self.insert_coherence_warning(warning).await
    }

    async fn list_coherence_warnings(&self, project_id: Uuid) -> Result<Vec<CoherenceWarning>> {
        self.list_coherence_warnings(project_id).await
    }

    async fn get_agent_state(&self, project_id: Uuid) -> Result<Option<AgentState>> {
        self.get_agent_state(project_id).await
    }

    async fn save_agent_state(&self, state: &AgentState) -> Result<()> {
        self.save_agent_state(state).await
    }

    async fn statistics(&self, project_id: Uuid) -> Result<StorageStatistics> {
        self.project_statistics(project_id).await
    }

    async fn health_check(&self) -> Result<bool> {
        self.check_connectivity().await
    }
}
