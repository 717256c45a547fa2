//! Integration tests against a tempdir-local database.

#![allow(clippy::unwrap_used)]

use std::collections::BTreeSet;

use chrono::Utc;
use mnema_core::chunk::{Chunk, LearningContext};
use mnema_core::graph::{CoRetrievalRecord, Direction, Relationship};
use mnema_core::types::{
    Activity, AgentState, ChunkArchiveEntry, ChunkStatus, ChunkType, Confidence, Orientation,
    PendingGoal, Phase, Project, Question, QuestionStatus, RelationshipOrigin, RelationshipType,
    SourceKind, Task, TaskStatus,
};
use tempfile::TempDir;
use uuid::Uuid;

use crate::TursoStorage;

async fn create_test_storage() -> (TursoStorage, TempDir) {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("test.db");
    let db = libsql::Builder::new_local(&db_path).build().await.unwrap();
    let storage = TursoStorage::from_database(db);
    storage.initialize_schema().await.unwrap();
    (storage, dir)
}

async fn seeded_project(storage: &TursoStorage) -> Uuid {
    let project = Project::new();
    storage.create_project(&project).await.unwrap();
    project.id
}

fn test_chunk(project_id: Uuid, content: &str) -> Chunk {
    Chunk::new(
        project_id,
        content.to_string(),
        ChunkType::Research,
        BTreeSet::from(["jazz".to_string()]),
        Confidence::Verified,
        SourceKind::Research,
        LearningContext::at_tick(1, Phase::Research),
    )
}

fn test_task(project_id: Uuid, title: &str) -> Task {
    Task::new(
        project_id,
        title.to_string(),
        "description".to_string(),
        Some("harmony".to_string()),
        BTreeSet::new(),
    )
}

#[tokio::test]
async fn schema_initialization_is_idempotent() {
    let (storage, _dir) = create_test_storage().await;
    storage.initialize_schema().await.unwrap();
    assert!(storage.check_connectivity().await.unwrap());
}

#[tokio::test]
async fn project_round_trip_and_cascade_delete() {
    let (storage, _dir) = create_test_storage().await;
    let project_id = seeded_project(&storage).await;

    assert!(storage.get_project(project_id).await.unwrap().is_some());

    let chunk = test_chunk(project_id, "cascade target");
    storage.insert_chunk(&chunk, None).await.unwrap();

    storage.delete_project(project_id).await.unwrap();
    assert!(storage.get_project(project_id).await.unwrap().is_none());
    assert!(storage.get_chunk(chunk.id).await.unwrap().is_none());
}

#[tokio::test]
async fn chunk_round_trip_preserves_every_field() {
    let (storage, _dir) = create_test_storage().await;
    let project_id = seeded_project(&storage).await;

    let mut chunk = test_chunk(project_id, "the ii-V-I is the core jazz cadence");
    chunk.tick_last_accessed = Some(7);
    chunk.access_count = 3;
    chunk.persistence_score = 0.62;
    chunk.learning_context.skill_area = Some("harmony".to_string());

    storage
        .insert_chunk(&chunk, Some(&[0.1, 0.2, 0.3]))
        .await
        .unwrap();

    let loaded = storage.get_chunk(chunk.id).await.unwrap().unwrap();
    assert_eq!(loaded, chunk);

    let vector = storage.get_embedding(chunk.id).await.unwrap().unwrap();
    assert_eq!(vector, vec![0.1, 0.2, 0.3]);
}

#[tokio::test]
async fn load_all_embeddings_feeds_index_rebuild() {
    let (storage, _dir) = create_test_storage().await;
    let project_id = seeded_project(&storage).await;

    for i in 0..3 {
        let chunk = test_chunk(project_id, &format!("chunk {i}"));
        storage
            .insert_chunk(&chunk, Some(&[i as f32, 1.0]))
            .await
            .unwrap();
    }

    let entries = storage.load_all_embeddings().await.unwrap();
    assert_eq!(entries.len(), 3);
    assert!(entries.iter().all(|e| e.project_id == project_id));
    assert!(entries.iter().all(|e| e.vector.len() == 2));
}

#[tokio::test]
async fn supersede_is_atomic_and_complete() {
    let (storage, _dir) = create_test_storage().await;
    let project_id = seeded_project(&storage).await;

    let mut old = test_chunk(project_id, "ii-V-I is the core cadence");
    storage.insert_chunk(&old, Some(&[1.0, 0.0])).await.unwrap();

    let new = test_chunk(project_id, "ii-V-I is no longer central");
    old.superseded_by = Some(new.id);
    old.decay_rate *= 3.0;
    old.valid_until_tick = Some(5);

    let edge = Relationship::new(
        project_id,
        new.id,
        old.id,
        RelationshipType::Contradicts,
        0.92,
        vec!["temporal".to_string()],
        RelationshipOrigin::Explicit,
    );

    storage
        .insert_chunk_superseding(&new, Some(&[0.9, 0.1]), &old, &edge)
        .await
        .unwrap();

    let old_loaded = storage.get_chunk(old.id).await.unwrap().unwrap();
    assert_eq!(old_loaded.superseded_by, Some(new.id));
    assert_eq!(old_loaded.valid_until_tick, Some(5));
    assert!((old_loaded.decay_rate - 0.15).abs() < 1e-6);

    let edge_loaded = storage
        .get_relationship(new.id, old.id, RelationshipType::Contradicts)
        .await
        .unwrap()
        .unwrap();
    assert!((edge_loaded.weight - 0.92).abs() < 1e-6);
}

#[tokio::test]
async fn tombstone_archive_removes_embedding_keeps_row() {
    let (storage, _dir) = create_test_storage().await;
    let project_id = seeded_project(&storage).await;

    let mut chunk = test_chunk(project_id, "fading knowledge");
    storage.insert_chunk(&chunk, Some(&[0.5, 0.5])).await.unwrap();

    chunk.status = ChunkStatus::Tombstone;
    chunk.current_strength = 0.0;
    let entry = ChunkArchiveEntry {
        chunk_id: chunk.id,
        project_id,
        summary: "fading knowledge".to_string(),
        content_hash: "ab".repeat(32),
        final_strength: 0.0,
        tick_archived: 42,
    };
    storage.archive_chunk(&entry, &chunk).await.unwrap();

    let archived = storage.get_chunk_archive(chunk.id).await.unwrap().unwrap();
    assert_eq!(archived.tick_archived, 42);
    assert!(storage.get_embedding(chunk.id).await.unwrap().is_none());

    let row = storage.get_chunk(chunk.id).await.unwrap().unwrap();
    assert_eq!(row.status, ChunkStatus::Tombstone);
}

#[tokio::test]
async fn relationships_filter_by_direction_type_and_weight() {
    let (storage, _dir) = create_test_storage().await;
    let project_id = seeded_project(&storage).await;

    let a = test_chunk(project_id, "a");
    let b = test_chunk(project_id, "b");
    let c = test_chunk(project_id, "c");
    for chunk in [&a, &b, &c] {
        storage.insert_chunk(chunk, None).await.unwrap();
    }

    let strong = Relationship::new(
        project_id,
        a.id,
        b.id,
        RelationshipType::Supports,
        0.8,
        vec![],
        RelationshipOrigin::Explicit,
    );
    let weak = Relationship::new(
        project_id,
        c.id,
        a.id,
        RelationshipType::RelatedTo,
        0.1,
        vec![],
        RelationshipOrigin::Implicit,
    );
    storage.insert_relationship(&strong).await.unwrap();
    storage.insert_relationship(&weak).await.unwrap();

    let outgoing = storage
        .get_relationships(a.id, None, 0.0, Direction::Outgoing, 10)
        .await
        .unwrap();
    assert_eq!(outgoing.len(), 1);
    assert_eq!(outgoing[0].id, strong.id);

    let both = storage
        .get_relationships(a.id, None, 0.0, Direction::Both, 10)
        .await
        .unwrap();
    assert_eq!(both.len(), 2);

    let heavy = storage
        .get_relationships(a.id, None, 0.5, Direction::Both, 10)
        .await
        .unwrap();
    assert_eq!(heavy.len(), 1);

    let typed = storage
        .get_relationships(a.id, Some(RelationshipType::RelatedTo), 0.0, Direction::Both, 10)
        .await
        .unwrap();
    assert_eq!(typed.len(), 1);
    assert_eq!(typed[0].id, weak.id);

    assert_eq!(storage.relationship_count(a.id).await.unwrap(), 2);
}

#[tokio::test]
async fn coretrieval_counts_and_cleanup() {
    let (storage, _dir) = create_test_storage().await;
    let project_id = seeded_project(&storage).await;
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
    let session = Uuid::new_v4();

    for tick in [1, 2, 3] {
        storage
            .record_coretrievals(&[CoRetrievalRecord::observed(
                project_id, a, b, session, "query", tick,
            )])
            .await
            .unwrap();
    }

    let pairs = storage.coretrieval_pair_counts(project_id, 3).await.unwrap();
    assert_eq!(pairs.len(), 1);
    assert_eq!(pairs[0].2, 3);

    assert!(storage
        .coretrieval_pair_counts(project_id, 4)
        .await
        .unwrap()
        .is_empty());

    let removed = storage.cleanup_coretrieval(project_id, 3).await.unwrap();
    assert_eq!(removed, 2);
}

#[tokio::test]
async fn answer_question_updates_tasks_in_one_transaction() {
    let (storage, _dir) = create_test_storage().await;
    let project_id = seeded_project(&storage).await;

    let mut task = test_task(project_id, "blocked work");
    let mut question = Question::new(
        project_id,
        "which tuning?".to_string(),
        None,
        vec![task.id],
    );
    task.blocked_by.insert(question.id);
    task.status = TaskStatus::Blocked;
    storage.insert_task(&task).await.unwrap();
    storage.insert_question(&question).await.unwrap();

    question.status = QuestionStatus::Answered;
    question.answer = Some("standard".to_string());
    question.answered_at = Some(Utc::now());
    task.blocked_by.clear();
    task.status = TaskStatus::Ready;

    storage.answer_question(&question, &[task.clone()]).await.unwrap();

    let loaded_task = storage.get_task(task.id).await.unwrap().unwrap();
    assert_eq!(loaded_task.status, TaskStatus::Ready);
    assert!(loaded_task.blocked_by.is_empty());

    let loaded_question = storage.get_question(question.id).await.unwrap().unwrap();
    assert_eq!(loaded_question.status, QuestionStatus::Answered);
}

#[tokio::test]
async fn task_round_trip_preserves_failure_context() {
    let (storage, _dir) = create_test_storage().await;
    let project_id = seeded_project(&storage).await;

    let mut task = test_task(project_id, "with context");
    task.failure_context = Some(serde_json::json!({"tool_calls": 12}));
    task.failure_reason = Some("partial".to_string());
    storage.insert_task(&task).await.unwrap();

    let loaded = storage.get_task(task.id).await.unwrap().unwrap();
    assert_eq!(loaded, task);
}

#[tokio::test]
async fn goals_swap_active_atomically() {
    let (storage, _dir) = create_test_storage().await;
    let project_id = seeded_project(&storage).await;

    let first = mnema_core::types::Goal::new(project_id, "learn standards".to_string());
    storage.set_goal(&first, None).await.unwrap();

    let mut completed = first.clone();
    completed.active = false;
    completed.completed_at = Some(Utc::now());
    let second = mnema_core::types::Goal::new(project_id, "transcribe solos".to_string());
    storage.set_goal(&second, Some(&completed)).await.unwrap();

    let active = storage.get_active_goal(project_id).await.unwrap().unwrap();
    assert_eq!(active.id, second.id);

    let old = storage.get_goal(first.id).await.unwrap().unwrap();
    assert!(!old.active);
}

#[tokio::test]
async fn pending_goal_is_single_slot_and_consumed() {
    let (storage, _dir) = create_test_storage().await;
    let project_id = seeded_project(&storage).await;

    for text in ["first", "second"] {
        storage
            .set_pending_goal(&PendingGoal {
                project_id,
                goal_text: text.to_string(),
                queued_at: Utc::now(),
            })
            .await
            .unwrap();
    }

    let taken = storage.take_pending_goal(project_id).await.unwrap().unwrap();
    assert_eq!(taken.goal_text, "second");
    assert!(storage.take_pending_goal(project_id).await.unwrap().is_none());
}

#[tokio::test]
async fn activities_return_newest_first() {
    let (storage, _dir) = create_test_storage().await;
    let project_id = seeded_project(&storage).await;

    for i in 0..5 {
        let mut activity = Activity::new(project_id, "tick", serde_json::json!({ "n": i }));
        // Spread timestamps so ordering is deterministic.
        activity.timestamp = Utc::now() + chrono::Duration::seconds(i);
        storage.log_activity(&activity).await.unwrap();
    }

    let recent = storage.recent_activities(project_id, 3).await.unwrap();
    assert_eq!(recent.len(), 3);
    assert_eq!(recent[0].details["n"], 4);
    assert_eq!(recent[2].details["n"], 2);
}

#[tokio::test]
async fn orientation_save_archives_prior_as_chunk() {
    let (storage, _dir) = create_test_storage().await;
    let project_id = seeded_project(&storage).await;

    let v1 = Orientation::initial(project_id, "original vision".to_string());
    storage.save_orientation(&v1, None).await.unwrap();

    let mut v2 = v1.clone();
    v2.version = 2;
    v2.vision_summary = "sharpened vision".to_string();
    let archive = test_chunk(project_id, "archived orientation v1");
    storage.save_orientation(&v2, Some(&archive)).await.unwrap();

    let loaded = storage.get_orientation(project_id).await.unwrap().unwrap();
    assert_eq!(loaded.version, 2);
    assert_eq!(loaded.vision_summary, "sharpened vision");

    let archived = storage.get_chunk(archive.id).await.unwrap().unwrap();
    assert_eq!(archived.content, "archived orientation v1");
}

#[tokio::test]
async fn agent_state_round_trip() {
    let (storage, _dir) = create_test_storage().await;
    let project_id = seeded_project(&storage).await;

    assert!(storage.get_agent_state(project_id).await.unwrap().is_none());

    let mut state = AgentState::new(project_id);
    state.current_tick = 17;
    state.last_decay_tick = 16;
    storage.save_agent_state(&state).await.unwrap();

    let loaded = storage.get_agent_state(project_id).await.unwrap().unwrap();
    assert_eq!(loaded, state);
}

#[tokio::test]
async fn statistics_count_rows() {
    let (storage, _dir) = create_test_storage().await;
    let project_id = seeded_project(&storage).await;

    storage
        .insert_chunk(&test_chunk(project_id, "one"), None)
        .await
        .unwrap();
    storage
        .insert_task(&test_task(project_id, "task"))
        .await
        .unwrap();

    let stats = storage.project_statistics(project_id).await.unwrap();
    assert_eq!(stats.chunk_count, 1);
    assert_eq!(stats.task_count, 1);
    assert_eq!(stats.relationship_count, 0);
    assert_eq!(stats.tombstone_count, 0);
}

#[tokio::test]
async fn list_chunks_by_tag_is_exact() {
    let (storage, _dir) = create_test_storage().await;
    let project_id = seeded_project(&storage).await;

    let tagged = test_chunk(project_id, "tagged jazz");
    let mut other = test_chunk(project_id, "tagged other");
    other.tags = BTreeSet::from(["jazzy".to_string()]);
    storage.insert_chunk(&tagged, None).await.unwrap();
    storage.insert_chunk(&other, None).await.unwrap();

    let found = storage.list_chunks_by_tag(project_id, "jazz").await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, tagged.id);
}
