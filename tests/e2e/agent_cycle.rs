//! Agent-cycle integration: the executor contract, the event stream,
//! orientation versioning, pending goals, and query routing.

use std::collections::BTreeSet;
use std::sync::Mutex;

use async_trait::async_trait;
use mnema_core::types::{
    ChunkType, Confidence, Phase, QuestionStatus, SourceKind, TaskStatus,
};
use mnema_core::{
    Learning, MemoryEvent, Orientation, QueryResponse, RetrievedChunk, StoreOptions, Task,
    TaskExecutor, TaskResult, TaskResultStatus,
};
use test_utils::{learning_context, tags, test_engine};

/// Executor double that replays a scripted sequence of results.
struct ScriptedExecutor {
    script: Mutex<Vec<TaskResult>>,
}

impl ScriptedExecutor {
    fn new(results: Vec<TaskResult>) -> Self {
        Self {
            script: Mutex::new(results),
        }
    }
}

#[async_trait]
impl TaskExecutor for ScriptedExecutor {
    async fn execute(
        &self,
        _task: &Task,
        _orientation: Option<&Orientation>,
        _retrieved_context: &[RetrievedChunk],
    ) -> mnema_core::Result<TaskResult> {
        let mut script = self.script.lock().expect("script lock");
        Ok(script.remove(0))
    }
}

#[tokio::test]
async fn complete_result_stores_learnings_and_finishes_task() {
    test_utils::init_tracing();
    let (engine, _dir) = test_engine().await;
    let project = engine.create_project(Some("learn jazz guitar")).await.unwrap();

    let task = engine
        .working_state()
        .create_task(project.id, "research voicings", "survey drop-2", None, BTreeSet::new())
        .await
        .unwrap();

    let executor = ScriptedExecutor::new(vec![TaskResult::complete("surveyed").with_learnings(
        vec![Learning {
            content: "drop-2 voicings invert cleanly across string sets".to_string(),
            chunk_type: ChunkType::Research,
            tags: vec!["voicings".to_string()],
            confidence: Confidence::Verified,
        }],
    )]);

    let result = engine.run_task(&executor, task.id).await.unwrap();
    assert_eq!(result.status, TaskResultStatus::Complete);

    let done = engine
        .working_state()
        .ready_tasks(project.id)
        .await
        .unwrap();
    assert!(done.is_empty());

    let stats = engine.statistics(project.id).await.unwrap();
    assert_eq!(stats.chunk_count, 1);
    assert_eq!(stats.task_count, 1);
}

#[tokio::test]
async fn blocked_result_creates_question_and_blocks_task() {
    let (engine, _dir) = test_engine().await;
    let project = engine.create_project(None).await.unwrap();

    let task = engine
        .working_state()
        .create_task(project.id, "pick repertoire", "choose tunes", None, BTreeSet::new())
        .await
        .unwrap();

    let executor = ScriptedExecutor::new(vec![TaskResult {
        status: TaskResultStatus::Blocked,
        outcome: None,
        learnings: vec![],
        question: Some("how many tunes per month?".to_string()),
        question_context: Some("pacing decision".to_string()),
        research_topic: None,
        research_description: None,
        error: None,
        failure_context: None,
    }]);

    engine.run_task(&executor, task.id).await.unwrap();

    let questions = engine
        .working_state()
        .open_questions(project.id)
        .await
        .unwrap();
    assert_eq!(questions.len(), 1);
    assert_eq!(questions[0].status, QuestionStatus::Open);
    assert_eq!(questions[0].blocks_tasks, vec![task.id]);

    let blocked = engine
        .working_state()
        .blocked_tasks(project.id)
        .await
        .unwrap();
    assert!(blocked.iter().any(|t| t.id == task.id));
}

#[tokio::test]
async fn needs_research_spawns_ready_task() {
    let (engine, _dir) = test_engine().await;
    let project = engine.create_project(None).await.unwrap();

    let task = engine
        .working_state()
        .create_task(project.id, "arrange tune", "solo arrangement", None, BTreeSet::new())
        .await
        .unwrap();

    let executor = ScriptedExecutor::new(vec![TaskResult {
        status: TaskResultStatus::NeedsResearch,
        outcome: None,
        learnings: vec![],
        question: None,
        question_context: None,
        research_topic: Some("chord melody techniques".to_string()),
        research_description: Some("survey common approaches".to_string()),
        error: None,
        failure_context: None,
    }]);

    engine.run_task(&executor, task.id).await.unwrap();

    let ready = engine
        .working_state()
        .ready_tasks(project.id)
        .await
        .unwrap();
    assert!(ready.iter().any(|t| t.title == "chord melody techniques"));
}

#[tokio::test]
async fn failed_result_parks_task_until_explicit_reset() {
    let (engine, _dir) = test_engine().await;
    let project = engine.create_project(None).await.unwrap();

    let task = engine
        .working_state()
        .create_task(project.id, "record demo", "track a take", None, BTreeSet::new())
        .await
        .unwrap();

    let executor = ScriptedExecutor::new(vec![TaskResult {
        status: TaskResultStatus::Failed,
        outcome: None,
        learnings: vec![],
        question: None,
        question_context: None,
        research_topic: None,
        research_description: None,
        error: Some("interface driver crashed".to_string()),
        failure_context: Some(serde_json::json!({ "attempts": 2 })),
    }]);

    engine.run_task(&executor, task.id).await.unwrap();

    let failed = engine
        .working_state()
        .blocked_tasks(project.id)
        .await
        .unwrap();
    assert!(failed.is_empty());
    let loaded = engine
        .working_state()
        .ready_tasks(project.id)
        .await
        .unwrap();
    assert!(loaded.is_empty(), "failed tasks are not auto-retried");

    let reset = engine.working_state().reset_task(task.id).await.unwrap();
    assert_eq!(reset.status, TaskStatus::Ready);
    assert!(reset.failure_reason.is_none());
}

#[tokio::test]
async fn partial_result_records_context_and_returns_to_ready() {
    let (engine, _dir) = test_engine().await;
    let project = engine.create_project(None).await.unwrap();

    let task = engine
        .working_state()
        .create_task(project.id, "deep dive", "long analysis", None, BTreeSet::new())
        .await
        .unwrap();

    let executor = ScriptedExecutor::new(vec![TaskResult {
        status: TaskResultStatus::Partial,
        outcome: None,
        learnings: vec![Learning {
            content: "halfway through the transcription".to_string(),
            chunk_type: ChunkType::Attempt,
            tags: vec![],
            confidence: Confidence::Speculative,
        }],
        question: None,
        question_context: None,
        research_topic: None,
        research_description: None,
        error: None,
        failure_context: Some(serde_json::json!({ "tool_calls": 40 })),
    }]);

    engine.run_task(&executor, task.id).await.unwrap();

    let ready = engine
        .working_state()
        .ready_tasks(project.id)
        .await
        .unwrap();
    let revisit = ready.iter().find(|t| t.id == task.id).expect("back to ready");
    assert_eq!(revisit.failure_reason.as_deref(), Some("partial"));
    assert_eq!(revisit.failure_context.as_ref().unwrap()["tool_calls"], 40);

    // The partial learning landed as an attempt chunk.
    let stats = engine.statistics(project.id).await.unwrap();
    assert_eq!(stats.chunk_count, 1);
}

#[tokio::test]
async fn event_stream_reports_the_cycle() {
    let (engine, _dir) = test_engine().await;
    let mut events = engine.subscribe();
    let project = engine.create_project(None).await.unwrap();

    engine
        .store_learning(
            project.id,
            "humidity changes the setup".to_string(),
            ChunkType::Research,
            tags(&[]),
            Confidence::Inferred,
            SourceKind::Research,
            learning_context(0),
            StoreOptions::default(),
        )
        .await
        .unwrap();
    engine.end_cycle(project.id).await.unwrap();

    let mut saw_chunk_stored = false;
    let mut saw_tick = false;
    let mut saw_decay = false;
    while let Ok(event) = events.try_recv() {
        match event {
            MemoryEvent::ChunkStored { .. } => saw_chunk_stored = true,
            MemoryEvent::TickAdvance { tick, .. } => {
                saw_tick = true;
                assert_eq!(tick, 1);
            }
            MemoryEvent::DecayRun { processed, .. } => {
                saw_decay = true;
                assert_eq!(processed, 1);
            }
            _ => {}
        }
    }
    assert!(saw_chunk_stored);
    assert!(saw_tick);
    assert!(saw_decay);
}

#[tokio::test]
async fn orientation_versions_and_archives() {
    let (engine, _dir) = test_engine().await;
    let project = engine.create_project(Some("learn jazz guitar")).await.unwrap();

    let v1 = engine.orientation().get(project.id).await.unwrap().unwrap();
    assert_eq!(v1.version, 1);

    let mut v2 = v1.clone();
    v2.current_phase = Phase::Planning;
    v2.key_decisions.push("start with standards".to_string());
    let saved = engine.orientation().save(v2, 3).await.unwrap();
    assert_eq!(saved.version, 2);

    // The prior version is retrievable as an archived decision chunk.
    let stats = engine.statistics(project.id).await.unwrap();
    assert_eq!(stats.chunk_count, 1);
}

#[tokio::test]
async fn pending_goal_applies_at_cycle_end() {
    let (engine, _dir) = test_engine().await;
    let project = engine.create_project(None).await.unwrap();

    engine
        .working_state()
        .set_goal(project.id, "learn standards")
        .await
        .unwrap();
    engine
        .working_state()
        .queue_goal(project.id, "transcribe solos")
        .await
        .unwrap();

    engine.end_cycle(project.id).await.unwrap();

    match engine.query(project.id, "recent activity").await.unwrap() {
        QueryResponse::Activities(entries) => {
            let goal_sets: Vec<_> = entries.iter().filter(|a| a.action == "goal_set").collect();
            assert_eq!(goal_sets.len(), 2, "queued goal activated at cycle end");
            assert!(goal_sets
                .iter()
                .any(|a| a.details["text"] == "transcribe solos"));
        }
        other => panic!("expected activities, got {other:?}"),
    }
}

#[tokio::test]
async fn query_planner_routes_operational_and_hybrid() {
    let (engine, _dir) = test_engine().await;
    let project = engine.create_project(None).await.unwrap();

    engine
        .working_state()
        .create_task(project.id, "warmups", "daily warmups", None, BTreeSet::new())
        .await
        .unwrap();

    match engine.query(project.id, "what's blocked?").await.unwrap() {
        QueryResponse::Tasks(tasks) => assert!(tasks.is_empty()),
        other => panic!("expected tasks, got {other:?}"),
    }

    match engine.query(project.id, "ready tasks").await.unwrap() {
        QueryResponse::Tasks(tasks) => assert_eq!(tasks.len(), 1),
        other => panic!("expected tasks, got {other:?}"),
    }

    engine
        .store_learning(
            project.id,
            "warmups reduce strain injuries".to_string(),
            ChunkType::Insight,
            tags(&["health"]),
            Confidence::Inferred,
            SourceKind::Deduction,
            learning_context(0),
            StoreOptions::default(),
        )
        .await
        .unwrap();

    match engine
        .query(project.id, "warmups strain injuries")
        .await
        .unwrap()
    {
        QueryResponse::Chunks(hits) => {
            assert!(!hits.is_empty(), "hybrid route should find the chunk by keyword");
        }
        other => panic!("expected chunks, got {other:?}"),
    }
}
