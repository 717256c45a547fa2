//! End-to-end scenarios: learn and recall, context boosting, memory time
//! travel, supersession, unblock cascades, and implicit-edge promotion.

use std::collections::BTreeSet;

use mnema_core::retrieval::BoostReason;
use mnema_core::types::{
    ChunkType, Confidence, MemoryConfig, RelationshipOrigin, RelationshipType, SourceKind,
    TaskStatus,
};
use mnema_core::{RetrievalContext, RetrieveOptions, StoreOptions};
use test_utils::{
    embedding_for, goal_context, goal_retrieval_context, learning_context, similar_vector, tags,
    test_engine, test_engine_with_config,
};

const CADENCE: &str = "ii-V-I is the core jazz cadence";

#[tokio::test]
async fn learn_and_recall() {
    test_utils::init_tracing();
    let (engine, _dir) = test_engine().await;
    let project = engine.create_project(None).await.unwrap();

    let query = "jazz chord progression";
    let stored = engine
        .store_learning(
            project.id,
            CADENCE.to_string(),
            ChunkType::Research,
            tags(&["jazz", "harmony"]),
            Confidence::Verified,
            SourceKind::Research,
            learning_context(0),
            StoreOptions {
                embedding: Some(similar_vector(&embedding_for(query), 0.95)),
                ..StoreOptions::default()
            },
        )
        .await
        .unwrap();

    let result = engine
        .retrieve(
            project.id,
            &RetrievalContext::bare(0, query),
            &RetrieveOptions::default(),
        )
        .await
        .unwrap();

    let hit = result
        .hits
        .iter()
        .find(|h| h.chunk.id == stored.chunk.id)
        .expect("stored chunk should be recalled");
    assert!(hit.sources.semantic.is_some_and(|s| s > 0.0));
    assert!(!hit.boosted);
    assert!(hit.boost_reason.is_none());
}

#[tokio::test]
async fn context_boost_via_goal() {
    let (engine, _dir) = test_engine().await;
    let project = engine.create_project(None).await.unwrap();
    let goal = engine
        .working_state()
        .set_goal(project.id, "jazz")
        .await
        .unwrap();

    let query = "chord progression";
    let stored = engine
        .store_learning(
            project.id,
            CADENCE.to_string(),
            ChunkType::Research,
            tags(&["jazz", "harmony"]),
            Confidence::Verified,
            SourceKind::Research,
            goal_context(0, goal.id, "harmony"),
            StoreOptions {
                embedding: Some(similar_vector(&embedding_for(query), 0.95)),
                ..StoreOptions::default()
            },
        )
        .await
        .unwrap();

    let result = engine
        .retrieve(
            project.id,
            &goal_retrieval_context(0, goal.id, "harmony", query),
            &RetrieveOptions::default(),
        )
        .await
        .unwrap();

    let hit = result
        .hits
        .iter()
        .find(|h| h.chunk.id == stored.chunk.id)
        .expect("boosted chunk should be recalled");
    assert!(hit.boosted);
    assert_eq!(hit.boost_reason, Some(BoostReason::StrongContextMatch));
    assert!(hit.score > hit.raw_similarity * hit.chunk.current_strength - 1e-6);
    assert!(hit.score > hit.raw_similarity);
}

#[tokio::test]
async fn memory_time_travel() {
    let (engine, _dir) = test_engine().await;
    let project = engine.create_project(None).await.unwrap();
    let goal = engine
        .working_state()
        .set_goal(project.id, "jazz")
        .await
        .unwrap();

    let query = "chord progression";
    let stored = engine
        .store_learning(
            project.id,
            CADENCE.to_string(),
            ChunkType::Research,
            tags(&["jazz", "harmony"]),
            Confidence::Verified,
            SourceKind::Research,
            goal_context(0, goal.id, "harmony"),
            StoreOptions {
                embedding: Some(similar_vector(&embedding_for(query), 0.95)),
                ..StoreOptions::default()
            },
        )
        .await
        .unwrap();

    // Thirty untouched cycles: exp(-0.05 * 30) ≈ 0.22, under the active
    // threshold but well above tombstone.
    for _ in 0..30 {
        engine.end_cycle(project.id).await.unwrap();
    }
    let decayed = engine.get_chunk(stored.chunk.id).await.unwrap().unwrap();
    assert!(decayed.current_strength < 0.3);
    assert!(decayed.current_strength > 0.0);

    let tick = engine.current_tick(project.id).await.unwrap();
    let result = engine
        .retrieve(
            project.id,
            &goal_retrieval_context(tick, goal.id, "harmony", query),
            &RetrieveOptions::default(),
        )
        .await
        .unwrap();

    let hit = result
        .hits
        .iter()
        .find(|h| h.chunk.id == stored.chunk.id)
        .expect("decayed chunk should reactivate on matching context");
    assert_eq!(hit.boost_reason, Some(BoostReason::MemoryReactivation));
    // Score law: at least match · raw_similarity · 0.7, and match is 1 here.
    assert!(hit.score >= hit.raw_similarity * 0.7 - 1e-6);
}

#[tokio::test]
async fn supersede_on_contradiction() {
    let mut config = MemoryConfig::default();
    config.contradiction.auto_supersede = true;
    let (engine, _dir) = test_engine_with_config(config).await;
    let project = engine.create_project(None).await.unwrap();

    let anchor = embedding_for("jazz cadence centrality");
    let first = engine
        .store_learning(
            project.id,
            CADENCE.to_string(),
            ChunkType::Research,
            tags(&["jazz"]),
            Confidence::Verified,
            SourceKind::Research,
            learning_context(0),
            StoreOptions {
                embedding: Some(anchor.clone()),
                ..StoreOptions::default()
            },
        )
        .await
        .unwrap();

    let second = engine
        .store_learning(
            project.id,
            "the ii-V-I is no longer central to modern jazz".to_string(),
            ChunkType::Research,
            tags(&["jazz"]),
            Confidence::Verified,
            SourceKind::Research,
            learning_context(5),
            StoreOptions {
                embedding: Some(similar_vector(&anchor, 0.92)),
                ..StoreOptions::default()
            },
        )
        .await
        .unwrap();

    let old = engine.get_chunk(first.chunk.id).await.unwrap().unwrap();
    assert_eq!(old.superseded_by, Some(second.chunk.id));
    assert_eq!(old.valid_until_tick, Some(5));
    assert!((old.decay_rate - 0.15).abs() < 1e-6, "decay rate tripled");

    let edges = engine
        .graph()
        .get(
            second.chunk.id,
            Some(RelationshipType::Contradicts),
            0.0,
            mnema_core::Direction::Outgoing,
            10,
        )
        .await
        .unwrap();
    let edge = edges
        .into_iter()
        .find(|e| e.to == first.chunk.id)
        .expect("contradicts edge must exist");
    assert!(edge.weight > 0.9);
}

#[tokio::test]
async fn unblock_cascade() {
    let (engine, _dir) = test_engine().await;
    let project = engine.create_project(None).await.unwrap();
    let ws = engine.working_state();

    let t1 = ws
        .create_task(project.id, "transcribe solo", "desc", None, BTreeSet::new())
        .await
        .unwrap();
    assert_eq!(t1.status, TaskStatus::Ready);

    let t2 = ws
        .create_task(
            project.id,
            "analyze solo",
            "desc",
            None,
            BTreeSet::from([t1.id]),
        )
        .await
        .unwrap();
    assert_eq!(t2.status, TaskStatus::Blocked);

    let q1 = ws
        .create_question(project.id, "which recording?", None, vec![t1.id])
        .await
        .unwrap();
    let t1_blocked = engine
        .working_state()
        .blocked_tasks(project.id)
        .await
        .unwrap();
    assert!(t1_blocked.iter().any(|t| t.id == t1.id));

    ws.answer_question(q1.id, "the 1959 take").await.unwrap();
    let ready: Vec<_> = ws.ready_tasks(project.id).await.unwrap();
    assert!(ready.iter().any(|t| t.id == t1.id), "t1 released");
    assert!(!ready.iter().any(|t| t.id == t2.id), "t2 still blocked");

    ws.complete_task(t1.id, Some("done".to_string())).await.unwrap();
    let ready: Vec<_> = ws.ready_tasks(project.id).await.unwrap();
    assert!(ready.iter().any(|t| t.id == t2.id), "t2 released by dependency");
}

#[tokio::test]
async fn coretrieval_promotes_implicit_edges() {
    let mut config = MemoryConfig::default();
    config.consolidation.tick_interval = 1;
    let (engine, _dir) = test_engine_with_config(config).await;
    let project = engine.create_project(None).await.unwrap();

    let query = "practice plan";
    let query_vec = embedding_for(query);
    let mut ids = Vec::new();
    for (i, content) in [
        "slow practice beats fast practice",
        "metronome work builds time feel",
        "transcription trains the ear",
    ]
    .iter()
    .enumerate()
    {
        let stored = engine
            .store_learning(
                project.id,
                (*content).to_string(),
                ChunkType::Insight,
                tags(&["practice"]),
                Confidence::Inferred,
                SourceKind::Deduction,
                learning_context(0),
                StoreOptions {
                    embedding: Some(similar_vector(&query_vec, 0.95 - i as f32 * 0.01)),
                    force_no_check: true,
                    ..StoreOptions::default()
                },
            )
            .await
            .unwrap();
        ids.push(stored.chunk.id);
    }

    let options = RetrieveOptions {
        limit: 3,
        ..RetrieveOptions::default()
    };
    for tick in 0..3 {
        let result = engine
            .retrieve(project.id, &RetrievalContext::bare(tick, query), &options)
            .await
            .unwrap();
        let returned: Vec<_> = result.hits.iter().map(|h| h.chunk.id).collect();
        for id in &ids {
            assert!(returned.contains(id));
        }
    }

    // Consolidation runs at the next cycle boundary.
    engine.end_cycle(project.id).await.unwrap();

    for (i, &a) in ids.iter().enumerate() {
        for &b in &ids[i + 1..] {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let edges = engine
                .graph()
                .get(lo, Some(RelationshipType::RelatedTo), 0.0, mnema_core::Direction::Both, 10)
                .await
                .unwrap();
            let edge = edges
                .iter()
                .find(|e| (e.from == lo && e.to == hi) || (e.from == hi && e.to == lo))
                .expect("implicit edge must exist for every pair");
            assert_eq!(edge.origin, RelationshipOrigin::Implicit);
            assert!((edge.weight - 0.2).abs() < 1e-6);
        }
    }
}
