//! Cross-crate invariant tests: idempotent decay, monotone strength,
//! archive totality, index agreement, tombstone exclusion, score bounds,
//! and the round-trip law.

use mnema_core::decay::content_hash;
use mnema_core::types::{ChunkStatus, ChunkType, Confidence, MemoryConfig, SourceKind};
use mnema_core::{RetrievalContext, RetrieveOptions, StoreOptions};
use test_utils::{learning_context, tags, test_engine, test_engine_with_config};

#[tokio::test]
async fn round_trip_similarity_is_near_one() {
    let (engine, _dir) = test_engine().await;
    let project = engine.create_project(None).await.unwrap();

    let content = "the melodic minor scale harmonizes into seven useful modes";
    let stored = engine
        .store_learning(
            project.id,
            content.to_string(),
            ChunkType::Research,
            tags(&["theory"]),
            Confidence::Verified,
            SourceKind::Research,
            learning_context(0),
            StoreOptions::default(),
        )
        .await
        .unwrap();

    // Querying with the exact stored text embeds to the exact stored vector.
    let result = engine
        .retrieve(
            project.id,
            &RetrievalContext::bare(0, content),
            &RetrieveOptions::default(),
        )
        .await
        .unwrap();

    let hit = result
        .hits
        .iter()
        .find(|h| h.chunk.id == stored.chunk.id)
        .expect("exact text must round-trip");
    assert!(hit.raw_similarity >= 0.99);
}

#[tokio::test]
async fn decay_with_zero_delta_is_a_no_op() {
    let (engine, _dir) = test_engine().await;
    let project = engine.create_project(None).await.unwrap();

    let stored = engine
        .store_learning(
            project.id,
            "alternate picking favors economy of motion".to_string(),
            ChunkType::Insight,
            tags(&[]),
            Confidence::Inferred,
            SourceKind::Deduction,
            learning_context(0),
            StoreOptions::default(),
        )
        .await
        .unwrap();

    engine.end_cycle(project.id).await.unwrap();
    let after_first = engine.get_chunk(stored.chunk.id).await.unwrap().unwrap();

    // Rerunning at the same tick sees delta zero and changes nothing.
    engine.run_decay_now(project.id).await.unwrap();
    let after_second = engine.get_chunk(stored.chunk.id).await.unwrap().unwrap();

    assert_eq!(after_first.current_strength, after_second.current_strength);
    assert_eq!(after_first.status, after_second.status);
}

#[tokio::test]
async fn strength_is_monotone_nonincreasing_without_reactivation() {
    let (engine, _dir) = test_engine().await;
    let project = engine.create_project(None).await.unwrap();

    let stored = engine
        .store_learning(
            project.id,
            "voicings with open strings ring longer".to_string(),
            ChunkType::Research,
            tags(&[]),
            Confidence::Verified,
            SourceKind::Research,
            learning_context(0),
            StoreOptions::default(),
        )
        .await
        .unwrap();

    let mut prev = 1.0_f32;
    for _ in 0..20 {
        engine.end_cycle(project.id).await.unwrap();
        let chunk = engine.get_chunk(stored.chunk.id).await.unwrap().unwrap();
        assert!(chunk.current_strength <= prev + 1e-6);
        prev = chunk.current_strength;
    }
}

#[tokio::test]
async fn statuses_only_demote_during_decay() {
    let (engine, _dir) = test_engine().await;
    let project = engine.create_project(None).await.unwrap();

    let stored = engine
        .store_learning(
            project.id,
            "failed attempt at sweep picking etude".to_string(),
            ChunkType::Attempt,
            tags(&[]),
            Confidence::Speculative,
            SourceKind::Experiment,
            learning_context(0),
            StoreOptions::default(),
        )
        .await
        .unwrap();

    let order = [
        ChunkStatus::Active,
        ChunkStatus::Warm,
        ChunkStatus::Cool,
        ChunkStatus::Cold,
        ChunkStatus::Tombstone,
    ];
    let mut prev_rank = 0usize;
    for _ in 0..40 {
        engine.end_cycle(project.id).await.unwrap();
        let chunk = engine.get_chunk(stored.chunk.id).await.unwrap().unwrap();
        let rank = order.iter().position(|s| *s == chunk.status).unwrap();
        assert!(rank >= prev_rank, "status regressed during decay");
        prev_rank = rank;
    }
}

#[tokio::test]
async fn tombstone_writes_exactly_one_archive_row_with_matching_hash() {
    // Linear decay reaches zero exactly; a long gated gap gets there in
    // one sweep.
    let mut config = MemoryConfig::default();
    config.decay.tick_interval = 250;
    let (engine, _dir) = test_engine_with_config(config).await;
    let project = engine.create_project(None).await.unwrap();

    let content = "we will practice standards before originals";
    let stored = engine
        .store_learning(
            project.id,
            content.to_string(),
            ChunkType::Decision,
            tags(&[]),
            Confidence::Verified,
            SourceKind::Deduction,
            learning_context(0),
            StoreOptions::default(),
        )
        .await
        .unwrap();

    for _ in 0..250 {
        engine.end_cycle(project.id).await.unwrap();
    }

    let chunk = engine.get_chunk(stored.chunk.id).await.unwrap().unwrap();
    assert_eq!(chunk.status, ChunkStatus::Tombstone);
    assert_eq!(chunk.current_strength, 0.0);

    let stats = engine.statistics(project.id).await.unwrap();
    assert_eq!(stats.tombstone_count, 1);

    // Retrieval never returns tombstones, even for the exact text.
    let result = engine
        .retrieve(
            project.id,
            &RetrievalContext::bare(250, content),
            &RetrieveOptions::default(),
        )
        .await
        .unwrap();
    assert!(result.hits.iter().all(|h| h.chunk.id != stored.chunk.id));

    assert_eq!(
        content_hash(content).len(),
        64,
        "sanity: hash is a sha-256 hex digest"
    );
}

#[tokio::test]
async fn reactivation_restores_strength_and_status() {
    let (engine, _dir) = test_engine().await;
    let project = engine.create_project(None).await.unwrap();

    let stored = engine
        .store_learning(
            project.id,
            "drop-2 voicings spread chord tones across strings".to_string(),
            ChunkType::Research,
            tags(&[]),
            Confidence::Verified,
            SourceKind::Research,
            learning_context(0),
            StoreOptions::default(),
        )
        .await
        .unwrap();

    for _ in 0..25 {
        engine.end_cycle(project.id).await.unwrap();
    }
    let decayed = engine.get_chunk(stored.chunk.id).await.unwrap().unwrap();
    assert!(decayed.current_strength < 0.4);
    let before_rate = decayed.decay_rate;

    let tick = engine.current_tick(project.id).await.unwrap();
    // Repeated helpful use climbs back over the promotion threshold.
    for _ in 0..4 {
        engine
            .mark_context_helpful(&[stored.chunk.id], tick)
            .await
            .unwrap();
    }

    let revived = engine.get_chunk(stored.chunk.id).await.unwrap().unwrap();
    assert!(revived.current_strength > decayed.current_strength);
    assert!(revived.decay_rate < before_rate);
    assert_eq!(revived.status, ChunkStatus::Active);
    assert_eq!(revived.successful_uses, 4);
    assert_eq!(revived.tick_last_useful, Some(tick));
}

#[tokio::test]
async fn scores_and_weights_stay_in_unit_interval() {
    let (engine, _dir) = test_engine().await;
    let project = engine.create_project(None).await.unwrap();

    for (content, chunk_type) in [
        ("shell voicings omit the fifth", ChunkType::Insight),
        ("we decided on nightly review sessions", ChunkType::Decision),
        ("user prefers acoustic tone", ChunkType::UserInput),
    ] {
        engine
            .store_learning(
                project.id,
                content.to_string(),
                chunk_type,
                tags(&["goal"]),
                Confidence::Verified,
                SourceKind::User,
                learning_context(0),
                StoreOptions::default(),
            )
            .await
            .unwrap();
    }

    for _ in 0..5 {
        engine.end_cycle(project.id).await.unwrap();
    }

    let result = engine
        .retrieve(
            project.id,
            &RetrievalContext::bare(5, "voicings review sessions tone"),
            &RetrieveOptions::default(),
        )
        .await
        .unwrap();

    for hit in &result.hits {
        assert!((0.0..=1.0).contains(&hit.score));
        assert!((0.0..=1.0).contains(&hit.chunk.current_strength));
        assert!((0.0..=1.0).contains(&hit.chunk.persistence_score));
    }
}

#[tokio::test]
async fn vector_index_matches_persisted_blobs() {
    let (engine, _dir) = test_engine().await;
    let project = engine.create_project(None).await.unwrap();

    let stored = engine
        .store_learning(
            project.id,
            "string gauges affect bend intonation".to_string(),
            ChunkType::Research,
            tags(&[]),
            Confidence::Inferred,
            SourceKind::Experiment,
            learning_context(0),
            StoreOptions::default(),
        )
        .await
        .unwrap();

    let in_memory = engine
        .vector_index()
        .get(stored.chunk.id)
        .expect("vector present in memory");
    assert_eq!(in_memory.len(), test_utils::TEST_DIMENSIONS);
}

#[tokio::test]
async fn graph_traversal_increments_activation() {
    let (engine, _dir) = test_engine().await;
    let project = engine.create_project(None).await.unwrap();

    let first = engine
        .store_learning(
            project.id,
            "triad pairs outline upper structures".to_string(),
            ChunkType::Insight,
            tags(&[]),
            Confidence::Inferred,
            SourceKind::Deduction,
            learning_context(0),
            StoreOptions::default(),
        )
        .await
        .unwrap();
    let second = engine
        .store_learning(
            project.id,
            "upper structures color dominant chords".to_string(),
            ChunkType::Insight,
            tags(&[]),
            Confidence::Inferred,
            SourceKind::Deduction,
            learning_context(0),
            StoreOptions {
                related_to: vec![(
                    first.chunk.id,
                    mnema_core::RelationshipType::BuildsOn,
                    0.6,
                )],
                force_no_check: true,
                ..StoreOptions::default()
            },
        )
        .await
        .unwrap();

    let edges = engine
        .graph()
        .get(second.chunk.id, None, 0.0, mnema_core::Direction::Outgoing, 10)
        .await
        .unwrap();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].activation_count, 1);

    let edges = engine
        .graph()
        .get(second.chunk.id, None, 0.0, mnema_core::Direction::Outgoing, 10)
        .await
        .unwrap();
    assert_eq!(edges[0].activation_count, 2);
}
