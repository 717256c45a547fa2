//! Property tests for the scoring and indexing primitives.

use proptest::prelude::*;
use uuid::Uuid;

use mnema_core::chunk::{status_for_strength, Chunk, LearningContext};
use mnema_core::decay::{decayed_strength, persistence_score};
use mnema_core::embeddings::cosine_similarity;
use mnema_core::index::tokenize;
use mnema_core::types::{ChunkStatus, ChunkType, Confidence, Phase, SourceKind};

fn arb_chunk_type() -> impl Strategy<Value = ChunkType> {
    prop_oneof![
        Just(ChunkType::Research),
        Just(ChunkType::Insight),
        Just(ChunkType::Decision),
        Just(ChunkType::Resource),
        Just(ChunkType::Attempt),
        Just(ChunkType::UserInput),
    ]
}

fn arb_confidence() -> impl Strategy<Value = Confidence> {
    prop_oneof![
        Just(Confidence::Verified),
        Just(Confidence::Inferred),
        Just(Confidence::Speculative),
    ]
}

fn arb_source() -> impl Strategy<Value = SourceKind> {
    prop_oneof![
        Just(SourceKind::Research),
        Just(SourceKind::User),
        Just(SourceKind::Deduction),
        Just(SourceKind::Experiment),
    ]
}

prop_compose! {
    fn arb_chunk()(
        chunk_type in arb_chunk_type(),
        confidence in arb_confidence(),
        source in arb_source(),
        tags in prop::collection::btree_set("[a-z]{1,10}", 0..4),
        strength in 0.0_f32..=1.0,
        access_count in 0u32..500,
        accessed_tick in prop::option::of(0u64..1000),
    ) -> Chunk {
        let mut chunk = Chunk::new(
            Uuid::new_v4(),
            "property chunk".to_string(),
            chunk_type,
            tags,
            confidence,
            source,
            LearningContext::at_tick(0, Phase::Research),
        );
        chunk.current_strength = strength;
        chunk.access_count = access_count;
        chunk.tick_last_accessed = accessed_tick;
        chunk
    }
}

proptest! {
    #[test]
    fn persistence_score_stays_in_unit_interval(
        chunk in arb_chunk(),
        edges in 0usize..200,
        tick in 0u64..2000,
    ) {
        let ps = persistence_score(&chunk, edges, tick);
        prop_assert!((0.0..=1.0).contains(&ps));
    }

    #[test]
    fn decay_never_increases_strength(
        chunk in arb_chunk(),
        delta in 0u64..500,
    ) {
        let tick = chunk.tick_last_accessed.unwrap_or(0) + delta;
        let after = decayed_strength(&chunk, tick, delta);
        prop_assert!(after <= chunk.current_strength + 1e-6);
        prop_assert!((0.0..=1.0).contains(&after));
    }

    #[test]
    fn longer_deltas_decay_at_least_as_much(
        chunk in arb_chunk(),
        short in 1u64..100,
        extra in 0u64..100,
    ) {
        let s_short = decayed_strength(&chunk, short, short);
        let s_long = decayed_strength(&chunk, short + extra, short + extra);
        prop_assert!(s_long <= s_short + 1e-6);
    }

    #[test]
    fn status_ladder_is_total_and_ordered(strength in 0.0_f32..=1.0) {
        let status = status_for_strength(strength);
        if strength >= 0.30 {
            prop_assert_eq!(status, ChunkStatus::Active);
        } else if strength == 0.0 {
            prop_assert_eq!(status, ChunkStatus::Tombstone);
        } else {
            prop_assert!(status > ChunkStatus::Active);
            prop_assert!(status != ChunkStatus::Tombstone);
        }
    }

    #[test]
    fn tokenize_never_yields_empty_or_uppercase_tokens(text in ".{0,200}") {
        for token in tokenize(&text) {
            prop_assert!(!token.is_empty());
            prop_assert_eq!(token.to_lowercase(), token);
        }
    }

    #[test]
    fn tokenize_is_idempotent_on_its_own_output(text in "[a-zA-Z0-9 _,.-]{0,100}") {
        let once = tokenize(&text);
        let again = tokenize(&once.join(" "));
        prop_assert_eq!(once, again);
    }

    #[test]
    fn cosine_similarity_is_bounded_and_symmetric(
        a in prop::collection::vec(-10.0_f32..10.0, 8),
        b in prop::collection::vec(-10.0_f32..10.0, 8),
    ) {
        let ab = cosine_similarity(&a, &b);
        let ba = cosine_similarity(&b, &a);
        prop_assert!((0.0..=1.0).contains(&ab));
        prop_assert!((ab - ba).abs() < 1e-5);
    }

    #[test]
    fn cosine_self_similarity_is_one_for_nonzero(
        a in prop::collection::vec(0.1_f32..10.0, 8),
    ) {
        let sim = cosine_similarity(&a, &a);
        prop_assert!((sim - 1.0).abs() < 1e-4);
    }
}
