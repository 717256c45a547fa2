//! Micro-benchmarks for the retrieval hot path: cosine scan, BM25 lookup,
//! and rank fusion.

use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use uuid::Uuid;

use mnema_core::embeddings::MockProvider;
use mnema_core::retrieval::{reciprocal_rank_fusion, RankedLeg};
use mnema_core::types::ChunkType;
use mnema_core::{Bm25Index, VectorIndex};

const DIMENSIONS: usize = 384;
const CHUNKS: usize = 5_000;

fn seeded_vector_index(project: Uuid) -> VectorIndex {
    let provider = MockProvider::new(DIMENSIONS);
    let index = VectorIndex::new(DIMENSIONS);
    for i in 0..CHUNKS {
        let vector = provider.embedding_for(&format!("chunk content number {i}"));
        index.store(Uuid::new_v4(), project, vector).unwrap();
    }
    index
}

fn seeded_bm25_index(project: Uuid) -> Bm25Index {
    let index = Bm25Index::new();
    let topics = ["harmony", "rhythm", "voicing", "improvisation", "theory"];
    for i in 0..CHUNKS {
        let topic = topics[i % topics.len()];
        index.insert(
            project,
            Uuid::new_v4(),
            ChunkType::Research,
            &format!("notes about {topic} practice session {i} with observations"),
        );
    }
    index
}

fn bench_cosine_scan(c: &mut Criterion) {
    let project = Uuid::new_v4();
    let index = seeded_vector_index(project);
    let provider = MockProvider::new(DIMENSIONS);
    let query = provider.embedding_for("chunk content number 42");

    c.bench_function("vector_scan_5k", |b| {
        b.iter(|| black_box(index.search(project, black_box(&query), 50, 0.5)));
    });
}

fn bench_bm25_search(c: &mut Criterion) {
    let project = Uuid::new_v4();
    let index = seeded_bm25_index(project);

    c.bench_function("bm25_search_5k", |b| {
        b.iter(|| black_box(index.search(project, black_box("harmony practice"), 50, None)));
    });
}

fn bench_rank_fusion(c: &mut Criterion) {
    let semantic: Vec<(Uuid, f32)> = (0..50)
        .map(|i| (Uuid::new_v4(), 1.0 - i as f32 * 0.01))
        .collect();
    let keyword: Vec<(Uuid, f32)> = semantic
        .iter()
        .take(25)
        .map(|(id, s)| (*id, s * 3.0))
        .chain((0..25).map(|i| (Uuid::new_v4(), 2.0 - i as f32 * 0.05)))
        .collect();
    let graph: Vec<(Uuid, f32)> = semantic.iter().take(10).map(|(id, _)| (*id, 0.4)).collect();

    c.bench_function("rrf_three_legs", |b| {
        b.iter(|| {
            black_box(reciprocal_rank_fusion(&[
                RankedLeg {
                    weight: 0.40,
                    entries: &semantic,
                },
                RankedLeg {
                    weight: 0.35,
                    entries: &keyword,
                },
                RankedLeg {
                    weight: 0.25,
                    entries: &graph,
                },
            ]))
        });
    });
}

criterion_group!(benches, bench_cosine_scan, bench_bm25_search, bench_rank_fusion);
criterion_main!(benches);
