//! Hybrid retriever: semantic + keyword + graph fusion with context boost
//! and reactivation.

mod boost;
mod fusion;

pub use boost::{boost, context_match, BoostReason, BoostedScore};
pub use fusion::{reciprocal_rank_fusion, RankedLeg};

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::chunk::{Chunk, RetrievalContext};
use crate::decay::DecayEngine;
use crate::embeddings::EmbeddingProvider;
use crate::error::Result;
use crate::graph::{Direction, RelationshipGraph};
use crate::index::{Bm25Index, VectorIndex};
use crate::storage::StorageBackend;
use crate::types::{ChunkType, RetrievalConfig};

/// How the embedding step resolved, and therefore which legs ran.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    /// All three legs available.
    FullHybrid,
    /// Embedding failed; keyword leg only, graph expansion disabled.
    KeywordOnly(String),
    /// Nothing matched at all.
    Empty,
}

/// Which legs surfaced a result, with their raw per-leg scores.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScoreSources {
    pub semantic: Option<f32>,
    pub keyword: Option<f32>,
    pub graph: Option<f32>,
}

/// One retrieval hit.
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub chunk: Chunk,
    /// Cosine similarity when the semantic leg saw the chunk, otherwise the
    /// normalized keyword score.
    pub raw_similarity: f32,
    pub score: f32,
    pub boosted: bool,
    pub boost_reason: Option<BoostReason>,
    pub sources: ScoreSources,
}

/// Options for one retrieval call.
#[derive(Debug, Clone)]
pub struct RetrieveOptions {
    pub limit: usize,
    /// Override the configured similarity floor (exploration queries).
    pub min_similarity: Option<f32>,
    /// Restrict the keyword leg to these chunk types.
    pub types: Option<Vec<ChunkType>>,
    pub graph_expansion: bool,
    /// Override the configured minimum edge weight for graph expansion.
    pub graph_min_weight: Option<f32>,
    /// Session the co-retrieval observations are attributed to.
    pub session_id: Uuid,
}

impl Default for RetrieveOptions {
    fn default() -> Self {
        Self {
            limit: 10,
            min_similarity: None,
            types: None,
            graph_expansion: true,
            graph_min_weight: None,
            session_id: Uuid::new_v4(),
        }
    }
}

/// The retrieval result set plus how it was produced.
#[derive(Debug)]
pub struct RetrievalResult {
    pub outcome: SearchOutcome,
    pub hits: Vec<RetrievedChunk>,
}

/// Multi-signal retrieval over one project's memory.
pub struct HybridRetriever {
    storage: Arc<dyn StorageBackend>,
    vector_index: Arc<VectorIndex>,
    bm25_index: Arc<Bm25Index>,
    graph: Arc<RelationshipGraph>,
    decay: Arc<DecayEngine>,
    provider: Arc<dyn EmbeddingProvider>,
    config: RetrievalConfig,
}

impl HybridRetriever {
    #[must_use]
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        vector_index: Arc<VectorIndex>,
        bm25_index: Arc<Bm25Index>,
        graph: Arc<RelationshipGraph>,
        decay: Arc<DecayEngine>,
        provider: Arc<dyn EmbeddingProvider>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            storage,
            vector_index,
            bm25_index,
            graph,
            decay,
            provider,
            config,
        }
    }

    /// Run the full retrieval pipeline.
    pub async fn retrieve(
        &self,
        project_id: Uuid,
        context: &RetrievalContext,
        options: &RetrieveOptions,
    ) -> Result<RetrievalResult> {
        let min_sim = options.min_similarity.unwrap_or(self.config.min_similarity);
        let pool = self.config.candidate_pool;

        // 1. Embed the query; a provider failure degrades to keyword-only.
        let (query_vector, mut outcome) = match self.provider.embed(&context.query_text).await {
            Ok(vector) => (Some(vector), SearchOutcome::FullHybrid),
            Err(err) => {
                warn!(error = %err, "query embedding failed, falling back to keyword search");
                (None, SearchOutcome::KeywordOnly(err.to_string()))
            }
        };

        // 2. Semantic and keyword legs. Both are in-memory scans; running
        // them back to back is already cheaper than any coordination.
        let semantic: Vec<(Uuid, f32)> = query_vector
            .as_deref()
            .map(|q| self.vector_index.search(project_id, q, pool, min_sim))
            .unwrap_or_default();
        let keyword = self.bm25_index.search(
            project_id,
            &context.query_text,
            pool,
            options.types.as_deref(),
        );

        // 3. Graph expansion over the best semantic hits.
        let mut graph_leg: Vec<(Uuid, f32)> = Vec::new();
        if options.graph_expansion && !semantic.is_empty() {
            let expansion_min_weight = options
                .graph_min_weight
                .unwrap_or(self.config.graph_expansion_min_weight);
            let mut neighbor_scores: HashMap<Uuid, f32> = HashMap::new();
            for (seed, _) in semantic.iter().take(self.config.graph_expansion_seeds) {
                let edges = self
                    .graph
                    .get(
                        *seed,
                        None,
                        expansion_min_weight,
                        Direction::Both,
                        self.config.graph_expansion_fanout,
                    )
                    .await?;
                for edge in edges {
                    let neighbor = if edge.from == *seed { edge.to } else { edge.from };
                    let entry = neighbor_scores.entry(neighbor).or_insert(0.0);
                    *entry = entry.max(edge.weight);
                }
            }
            graph_leg = neighbor_scores.into_iter().collect();
            graph_leg.sort_by(|a, b| {
                b.1.partial_cmp(&a.1)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.0.cmp(&b.0))
            });
        }

        // 4. Weighted reciprocal rank fusion.
        let fused = reciprocal_rank_fusion(&[
            RankedLeg {
                weight: self.config.semantic_weight,
                entries: &semantic,
            },
            RankedLeg {
                weight: self.config.keyword_weight,
                entries: &keyword,
            },
            RankedLeg {
                weight: self.config.graph_weight,
                entries: &graph_leg,
            },
        ]);

        if fused.is_empty() {
            if outcome == SearchOutcome::FullHybrid {
                outcome = SearchOutcome::Empty;
            }
            return Ok(RetrievalResult {
                outcome,
                hits: Vec::new(),
            });
        }

        // 5. Load the candidate pool.
        let candidate_ids: Vec<Uuid> = fused
            .iter()
            .take(options.limit.saturating_mul(5))
            .map(|(id, _)| *id)
            .collect();
        let chunks = self.storage.get_chunks(&candidate_ids).await?;

        let semantic_scores: HashMap<Uuid, f32> = semantic.iter().copied().collect();
        let keyword_scores: HashMap<Uuid, f32> = keyword.iter().copied().collect();
        let graph_scores: HashMap<Uuid, f32> = graph_leg.iter().copied().collect();
        let max_keyword = keyword
            .iter()
            .map(|(_, s)| *s)
            .fold(0.0_f32, f32::max)
            .max(f32::EPSILON);

        // 6. Context boost and time travel.
        let mut hits: Vec<RetrievedChunk> = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            if chunk.status.is_terminal() {
                continue;
            }

            let raw_similarity = semantic_scores.get(&chunk.id).copied().unwrap_or_else(|| {
                keyword_scores
                    .get(&chunk.id)
                    .map(|s| (s / max_keyword).clamp(0.0, 1.0))
                    .unwrap_or(0.0)
            });

            let boosted = boost(&chunk, context, raw_similarity);
            let sources = ScoreSources {
                semantic: semantic_scores.get(&chunk.id).copied(),
                keyword: keyword_scores.get(&chunk.id).copied(),
                graph: graph_scores.get(&chunk.id).copied(),
            };

            hits.push(RetrievedChunk {
                chunk,
                raw_similarity,
                score: boosted.score,
                boosted: boosted.boosted,
                boost_reason: boosted.reason,
                sources,
            });
        }

        // 7. Final ranking.
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk.id.cmp(&b.chunk.id))
        });
        hits.truncate(options.limit);

        // 8. Surfacing counts as access, not yet as usefulness.
        for hit in &mut hits {
            self.decay
                .reactivate(&mut hit.chunk, context.tick, false)
                .await?;
        }

        // 9. One co-retrieval batch for the returned set.
        let returned: Vec<Uuid> = hits.iter().map(|h| h.chunk.id).collect();
        if returned.len() > 1 {
            self.graph
                .record_coretrieval(
                    project_id,
                    &returned,
                    options.session_id,
                    &context.query_text,
                    context.tick,
                )
                .await?;
        }

        debug!(
            project = %project_id,
            hits = hits.len(),
            ?outcome,
            "retrieval complete"
        );
        Ok(RetrievalResult { outcome, hits })
    }
}
