//! Engine configuration: the enumerated operator controls and their defaults.

use serde::{Deserialize, Serialize};

use crate::types::Tick;

/// Top-level configuration for the memory engine.
///
/// Every knob here corresponds to an operator control; defaults encode the
/// shipped behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MemoryConfig {
    pub decay: DecayConfig,
    pub consolidation: ConsolidationConfig,
    pub retrieval: RetrievalConfig,
    pub contradiction: ContradictionConfig,
    pub implicit_edges: ImplicitEdgeConfig,
    pub vector: VectorConfig,
}

/// Decay sweep gating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecayConfig {
    /// Ticks between decay runs.
    pub tick_interval: Tick,
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self { tick_interval: 1 }
    }
}

/// Implicit-edge consolidation gating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolidationConfig {
    /// Ticks between consolidation runs.
    pub tick_interval: Tick,
    /// Co-retrieval rows older than this many ticks are dropped.
    pub coretrieval_keep_ticks: Tick,
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            tick_interval: 10,
            coretrieval_keep_ticks: 100,
        }
    }
}

/// Hybrid retrieval tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Floor for semantic hits.
    pub min_similarity: f32,
    /// Floor used for exploration-class queries.
    pub exploration_min_similarity: f32,
    /// Rank-fusion weight for the semantic leg.
    pub semantic_weight: f32,
    /// Rank-fusion weight for the keyword leg.
    pub keyword_weight: f32,
    /// Rank-fusion weight for the graph-expansion leg.
    pub graph_weight: f32,
    /// Candidates fetched per leg before fusion.
    pub candidate_pool: usize,
    /// Semantic hits expanded through the graph.
    pub graph_expansion_seeds: usize,
    /// Neighbors pulled per expanded hit.
    pub graph_expansion_fanout: usize,
    /// Minimum edge weight followed during expansion.
    pub graph_expansion_min_weight: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            min_similarity: 0.5,
            exploration_min_similarity: 0.3,
            semantic_weight: 0.40,
            keyword_weight: 0.35,
            graph_weight: 0.25,
            candidate_pool: 50,
            graph_expansion_seeds: 5,
            graph_expansion_fanout: 5,
            graph_expansion_min_weight: 0.2,
        }
    }
}

/// Contradiction detection policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContradictionConfig {
    /// Detection runs at all when true.
    pub enabled: bool,
    /// Candidate floor: only chunks at least this similar are analyzed.
    pub similarity_threshold: f32,
    /// When true, a high-confidence conflict replaces the old chunk
    /// without review.
    pub auto_supersede: bool,
    /// Confidence above which the action is supersede.
    pub supersede_threshold: f32,
    /// Confidence above which the action is flag-for-review.
    pub flag_threshold: f32,
    /// Candidates pulled from the vector index per check.
    pub max_candidates: usize,
}

impl Default for ContradictionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            similarity_threshold: 0.85,
            auto_supersede: false,
            supersede_threshold: 0.9,
            flag_threshold: 0.7,
            max_candidates: 10,
        }
    }
}

/// Co-retrieval promotion policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImplicitEdgeConfig {
    /// Pair observations required before promotion.
    pub threshold: u32,
    /// Weight assigned to a freshly promoted edge.
    pub initial_weight: f32,
    /// Delta applied when the pair already has an edge.
    pub strengthen_delta: f32,
}

impl Default for ImplicitEdgeConfig {
    fn default() -> Self {
        Self {
            threshold: 3,
            initial_weight: 0.2,
            strengthen_delta: 0.05,
        }
    }
}

/// Vector index housekeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorConfig {
    /// Projects below this chunk count skip index rebuild entirely.
    pub min_project_count_for_index_rebuild: usize,
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            min_project_count_for_index_rebuild: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_shipped_behavior() {
        let config = MemoryConfig::default();
        assert_eq!(config.decay.tick_interval, 1);
        assert_eq!(config.consolidation.tick_interval, 10);
        assert!((config.retrieval.min_similarity - 0.5).abs() < f32::EPSILON);
        assert!((config.retrieval.semantic_weight - 0.40).abs() < f32::EPSILON);
        assert!((config.retrieval.keyword_weight - 0.35).abs() < f32::EPSILON);
        assert!((config.retrieval.graph_weight - 0.25).abs() < f32::EPSILON);
        assert!((config.contradiction.similarity_threshold - 0.85).abs() < f32::EPSILON);
        assert!(!config.contradiction.auto_supersede);
        assert_eq!(config.implicit_edges.threshold, 3);
        assert!((config.implicit_edges.initial_weight - 0.2).abs() < f32::EPSILON);
    }

    #[test]
    fn fusion_weights_sum_to_one() {
        let r = RetrievalConfig::default();
        let total = r.semantic_weight + r.keyword_weight + r.graph_weight;
        assert!((total - 1.0).abs() < 1e-6);
    }
}
