//! Contradiction detection for incoming chunks.
//!
//! New knowledge of a contradictable type is compared against its nearest
//! neighbors in the vector index. Heuristic analysis flags conflicts; an
//! optional cross-encoder capability re-scores them; the highest surviving
//! confidence picks the action the chunk store applies.

mod heuristics;

pub use heuristics::{analyze, ContradictionAnalysis};

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::error::Result;
use crate::index::VectorIndex;
use crate::storage::StorageBackend;
use crate::types::{ChunkType, ContradictionAction, ContradictionConfig};

/// Cross-encoder verdict for one candidate pair.
#[derive(Debug, Clone, PartialEq)]
pub struct CrossEncoderVerdict {
    pub is_contradiction: bool,
    pub confidence: f32,
    pub explanation: String,
}

/// Optional validation capability over heuristic positives.
///
/// `Ok(None)` means the validator is unavailable; the heuristic verdict
/// stands unchanged.
#[async_trait]
pub trait CrossEncoder: Send + Sync {
    async fn validate_contradiction(
        &self,
        new_content: &str,
        existing_content: &str,
        prior_confidence: f32,
    ) -> Result<Option<CrossEncoderVerdict>>;
}

/// One conflicting candidate, after validation.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedConflict {
    pub existing_id: Uuid,
    pub similarity: f32,
    pub analysis: ContradictionAnalysis,
}

/// Outcome of a full contradiction check.
#[derive(Debug, Clone, PartialEq)]
pub struct ContradictionReport {
    pub action: ContradictionAction,
    pub conflicts: Vec<DetectedConflict>,
}

impl ContradictionReport {
    /// A report with nothing to act on.
    #[must_use]
    pub fn clear() -> Self {
        Self {
            action: ContradictionAction::Store,
            conflicts: Vec::new(),
        }
    }

    /// The strongest conflict, if any.
    #[must_use]
    pub fn strongest(&self) -> Option<&DetectedConflict> {
        self.conflicts.iter().max_by(|a, b| {
            a.analysis
                .confidence
                .partial_cmp(&b.analysis.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
    }
}

/// Finds and classifies conflicts between a new chunk and existing ones.
pub struct ContradictionDetector {
    storage: Arc<dyn StorageBackend>,
    vector_index: Arc<VectorIndex>,
    cross_encoder: Option<Arc<dyn CrossEncoder>>,
    config: ContradictionConfig,
}

impl ContradictionDetector {
    #[must_use]
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        vector_index: Arc<VectorIndex>,
        cross_encoder: Option<Arc<dyn CrossEncoder>>,
        config: ContradictionConfig,
    ) -> Self {
        Self {
            storage,
            vector_index,
            cross_encoder,
            config,
        }
    }

    /// Check a new statement against the project's existing knowledge.
    pub async fn check(
        &self,
        project_id: Uuid,
        content: &str,
        embedding: Option<&[f32]>,
        chunk_type: ChunkType,
    ) -> Result<ContradictionReport> {
        if !self.config.enabled || !chunk_type.is_contradictable() {
            return Ok(ContradictionReport::clear());
        }
        let Some(embedding) = embedding else {
            // Nothing to compare against without a vector.
            return Ok(ContradictionReport::clear());
        };

        let candidates = self.vector_index.search(
            project_id,
            embedding,
            self.config.max_candidates,
            self.config.similarity_threshold,
        );
        if candidates.is_empty() {
            return Ok(ContradictionReport::clear());
        }

        let mut conflicts = Vec::new();
        for (candidate_id, similarity) in candidates {
            let Some(existing) = self.storage.get_chunk(candidate_id).await? else {
                continue;
            };
            if existing.status.is_terminal() {
                continue;
            }

            let mut analysis = analyze(content, &existing.content, similarity);
            if !analysis.is_contradiction {
                continue;
            }

            // Cross-encoder validation replaces the heuristic confidence and
            // drops candidates it rejects outright.
            if let Some(validator) = &self.cross_encoder {
                match validator
                    .validate_contradiction(content, &existing.content, analysis.confidence)
                    .await?
                {
                    Some(verdict) if !verdict.is_contradiction => {
                        debug!(existing = %candidate_id, "cross-encoder rejected conflict");
                        continue;
                    }
                    Some(verdict) => {
                        analysis.confidence = verdict.confidence.clamp(0.0, 1.0);
                        if !verdict.explanation.is_empty() {
                            analysis.explanation = verdict.explanation;
                        }
                    }
                    None => {}
                }
            }

            conflicts.push(DetectedConflict {
                existing_id: candidate_id,
                similarity,
                analysis,
            });
        }

        let max_confidence = conflicts
            .iter()
            .map(|c| c.analysis.confidence)
            .fold(0.0_f32, f32::max);

        let action = if max_confidence > self.config.supersede_threshold {
            if self.config.auto_supersede {
                ContradictionAction::Supersede
            } else {
                ContradictionAction::FlagForReview
            }
        } else if max_confidence > self.config.flag_threshold {
            ContradictionAction::FlagForReview
        } else {
            ContradictionAction::Store
        };

        debug!(
            project = %project_id,
            conflicts = conflicts.len(),
            max_confidence,
            ?action,
            "contradiction check complete"
        );

        Ok(ContradictionReport { action, conflicts })
    }
}
