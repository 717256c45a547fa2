//! Chunk store: the single write path for new learnings.
//!
//! Captures full learning context, runs the contradiction gate, applies the
//! resulting policy (supersede / flag / plain store), and keeps both
//! in-memory indexes in step with the durable rows. Within one store call
//! the write order is fixed: chunk row → index updates → edge creation →
//! event emission.

use chrono::Utc;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::chunk::{Chunk, LearningContext};
use crate::contradiction::{ContradictionDetector, ContradictionReport};
use crate::embeddings::EmbeddingProvider;
use crate::error::Result;
use crate::events::{EventBus, MemoryEvent};
use crate::graph::{Relationship, RelationshipGraph};
use crate::index::{Bm25Index, VectorIndex};
use crate::storage::StorageBackend;
use crate::types::{
    ChunkType, CoherenceWarning, Confidence, ContradictionAction, RelationshipOrigin,
    RelationshipType, SourceKind,
};

/// Per-call knobs for [`ChunkStore::store`].
#[derive(Debug, Clone, Default)]
pub struct StoreOptions {
    /// Skip the contradiction gate entirely.
    pub force_no_check: bool,
    /// Pin the chunk: no decay, importance 1.
    pub pinned: bool,
    /// Use this vector instead of calling the provider.
    pub embedding: Option<Vec<f32>>,
    /// Explicit edges to create from the new chunk.
    pub related_to: Vec<(Uuid, RelationshipType, f32)>,
}

/// Result of a store call: the chunk plus what the contradiction gate saw.
#[derive(Debug, Clone)]
pub struct StoredChunk {
    pub chunk: Chunk,
    pub report: ContradictionReport,
}

/// Write path for learnings.
pub struct ChunkStore {
    storage: Arc<dyn StorageBackend>,
    vector_index: Arc<VectorIndex>,
    bm25_index: Arc<Bm25Index>,
    graph: Arc<RelationshipGraph>,
    detector: ContradictionDetector,
    provider: Arc<dyn EmbeddingProvider>,
    events: EventBus,
}

impl ChunkStore {
    #[must_use]
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        vector_index: Arc<VectorIndex>,
        bm25_index: Arc<Bm25Index>,
        graph: Arc<RelationshipGraph>,
        detector: ContradictionDetector,
        provider: Arc<dyn EmbeddingProvider>,
        events: EventBus,
    ) -> Self {
        Self {
            storage,
            vector_index,
            bm25_index,
            graph,
            detector,
            provider,
            events,
        }
    }

    /// Store one learning.
    #[allow(clippy::too_many_arguments)]
    pub async fn store(
        &self,
        project_id: Uuid,
        content: String,
        chunk_type: ChunkType,
        tags: BTreeSet<String>,
        confidence: Confidence,
        source: SourceKind,
        context: LearningContext,
        options: StoreOptions,
    ) -> Result<StoredChunk> {
        // Provider outages do not block the write; the chunk lands with
        // embedding_pending set and keyword indexing only.
        let embedding = match options.embedding {
            Some(vector) => Some(vector),
            None => match self.provider.embed(&content).await {
                Ok(vector) => Some(vector),
                Err(err) => {
                    warn!(%project_id, error = %err, "embedding unavailable, storing pending");
                    None
                }
            },
        };

        let report = if options.force_no_check {
            ContradictionReport::clear()
        } else {
            self.detector
                .check(project_id, &content, embedding.as_deref(), chunk_type)
                .await?
        };

        let mut chunk = Chunk::new(
            project_id,
            content,
            chunk_type,
            tags,
            confidence,
            source,
            context,
        );
        if options.pinned {
            chunk.pin();
        }
        chunk.embedding_pending = embedding.is_none();

        match report.action {
            ContradictionAction::Supersede => {
                self.insert_superseding(&chunk, embedding.as_deref(), &report)
                    .await?;
            }
            ContradictionAction::FlagForReview | ContradictionAction::Store => {
                self.storage
                    .insert_chunk(&chunk, embedding.as_deref())
                    .await?;
            }
        }

        if let Some(vector) = &embedding {
            self.vector_index
                .store(chunk.id, project_id, vector.clone())?;
        }
        self.bm25_index
            .insert(project_id, chunk.id, chunk_type, &chunk.content);

        // Every detected conflict gets its contradicts edge, whatever the
        // action; the supersede edge was already written transactionally.
        for conflict in &report.conflicts {
            let already_superseded = report.action == ContradictionAction::Supersede
                && report
                    .strongest()
                    .is_some_and(|s| s.existing_id == conflict.existing_id);
            if !already_superseded {
                self.graph
                    .create(
                        project_id,
                        chunk.id,
                        conflict.existing_id,
                        RelationshipType::Contradicts,
                        conflict.analysis.confidence,
                        vec![conflict.analysis.conflict_type.to_string()],
                        RelationshipOrigin::Explicit,
                    )
                    .await?;
            }

            if report.action == ContradictionAction::FlagForReview {
                self.storage
                    .insert_coherence_warning(&CoherenceWarning {
                        id: Uuid::new_v4(),
                        project_id,
                        new_chunk_id: chunk.id,
                        existing_chunk_id: conflict.existing_id,
                        confidence: conflict.analysis.confidence,
                        conflict_type: conflict.analysis.conflict_type.to_string(),
                        explanation: conflict.analysis.explanation.clone(),
                        created_at: Utc::now(),
                    })
                    .await?;
            }

            self.events.publish(MemoryEvent::ContradictionDetected {
                new_id: chunk.id,
                existing_id: conflict.existing_id,
                confidence: conflict.analysis.confidence,
            });
        }

        for (target, relationship_type, weight) in &options.related_to {
            self.graph
                .create(
                    project_id,
                    chunk.id,
                    *target,
                    *relationship_type,
                    *weight,
                    Vec::new(),
                    RelationshipOrigin::Explicit,
                )
                .await?;
        }

        self.events
            .publish(MemoryEvent::ChunkStored { id: chunk.id });
        info!(chunk = %chunk.id, %project_id, %chunk_type, "chunk stored");

        Ok(StoredChunk { chunk, report })
    }

    /// Supersede path: the new chunk, the retired chunk's update, and the
    /// contradicts edge land in one transaction.
    async fn insert_superseding(
        &self,
        chunk: &Chunk,
        embedding: Option<&[f32]>,
        report: &ContradictionReport,
    ) -> Result<()> {
        let Some(strongest) = report.strongest() else {
            // Supersede action with no conflict recorded cannot happen; fall
            // back to a plain insert rather than dropping the write.
            return self.storage.insert_chunk(chunk, embedding).await;
        };

        let Some(mut existing) = self.storage.get_chunk(strongest.existing_id).await? else {
            return self.storage.insert_chunk(chunk, embedding).await;
        };

        existing.superseded_by = Some(chunk.id);
        existing.decay_rate *= 3.0;
        existing.valid_until_tick = Some(chunk.learning_context.tick);

        let edge = Relationship::new(
            chunk.project_id,
            chunk.id,
            existing.id,
            RelationshipType::Contradicts,
            strongest.analysis.confidence,
            vec![strongest.analysis.conflict_type.to_string()],
            RelationshipOrigin::Explicit,
        );

        self.storage
            .insert_chunk_superseding(chunk, embedding, &existing, &edge)
            .await?;

        self.events.publish(MemoryEvent::EdgeCreated {
            from: edge.from,
            to: edge.to,
            relationship_type: edge.relationship_type,
            weight: edge.weight,
        });
        debug!(new = %chunk.id, superseded = %existing.id, "chunk superseded");
        Ok(())
    }

    /// Re-embed chunks written during a provider outage. Returns how many
    /// were cleared.
    pub async fn reembed_pending(&self, project_id: Uuid) -> Result<usize> {
        let pending = self
            .storage
            .list_chunks_pending_embedding(project_id)
            .await?;
        let mut cleared = 0;

        for mut chunk in pending {
            match self.provider.embed(&chunk.content).await {
                Ok(vector) => {
                    self.storage.store_embedding(chunk.id, &vector).await?;
                    self.vector_index.store(chunk.id, project_id, vector)?;
                    chunk.embedding_pending = false;
                    self.storage.update_chunk(&chunk).await?;
                    cleared += 1;
                }
                Err(err) => {
                    warn!(chunk = %chunk.id, error = %err, "re-embed failed, still pending");
                }
            }
        }

        if cleared > 0 {
            info!(%project_id, cleared, "pending embeddings cleared");
        }
        Ok(cleared)
    }
}
