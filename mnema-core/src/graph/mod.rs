//! Relationship graph: typed weighted edges between chunks, co-retrieval
//! tracking, and implicit-edge promotion.

mod edge;

pub use edge::{CoRetrievalRecord, Direction, Relationship};

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::Result;
use crate::events::{EventBus, MemoryEvent};
use crate::storage::StorageBackend;
use crate::types::{
    ImplicitEdgeConfig, RelationshipArchiveEntry, RelationshipOrigin, RelationshipType, Tick,
    WeakenReason,
};

/// Edges below this weight leave the live set and move to the archive.
pub const ARCHIVE_WEIGHT_FLOOR: f32 = 0.05;

/// Graph operations over the durable edge set.
pub struct RelationshipGraph {
    storage: Arc<dyn StorageBackend>,
    events: EventBus,
}

impl RelationshipGraph {
    #[must_use]
    pub fn new(storage: Arc<dyn StorageBackend>, events: EventBus) -> Self {
        Self { storage, events }
    }

    /// Create or merge an edge. On conflict with an existing `(from, to,
    /// type)` edge, the weight takes the max of old and new, context tags
    /// are replaced, and `last_activated` is refreshed.
    pub async fn create(
        &self,
        project_id: Uuid,
        from: Uuid,
        to: Uuid,
        relationship_type: RelationshipType,
        weight: f32,
        context_tags: Vec<String>,
        origin: RelationshipOrigin,
    ) -> Result<Relationship> {
        if let Some(mut existing) = self
            .storage
            .get_relationship(from, to, relationship_type)
            .await?
        {
            existing.weight = existing.weight.max(weight.clamp(0.0, 1.0));
            existing.context_tags = context_tags;
            existing.last_activated = Utc::now();
            self.storage.update_relationship(&existing).await?;
            debug!(%from, %to, ?relationship_type, weight = existing.weight, "edge merged");
            return Ok(existing);
        }

        let edge = Relationship::new(
            project_id,
            from,
            to,
            relationship_type,
            weight,
            context_tags,
            origin,
        );
        self.storage.insert_relationship(&edge).await?;
        self.events.publish(MemoryEvent::EdgeCreated {
            from,
            to,
            relationship_type,
            weight: edge.weight,
        });
        debug!(%from, %to, ?relationship_type, weight = edge.weight, "edge created");
        Ok(edge)
    }

    /// Edges touching a chunk. Traversal is an activation: every returned
    /// edge gets its `activation_count` bumped and `last_activated` set.
    pub async fn get(
        &self,
        chunk_id: Uuid,
        relationship_type: Option<RelationshipType>,
        min_weight: f32,
        direction: Direction,
        limit: usize,
    ) -> Result<Vec<Relationship>> {
        let mut edges = self
            .storage
            .get_relationships(chunk_id, relationship_type, min_weight, direction, limit)
            .await?;

        for edge in &mut edges {
            edge.activation_count += 1;
            edge.last_activated = Utc::now();
            self.storage.update_relationship(edge).await?;
        }

        Ok(edges)
    }

    /// Increase an edge's weight, capped at 1.
    pub async fn strengthen(
        &self,
        from: Uuid,
        to: Uuid,
        relationship_type: RelationshipType,
        delta: f32,
    ) -> Result<Option<Relationship>> {
        let Some(mut edge) = self
            .storage
            .get_relationship(from, to, relationship_type)
            .await?
        else {
            return Ok(None);
        };
        edge.weight = (edge.weight + delta).min(1.0);
        edge.last_activated = Utc::now();
        self.storage.update_relationship(&edge).await?;
        Ok(Some(edge))
    }

    /// Decrease an edge's weight, floored at 0. Below the archive floor the
    /// edge is moved to the archive with the given reason and removed from
    /// the live set.
    pub async fn weaken(
        &self,
        from: Uuid,
        to: Uuid,
        relationship_type: RelationshipType,
        reason: WeakenReason,
        delta: f32,
    ) -> Result<Option<Relationship>> {
        let Some(mut edge) = self
            .storage
            .get_relationship(from, to, relationship_type)
            .await?
        else {
            return Ok(None);
        };

        edge.weight = (edge.weight - delta).max(0.0);

        if edge.weight < ARCHIVE_WEIGHT_FLOOR {
            let entry = RelationshipArchiveEntry {
                relationship_id: edge.id,
                project_id: edge.project_id,
                final_weight: edge.weight,
                reason: reason.to_string(),
                original_data: serde_json::to_value(&edge)?,
                archived_at: Utc::now(),
            };
            self.storage.archive_relationship(&entry, edge.id).await?;
            info!(%from, %to, ?relationship_type, %reason, "edge archived");
            return Ok(None);
        }

        self.storage.update_relationship(&edge).await?;
        Ok(Some(edge))
    }

    /// Record every unordered pair of the retrieved set as one batch.
    pub async fn record_coretrieval(
        &self,
        project_id: Uuid,
        chunk_ids: &[Uuid],
        session_id: Uuid,
        query_context: &str,
        tick: Tick,
    ) -> Result<usize> {
        let mut records = Vec::new();
        for (i, &a) in chunk_ids.iter().enumerate() {
            for &b in &chunk_ids[i + 1..] {
                if a != b {
                    records.push(CoRetrievalRecord::observed(
                        project_id,
                        a,
                        b,
                        session_id,
                        query_context,
                        tick,
                    ));
                }
            }
        }
        if !records.is_empty() {
            self.storage.record_coretrievals(&records).await?;
        }
        Ok(records.len())
    }

    /// Promote frequently co-retrieved pairs to implicit `related_to` edges,
    /// or strengthen whichever edge already joins them.
    pub async fn consolidate_implicit(
        &self,
        project_id: Uuid,
        config: &ImplicitEdgeConfig,
    ) -> Result<usize> {
        let pairs = self
            .storage
            .coretrieval_pair_counts(project_id, config.threshold)
            .await?;

        let mut promoted = 0;
        for (a, b, count) in pairs {
            let existing = self.existing_edge_between(a, b).await?;
            match existing {
                Some(edge) => {
                    self.strengthen(
                        edge.from,
                        edge.to,
                        edge.relationship_type,
                        config.strengthen_delta,
                    )
                    .await?;
                }
                None => {
                    self.create(
                        project_id,
                        a,
                        b,
                        RelationshipType::RelatedTo,
                        config.initial_weight,
                        Vec::new(),
                        RelationshipOrigin::Implicit,
                    )
                    .await?;
                    promoted += 1;
                }
            }
            debug!(%a, %b, count, "co-retrieval pair consolidated");
        }

        if promoted > 0 {
            info!(project = %project_id, promoted, "implicit edges promoted");
        }
        Ok(promoted)
    }

    /// Drop co-retrieval observations older than `keep_ticks`.
    pub async fn cleanup_coretrieval(
        &self,
        project_id: Uuid,
        current_tick: Tick,
        keep_ticks: Tick,
    ) -> Result<u64> {
        let cutoff = current_tick.saturating_sub(keep_ticks);
        let removed = self
            .storage
            .cleanup_coretrieval(project_id, cutoff)
            .await?;
        if removed > 0 {
            debug!(project = %project_id, removed, cutoff, "co-retrieval rows cleaned");
        }
        Ok(removed)
    }

    /// Any live edge between two chunks, in either direction, any type.
    async fn existing_edge_between(&self, a: Uuid, b: Uuid) -> Result<Option<Relationship>> {
        let edges = self
            .storage
            .get_relationships(a, None, 0.0, Direction::Both, usize::MAX)
            .await?;
        Ok(edges.into_iter().find(|e| {
            (e.from == a && e.to == b) || (e.from == b && e.to == a)
        }))
    }
}
