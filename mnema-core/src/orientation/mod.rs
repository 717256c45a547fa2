//! Orientation store: the versioned strategic snapshot.
//!
//! Saving archives the outgoing version as a `decision` chunk before the
//! replacement lands, so the strategy's history stays queryable through
//! ordinary retrieval.

use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::chunk::{Chunk, LearningContext};
use crate::error::Result;
use crate::storage::StorageBackend;
use crate::types::{ChunkType, Confidence, Orientation, SourceKind, Tick};

/// Versioned orientation snapshots over one storage backend.
pub struct OrientationStore {
    storage: Arc<dyn StorageBackend>,
}

impl OrientationStore {
    #[must_use]
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage }
    }

    /// The current orientation, if the project has one.
    pub async fn get(&self, project_id: Uuid) -> Result<Option<Orientation>> {
        self.storage.get_orientation(project_id).await
    }

    /// Save a new orientation.
    ///
    /// The prior version (when present) is archived as a `decision` chunk
    /// tagged `orientation_archive` and `v<old_version>`; the incoming
    /// snapshot gets `version = old + 1`. Both writes land in one
    /// transaction.
    pub async fn save(&self, mut orientation: Orientation, tick: Tick) -> Result<Orientation> {
        let prior = self.storage.get_orientation(orientation.project_id).await?;

        let archive_chunk = match &prior {
            Some(prior) => {
                orientation.version = prior.version + 1;
                Some(archive_chunk_for(prior, tick)?)
            }
            None => {
                orientation.version = orientation.version.max(1);
                None
            }
        };
        orientation.last_rewritten = chrono::Utc::now();

        self.storage
            .save_orientation(&orientation, archive_chunk.as_ref())
            .await?;

        info!(
            project = %orientation.project_id,
            version = orientation.version,
            "orientation rewritten"
        );
        Ok(orientation)
    }
}

fn archive_chunk_for(prior: &Orientation, tick: Tick) -> Result<Chunk> {
    let content = serde_json::to_string_pretty(prior)?;
    let tags: BTreeSet<String> = [
        "orientation_archive".to_string(),
        format!("v{}", prior.version),
    ]
    .into_iter()
    .collect();

    Ok(Chunk::new(
        prior.project_id,
        content,
        ChunkType::Decision,
        tags,
        Confidence::Verified,
        SourceKind::Deduction,
        LearningContext::at_tick(tick, prior.current_phase),
    ))
}
