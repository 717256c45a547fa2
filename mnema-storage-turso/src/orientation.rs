//! Project, orientation, and agent-state storage.

use libsql::params;
use mnema_core::chunk::Chunk;
use mnema_core::error::Result;
use mnema_core::storage::StorageStatistics;
use mnema_core::types::{AgentState, Orientation, Project};
use tracing::{debug, info};
use uuid::Uuid;

use crate::rows::{parse_datetime, parse_uuid, row_to_agent_state, row_to_orientation, storage_err};
use crate::TursoStorage;

impl TursoStorage {
    pub async fn create_project(&self, project: &Project) -> Result<()> {
        debug!("Creating project: {}", project.id);
        let conn = self.connect().await?;
        conn.execute(
            "INSERT OR REPLACE INTO projects (project_id, created_at) VALUES (?, ?)",
            params![project.id.to_string(), project.created_at.to_rfc3339()],
        )
        .await
        .map_err(|e| storage_err("Failed to create project", e))?;
        Ok(())
    }

    pub async fn get_project(&self, id: Uuid) -> Result<Option<Project>> {
        let conn = self.connect().await?;
        let mut result_rows = conn
            .query(
                "SELECT project_id, created_at FROM projects WHERE project_id = ?",
                params![id.to_string()],
            )
            .await
            .map_err(|e| storage_err("Failed to query project", e))?;

        match result_rows
            .next()
            .await
            .map_err(|e| storage_err("Failed to fetch project row", e))?
        {
            Some(row) => {
                let id: String = row.get(0).map_err(|e| storage_err("column read", e))?;
                let created_at: String = row.get(1).map_err(|e| storage_err("column read", e))?;
                Ok(Some(Project {
                    id: parse_uuid(&id)?,
                    created_at: parse_datetime(&created_at)?,
                }))
            }
            None => Ok(None),
        }
    }

    /// Delete a project. Foreign keys cascade through everything it owns.
    pub async fn delete_project(&self, id: Uuid) -> Result<()> {
        info!("Deleting project: {id}");
        let conn = self.connect().await?;
        conn.execute(
            "DELETE FROM projects WHERE project_id = ?",
            params![id.to_string()],
        )
        .await
        .map_err(|e| storage_err("Failed to delete project", e))?;
        Ok(())
    }

    pub async fn get_orientation(&self, project_id: Uuid) -> Result<Option<Orientation>> {
        let conn = self.connect().await?;
        let mut result_rows = conn
            .query(
                "SELECT data FROM orientation WHERE project_id = ?",
                params![project_id.to_string()],
            )
            .await
            .map_err(|e| storage_err("Failed to query orientation", e))?;

        match result_rows
            .next()
            .await
            .map_err(|e| storage_err("Failed to fetch orientation row", e))?
        {
            Some(row) => Ok(Some(row_to_orientation(&row)?)),
            None => Ok(None),
        }
    }

    /// Replace the orientation, archiving the prior snapshot as a chunk.
    /// One transaction.
    pub async fn save_orientation(
        &self,
        orientation: &Orientation,
        archive_chunk: Option<&Chunk>,
    ) -> Result<()> {
        debug!(
            "Saving orientation v{} for {}",
            orientation.version, orientation.project_id
        );
        let conn = self.connect().await?;
        let tx = Self::begin(&conn).await?;

        if let Some(chunk) = archive_chunk {
            crate::chunks::insert_chunk_on(&tx, chunk).await?;
        }

        tx.execute(
            "INSERT OR REPLACE INTO orientation (project_id, data, version, last_rewritten) \
             VALUES (?, ?, ?, ?)",
            params![
                orientation.project_id.to_string(),
                serde_json::to_string(orientation)?,
                orientation.version as i64,
                orientation.last_rewritten.to_rfc3339(),
            ],
        )
        .await
        .map_err(|e| storage_err("Failed to save orientation", e))?;

        Self::commit(tx).await
    }

    pub async fn get_agent_state(&self, project_id: Uuid) -> Result<Option<AgentState>> {
        let conn = self.connect().await?;
        let mut result_rows = conn
            .query(
                "SELECT project_id, current_tick, last_decay_tick, last_consolidation_tick \
                 FROM agent_state WHERE project_id = ?",
                params![project_id.to_string()],
            )
            .await
            .map_err(|e| storage_err("Failed to query agent state", e))?;

        match result_rows
            .next()
            .await
            .map_err(|e| storage_err("Failed to fetch agent state row", e))?
        {
            Some(row) => Ok(Some(row_to_agent_state(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn save_agent_state(&self, state: &AgentState) -> Result<()> {
        let conn = self.connect().await?;
        conn.execute(
            "INSERT OR REPLACE INTO agent_state \
             (project_id, current_tick, last_decay_tick, last_consolidation_tick) \
             VALUES (?, ?, ?, ?)",
            params![
                state.project_id.to_string(),
                state.current_tick as i64,
                state.last_decay_tick as i64,
                state.last_consolidation_tick as i64,
            ],
        )
        .await
        .map_err(|e| storage_err("Failed to save agent state", e))?;
        Ok(())
    }

    /// Row counts for dashboards and tests.
    pub async fn project_statistics(&self, project_id: Uuid) -> Result<StorageStatistics> {
        let conn = self.connect().await?;

        let chunk_count = self.count_for_project(&conn, "chunks", project_id).await?;
        let relationship_count = self
            .count_for_project(&conn, "relationships", project_id)
            .await?;
        let task_count = self.count_for_project(&conn, "tasks", project_id).await?;
        let question_count = self
            .count_for_project(&conn, "questions", project_id)
            .await?;

        let mut result_rows = conn
            .query(
                "SELECT COUNT(*) FROM chunks WHERE project_id = ? AND status = 'tombstone'",
                params![project_id.to_string()],
            )
            .await
            .map_err(|e| storage_err("Failed to count tombstones", e))?;
        let tombstone_count = match result_rows
            .next()
            .await
            .map_err(|e| storage_err("Failed to fetch count", e))?
        {
            Some(row) => {
                let count: i64 = row.get(0).map_err(|e| storage_err("count read", e))?;
                count as usize
            }
            None => 0,
        };

        Ok(StorageStatistics {
            chunk_count,
            relationship_count,
            task_count,
            question_count,
            tombstone_count,
        })
    }
}
