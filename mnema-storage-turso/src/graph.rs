//! Relationship and co-retrieval storage operations.

use libsql::{params, Connection};
use mnema_core::error::Result;
use mnema_core::graph::{CoRetrievalRecord, Direction, Relationship};
use mnema_core::types::{RelationshipArchiveEntry, RelationshipType, Tick};
use tracing::debug;
use uuid::Uuid;

use crate::rows::{row_to_relationship, storage_err, RELATIONSHIP_COLUMNS};
use crate::TursoStorage;

/// Insert an edge on an existing connection or transaction.
pub(crate) async fn insert_relationship_on(
    conn: &Connection,
    edge: &Relationship,
) -> Result<()> {
    let context_tags = serde_json::to_string(&edge.context_tags)?;
    conn.execute(
        r#"
        INSERT OR REPLACE INTO relationships (
            relationship_id, project_id, from_chunk, to_chunk, relationship_type,
            weight, last_activated, activation_count, context_tags, origin, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            edge.id.to_string(),
            edge.project_id.to_string(),
            edge.from.to_string(),
            edge.to.to_string(),
            edge.relationship_type.to_string(),
            f64::from(edge.weight),
            edge.last_activated.to_rfc3339(),
            i64::from(edge.activation_count),
            context_tags,
            edge.origin.to_string(),
            edge.created_at.to_rfc3339(),
        ],
    )
    .await
    .map_err(|e| storage_err("Failed to store relationship", e))?;
    Ok(())
}

impl TursoStorage {
    /// Look up the unique edge for a `(from, to, type)` key.
    pub async fn get_relationship(
        &self,
        from: Uuid,
        to: Uuid,
        relationship_type: RelationshipType,
    ) -> Result<Option<Relationship>> {
        let conn = self.connect().await?;
        let sql = format!(
            "SELECT {RELATIONSHIP_COLUMNS} FROM relationships \
             WHERE from_chunk = ? AND to_chunk = ? AND relationship_type = ?"
        );
        let mut result_rows = conn
            .query(
                &sql,
                params![
                    from.to_string(),
                    to.to_string(),
                    relationship_type.to_string()
                ],
            )
            .await
            .map_err(|e| storage_err("Failed to query relationship", e))?;

        match result_rows
            .next()
            .await
            .map_err(|e| storage_err("Failed to fetch relationship row", e))?
        {
            Some(row) => Ok(Some(row_to_relationship(&row)?)),
            None => Ok(None),
        }
    }

    /// Insert a new edge.
    pub async fn insert_relationship(&self, edge: &Relationship) -> Result<()> {
        let conn = self.connect().await?;
        insert_relationship_on(&conn, edge).await
    }

    /// Overwrite an edge row.
    pub async fn update_relationship(&self, edge: &Relationship) -> Result<()> {
        let conn = self.connect().await?;
        insert_relationship_on(&conn, edge).await
    }

    /// Edges touching a chunk, filtered and ordered by weight descending.
    pub async fn get_relationships(
        &self,
        chunk_id: Uuid,
        relationship_type: Option<RelationshipType>,
        min_weight: f32,
        direction: Direction,
        limit: usize,
    ) -> Result<Vec<Relationship>> {
        let conn = self.connect().await?;

        let direction_clause = match direction {
            Direction::Outgoing => "from_chunk = ?1",
            Direction::Incoming => "to_chunk = ?1",
            Direction::Both => "(from_chunk = ?1 OR to_chunk = ?1)",
        };
        let mut sql = format!(
            "SELECT {RELATIONSHIP_COLUMNS} FROM relationships \
             WHERE {direction_clause} AND weight >= ?2"
        );
        let mut query_params: Vec<libsql::Value> = vec![
            libsql::Value::Text(chunk_id.to_string()),
            libsql::Value::Real(f64::from(min_weight)),
        ];
        if let Some(ty) = relationship_type {
            sql.push_str(" AND relationship_type = ?3");
            query_params.push(libsql::Value::Text(ty.to_string()));
        }
        sql.push_str(" ORDER BY weight DESC, relationship_id");
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        sql.push_str(&format!(" LIMIT {limit}"));

        let mut result_rows = conn
            .query(&sql, libsql::params_from_iter(query_params))
            .await
            .map_err(|e| storage_err("Failed to query relationships", e))?;

        let mut edges = Vec::new();
        while let Some(row) = result_rows
            .next()
            .await
            .map_err(|e| storage_err("Failed to fetch relationship row", e))?
        {
            edges.push(row_to_relationship(&row)?);
        }
        Ok(edges)
    }

    /// Count of live edges touching a chunk.
    pub async fn relationship_count(&self, chunk_id: Uuid) -> Result<usize> {
        let conn = self.connect().await?;
        let mut result_rows = conn
            .query(
                "SELECT COUNT(*) FROM relationships WHERE from_chunk = ?1 OR to_chunk = ?1",
                params![chunk_id.to_string()],
            )
            .await
            .map_err(|e| storage_err("Failed to count relationships", e))?;

        match result_rows
            .next()
            .await
            .map_err(|e| storage_err("Failed to fetch count", e))?
        {
            Some(row) => {
                let count: i64 = row.get(0).map_err(|e| storage_err("count read", e))?;
                Ok(count as usize)
            }
            None => Ok(0),
        }
    }

    /// Move an edge to the archive and drop the live row. One transaction.
    pub async fn archive_relationship(
        &self,
        entry: &RelationshipArchiveEntry,
        relationship_id: Uuid,
    ) -> Result<()> {
        debug!("Archiving relationship: {relationship_id}");
        let conn = self.connect().await?;
        let tx = Self::begin(&conn).await?;

        tx.execute(
            r#"
            INSERT OR REPLACE INTO relationships_archive (
                relationship_id, project_id, final_weight, reason, original_data, archived_at
            ) VALUES (?, ?, ?, ?, ?, ?)
            "#,
            params![
                entry.relationship_id.to_string(),
                entry.project_id.to_string(),
                f64::from(entry.final_weight),
                entry.reason.clone(),
                serde_json::to_string(&entry.original_data)?,
                entry.archived_at.to_rfc3339(),
            ],
        )
        .await
        .map_err(|e| storage_err("Failed to write relationship archive", e))?;

        tx.execute(
            "DELETE FROM relationships WHERE relationship_id = ?",
            params![relationship_id.to_string()],
        )
        .await
        .map_err(|e| storage_err("Failed to delete relationship", e))?;

        Self::commit(tx).await
    }

    /// Append co-retrieval observations as one batch.
    pub async fn record_coretrievals(&self, records: &[CoRetrievalRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let conn = self.connect().await?;
        let tx = Self::begin(&conn).await?;
        for record in records {
            tx.execute(
                r#"
                INSERT INTO coretrieval (
                    project_id, chunk_a, chunk_b, session_id, query_context, tick, observed_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
                params![
                    record.project_id.to_string(),
                    record.chunk_a.to_string(),
                    record.chunk_b.to_string(),
                    record.session_id.to_string(),
                    record.query_context.clone(),
                    record.tick as i64,
                    record.observed_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| storage_err("Failed to record co-retrieval", e))?;
        }
        Self::commit(tx).await
    }

    /// Pairs observed at least `min_count` times.
    pub async fn coretrieval_pair_counts(
        &self,
        project_id: Uuid,
        min_count: u32,
    ) -> Result<Vec<(Uuid, Uuid, u32)>> {
        let conn = self.connect().await?;
        let mut result_rows = conn
            .query(
                r#"
                SELECT chunk_a, chunk_b, COUNT(*) AS observations
                FROM coretrieval
                WHERE project_id = ?
                GROUP BY chunk_a, chunk_b
                HAVING observations >= ?
                ORDER BY observations DESC
                "#,
                params![project_id.to_string(), i64::from(min_count)],
            )
            .await
            .map_err(|e| storage_err("Failed to query co-retrieval pairs", e))?;

        let mut pairs = Vec::new();
        while let Some(row) = result_rows
            .next()
            .await
            .map_err(|e| storage_err("Failed to fetch pair row", e))?
        {
            let a: String = row.get(0).map_err(|e| storage_err("column read", e))?;
            let b: String = row.get(1).map_err(|e| storage_err("column read", e))?;
            let count: i64 = row.get(2).map_err(|e| storage_err("column read", e))?;
            pairs.push((
                crate::rows::parse_uuid(&a)?,
                crate::rows::parse_uuid(&b)?,
                count as u32,
            ));
        }
        Ok(pairs)
    }

    /// Drop co-retrieval rows observed before the cutoff tick.
    pub async fn cleanup_coretrieval(&self, project_id: Uuid, older_than_tick: Tick) -> Result<u64> {
        let conn = self.connect().await?;
        let removed = conn
            .execute(
                "DELETE FROM coretrieval WHERE project_id = ? AND tick < ?",
                params![project_id.to_string(), older_than_tick as i64],
            )
            .await
            .map_err(|e| storage_err("Failed to clean co-retrieval", e))?;
        Ok(removed)
    }
}
