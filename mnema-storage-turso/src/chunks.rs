//! Chunk and embedding storage operations.

use libsql::{params, Connection, Value};
use mnema_core::chunk::Chunk;
use mnema_core::error::{Error, Result};
use mnema_core::graph::Relationship;
use mnema_core::index::VectorEntry;
use mnema_core::types::ChunkArchiveEntry;
use tracing::debug;
use uuid::Uuid;

use crate::rows::{
    self, blob_to_vector, parse_uuid, row_to_chunk, row_to_chunk_archive, storage_err,
    vector_to_blob, CHUNK_COLUMNS,
};
use crate::TursoStorage;

fn opt_text(value: Option<String>) -> Value {
    value.map_or(Value::Null, Value::Text)
}

fn opt_int(value: Option<i64>) -> Value {
    value.map_or(Value::Null, Value::Integer)
}

/// Positional parameter list matching `CHUNK_COLUMNS`.
fn chunk_values(chunk: &Chunk) -> Result<Vec<Value>> {
    let tags: Vec<&String> = chunk.tags.iter().collect();
    Ok(vec![
        Value::Text(chunk.id.to_string()),
        Value::Text(chunk.project_id.to_string()),
        Value::Text(chunk.content.clone()),
        Value::Text(chunk.chunk_type.to_string()),
        Value::Text(serde_json::to_string(&tags)?),
        Value::Text(chunk.confidence.to_string()),
        Value::Text(chunk.source.to_string()),
        Value::Text(chunk.created_at.to_rfc3339()),
        Value::Text(chunk.last_accessed.to_rfc3339()),
        opt_text(chunk.last_useful.map(|t| t.to_rfc3339())),
        Value::Integer(chunk.tick_created as i64),
        opt_int(chunk.tick_last_accessed.map(|t| t as i64)),
        opt_int(chunk.tick_last_useful.map(|t| t as i64)),
        Value::Text(serde_json::to_string(&chunk.learning_context)?),
        Value::Real(f64::from(chunk.initial_strength)),
        Value::Real(f64::from(chunk.current_strength)),
        Value::Text(chunk.decay_function.to_string()),
        Value::Real(f64::from(chunk.decay_rate)),
        Value::Real(f64::from(chunk.persistence_score)),
        Value::Integer(i64::from(chunk.access_count)),
        Value::Integer(i64::from(chunk.successful_uses)),
        Value::Text(chunk.status.to_string()),
        Value::Integer(i64::from(chunk.pinned)),
        opt_text(chunk.superseded_by.map(|id| id.to_string())),
        opt_int(chunk.valid_until_tick.map(|t| t as i64)),
        Value::Integer(i64::from(chunk.embedding_pending)),
    ])
}

const INSERT_CHUNK_SQL: &str = r#"
    INSERT OR REPLACE INTO chunks (
        chunk_id, project_id, content, chunk_type, tags, confidence, source,
        created_at, last_accessed, last_useful, tick_created, tick_last_accessed,
        tick_last_useful, learning_context, initial_strength, current_strength,
        decay_function, decay_rate, persistence_score, access_count,
        successful_uses, status, pinned, superseded_by, valid_until_tick,
        embedding_pending
    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

const INSERT_EMBEDDING_SQL: &str = r#"
    INSERT OR REPLACE INTO chunk_embeddings (chunk_id, project_id, vector)
    VALUES (?, ?, ?)
"#;

/// Write a chunk row on an existing connection or transaction.
pub(crate) async fn insert_chunk_on(conn: &Connection, chunk: &Chunk) -> Result<()> {
    conn.execute(INSERT_CHUNK_SQL, libsql::params_from_iter(chunk_values(chunk)?))
        .await
        .map_err(|e| storage_err("Failed to store chunk", e))?;
    Ok(())
}

async fn write_chunk(conn: &Connection, chunk: &Chunk) -> Result<()> {
    insert_chunk_on(conn, chunk).await
}

async fn write_embedding(conn: &Connection, chunk: &Chunk, vector: &[f32]) -> Result<()> {
    conn.execute(
        INSERT_EMBEDDING_SQL,
        params![
            chunk.id.to_string(),
            chunk.project_id.to_string(),
            vector_to_blob(vector),
        ],
    )
    .await
    .map_err(|e| storage_err("Failed to store embedding", e))?;
    Ok(())
}

async fn write_relationship(conn: &Connection, edge: &Relationship) -> Result<()> {
    crate::graph::insert_relationship_on(conn, edge).await
}

impl TursoStorage {
    /// Insert a chunk and its embedding in one transaction.
    pub async fn insert_chunk(&self, chunk: &Chunk, embedding: Option<&[f32]>) -> Result<()> {
        debug!("Storing chunk: {}", chunk.id);
        let conn = self.connect().await?;
        let tx = Self::begin(&conn).await?;
        write_chunk(&tx, chunk).await?;
        if let Some(vector) = embedding {
            write_embedding(&tx, chunk, vector).await?;
        }
        Self::commit(tx).await
    }

    /// Supersede path: new chunk, retired chunk update, and the
    /// contradicts edge in one transaction.
    pub async fn insert_chunk_superseding(
        &self,
        chunk: &Chunk,
        embedding: Option<&[f32]>,
        superseded: &Chunk,
        edge: &Relationship,
    ) -> Result<()> {
        debug!(
            "Storing chunk {} superseding {}",
            chunk.id, superseded.id
        );
        let conn = self.connect().await?;
        let tx = Self::begin(&conn).await?;
        write_chunk(&tx, chunk).await?;
        if let Some(vector) = embedding {
            write_embedding(&tx, chunk, vector).await?;
        }
        write_chunk(&tx, superseded).await?;
        write_relationship(&tx, edge).await?;
        Self::commit(tx).await
    }

    /// Retrieve a chunk by id.
    pub async fn get_chunk(&self, id: Uuid) -> Result<Option<Chunk>> {
        let conn = self.connect().await?;
        let sql = format!("SELECT {CHUNK_COLUMNS} FROM chunks WHERE chunk_id = ?");
        let mut result_rows = conn
            .query(&sql, params![id.to_string()])
            .await
            .map_err(|e| storage_err("Failed to query chunk", e))?;

        match result_rows
            .next()
            .await
            .map_err(|e| storage_err("Failed to fetch chunk row", e))?
        {
            Some(row) => Ok(Some(row_to_chunk(&row)?)),
            None => Ok(None),
        }
    }

    /// Fetch many chunks; missing ids are skipped.
    pub async fn get_chunks(&self, ids: &[Uuid]) -> Result<Vec<Chunk>> {
        let mut chunks = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(chunk) = self.get_chunk(*id).await? {
                chunks.push(chunk);
            }
        }
        Ok(chunks)
    }

    /// Overwrite a chunk row.
    pub async fn update_chunk(&self, chunk: &Chunk) -> Result<()> {
        let conn = self.connect().await?;
        write_chunk(&conn, chunk).await
    }

    /// Batch chunk update in one transaction (decay sweeps).
    pub async fn update_chunks(&self, chunks: &[Chunk]) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }
        let conn = self.connect().await?;
        let tx = Self::begin(&conn).await?;
        for chunk in chunks {
            write_chunk(&tx, chunk).await?;
        }
        Self::commit(tx).await
    }

    /// Every chunk of a project, tombstones included.
    pub async fn list_chunks(&self, project_id: Uuid) -> Result<Vec<Chunk>> {
        let conn = self.connect().await?;
        let sql = format!(
            "SELECT {CHUNK_COLUMNS} FROM chunks WHERE project_id = ? ORDER BY created_at"
        );
        self.collect_chunks(&conn, &sql, params![project_id.to_string()])
            .await
    }

    /// Non-tombstoned chunks carrying an exact tag.
    pub async fn list_chunks_by_tag(&self, project_id: Uuid, tag: &str) -> Result<Vec<Chunk>> {
        let conn = self.connect().await?;
        let sql = format!(
            "SELECT {CHUNK_COLUMNS} FROM chunks \
             WHERE project_id = ? AND status != 'tombstone' AND tags LIKE '%' || ? || '%'"
        );
        let needle = format!("\"{tag}\"");
        let candidates = self
            .collect_chunks(&conn, &sql, params![project_id.to_string(), needle])
            .await?;

        // LIKE over JSON text is approximate; confirm against the parsed set.
        Ok(candidates
            .into_iter()
            .filter(|c| c.tags.contains(tag))
            .collect())
    }

    /// Chunks written while the embedding provider was down.
    pub async fn list_chunks_pending_embedding(&self, project_id: Uuid) -> Result<Vec<Chunk>> {
        let conn = self.connect().await?;
        let sql = format!(
            "SELECT {CHUNK_COLUMNS} FROM chunks \
             WHERE project_id = ? AND embedding_pending = 1 AND status != 'tombstone'"
        );
        self.collect_chunks(&conn, &sql, params![project_id.to_string()])
            .await
    }

    /// Tombstone transition: archive row, chunk row update, embedding
    /// removal. One transaction.
    pub async fn archive_chunk(&self, entry: &ChunkArchiveEntry, chunk: &Chunk) -> Result<()> {
        debug!("Archiving chunk: {}", chunk.id);
        let conn = self.connect().await?;
        let tx = Self::begin(&conn).await?;

        tx.execute(
            r#"
            INSERT OR REPLACE INTO chunks_archive (
                chunk_id, project_id, summary, content_hash, final_strength, tick_archived
            ) VALUES (?, ?, ?, ?, ?, ?)
            "#,
            params![
                entry.chunk_id.to_string(),
                entry.project_id.to_string(),
                entry.summary.clone(),
                entry.content_hash.clone(),
                f64::from(entry.final_strength),
                entry.tick_archived as i64,
            ],
        )
        .await
        .map_err(|e| storage_err("Failed to write chunk archive", e))?;

        write_chunk(&tx, chunk).await?;

        tx.execute(
            "DELETE FROM chunk_embeddings WHERE chunk_id = ?",
            params![chunk.id.to_string()],
        )
        .await
        .map_err(|e| storage_err("Failed to delete embedding", e))?;

        Self::commit(tx).await
    }

    /// Fetch a chunk's archive row.
    pub async fn get_chunk_archive(&self, chunk_id: Uuid) -> Result<Option<ChunkArchiveEntry>> {
        let conn = self.connect().await?;
        let mut result_rows = conn
            .query(
                "SELECT chunk_id, project_id, summary, content_hash, final_strength, \
                 tick_archived FROM chunks_archive WHERE chunk_id = ?",
                params![chunk_id.to_string()],
            )
            .await
            .map_err(|e| storage_err("Failed to query chunk archive", e))?;

        match result_rows
            .next()
            .await
            .map_err(|e| storage_err("Failed to fetch archive row", e))?
        {
            Some(row) => Ok(Some(row_to_chunk_archive(&row)?)),
            None => Ok(None),
        }
    }

    /// Upsert an embedding and clear the pending flag.
    pub async fn store_embedding(&self, chunk_id: Uuid, vector: &[f32]) -> Result<()> {
        let conn = self.connect().await?;
        let Some(chunk) = self.get_chunk(chunk_id).await? else {
            return Err(Error::NotFound(chunk_id));
        };

        let tx = Self::begin(&conn).await?;
        write_embedding(&tx, &chunk, vector).await?;
        tx.execute(
            "UPDATE chunks SET embedding_pending = 0 WHERE chunk_id = ?",
            params![chunk_id.to_string()],
        )
        .await
        .map_err(|e| storage_err("Failed to clear pending flag", e))?;
        Self::commit(tx).await
    }

    /// Fetch one persisted embedding.
    pub async fn get_embedding(&self, chunk_id: Uuid) -> Result<Option<Vec<f32>>> {
        let conn = self.connect().await?;
        let mut result_rows = conn
            .query(
                "SELECT vector FROM chunk_embeddings WHERE chunk_id = ?",
                params![chunk_id.to_string()],
            )
            .await
            .map_err(|e| storage_err("Failed to query embedding", e))?;

        match result_rows
            .next()
            .await
            .map_err(|e| storage_err("Failed to fetch embedding row", e))?
        {
            Some(row) => {
                let blob: Vec<u8> = row.get(0).map_err(|e| storage_err("blob read", e))?;
                Ok(Some(blob_to_vector(&blob)?))
            }
            None => Ok(None),
        }
    }

    /// All persisted embeddings, for the startup index rebuild.
    pub async fn load_all_embeddings(&self) -> Result<Vec<VectorEntry>> {
        let conn = self.connect().await?;
        let mut result_rows = conn
            .query(
                "SELECT chunk_id, project_id, vector FROM chunk_embeddings",
                (),
            )
            .await
            .map_err(|e| storage_err("Failed to query embeddings", e))?;

        let mut entries = Vec::new();
        while let Some(row) = result_rows
            .next()
            .await
            .map_err(|e| storage_err("Failed to fetch embedding row", e))?
        {
            let chunk_id: String = row.get(0).map_err(|e| storage_err("column read", e))?;
            let project_id: String = row.get(1).map_err(|e| storage_err("column read", e))?;
            let blob: Vec<u8> = row.get(2).map_err(|e| storage_err("blob read", e))?;
            entries.push(VectorEntry {
                chunk_id: parse_uuid(&chunk_id)?,
                project_id: parse_uuid(&project_id)?,
                vector: blob_to_vector(&blob)?,
            });
        }
        debug!("Loaded {} persisted embeddings", entries.len());
        Ok(entries)
    }

    async fn collect_chunks(
        &self,
        conn: &Connection,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Vec<Chunk>> {
        let mut result_rows = conn
            .query(sql, params)
            .await
            .map_err(|e| storage_err("Failed to query chunks", e))?;

        let mut chunks = Vec::new();
        while let Some(row) = result_rows
            .next()
            .await
            .map_err(|e| storage_err("Failed to fetch chunk row", e))?
        {
            chunks.push(rows::row_to_chunk(&row)?);
        }
        Ok(chunks)
    }
}
