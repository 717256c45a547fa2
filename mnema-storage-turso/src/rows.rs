//! Row-to-entity conversion.
//!
//! Column lists here are the single source of truth for the SELECTs in the
//! operation modules; converters index positionally against them.

use chrono::{DateTime, Utc};
use libsql::Row;
use mnema_core::chunk::{Chunk, LearningContext};
use mnema_core::error::{Error, Result};
use mnema_core::graph::Relationship;
use mnema_core::types::{
    Activity, AgentState, ChunkArchiveEntry, CoherenceWarning, Goal, Orientation, PendingGoal,
    Question, Task,
};
use std::collections::BTreeSet;
use std::str::FromStr;
use uuid::Uuid;

/// Chunk column list shared by every chunk SELECT.
pub const CHUNK_COLUMNS: &str = "chunk_id, project_id, content, chunk_type, tags, confidence, \
     source, created_at, last_accessed, last_useful, tick_created, tick_last_accessed, \
     tick_last_useful, learning_context, initial_strength, current_strength, decay_function, \
     decay_rate, persistence_score, access_count, successful_uses, status, pinned, \
     superseded_by, valid_until_tick, embedding_pending";

/// Relationship column list shared by every relationship SELECT.
pub const RELATIONSHIP_COLUMNS: &str = "relationship_id, project_id, from_chunk, to_chunk, \
     relationship_type, weight, last_activated, activation_count, context_tags, origin, created_at";

/// Task column list shared by every task SELECT.
pub const TASK_COLUMNS: &str = "task_id, project_id, title, description, skill_area, status, \
     depends_on, blocked_by, outcome, created_at, updated_at, started_at, completed_at, \
     failed_at, failure_reason, failure_context";

pub(crate) fn storage_err(context: &str, err: impl std::fmt::Display) -> Error {
    Error::Storage(format!("{context}: {err}"))
}

pub(crate) fn get_string(row: &Row, idx: i32) -> Result<String> {
    row.get(idx).map_err(|e| storage_err("column read", e))
}

pub(crate) fn get_opt_string(row: &Row, idx: i32) -> Option<String> {
    row.get::<String>(idx).ok()
}

pub(crate) fn get_i64(row: &Row, idx: i32) -> Result<i64> {
    row.get(idx).map_err(|e| storage_err("column read", e))
}

pub(crate) fn get_opt_i64(row: &Row, idx: i32) -> Option<i64> {
    row.get::<i64>(idx).ok()
}

pub(crate) fn get_f64(row: &Row, idx: i32) -> Result<f64> {
    row.get(idx).map_err(|e| storage_err("column read", e))
}

pub(crate) fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| storage_err("invalid uuid", e))
}

pub(crate) fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| storage_err("invalid timestamp", e))
}

pub(crate) fn parse_opt_datetime(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
    s.map(|s| parse_datetime(&s)).transpose()
}

fn parse_enum<T: FromStr<Err = String>>(s: &str) -> Result<T> {
    T::from_str(s).map_err(Error::InvalidInput)
}

fn parse_json<T: serde::de::DeserializeOwned>(context: &str, s: &str) -> Result<T> {
    serde_json::from_str(s).map_err(|e| storage_err(context, e))
}

/// Little-endian f32 encoding for the embedding blob column.
pub(crate) fn vector_to_blob(vector: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(vector.len() * 4);
    for value in vector {
        blob.extend_from_slice(&value.to_le_bytes());
    }
    blob
}

pub(crate) fn blob_to_vector(blob: &[u8]) -> Result<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return Err(Error::StoreCorruption(format!(
            "embedding blob length {} is not a multiple of 4",
            blob.len()
        )));
    }
    Ok(blob
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

pub(crate) fn row_to_chunk(row: &Row) -> Result<Chunk> {
    let id = parse_uuid(&get_string(row, 0)?)?;
    let project_id = parse_uuid(&get_string(row, 1)?)?;
    let tags: Vec<String> = parse_json("chunk tags", &get_string(row, 4)?)?;
    let learning_context: LearningContext =
        parse_json("learning context", &get_string(row, 13)?)?;

    Ok(Chunk {
        id,
        project_id,
        content: get_string(row, 2)?,
        chunk_type: parse_enum(&get_string(row, 3)?)?,
        tags: tags.into_iter().collect::<BTreeSet<_>>(),
        confidence: parse_enum(&get_string(row, 5)?)?,
        source: parse_enum(&get_string(row, 6)?)?,
        created_at: parse_datetime(&get_string(row, 7)?)?,
        last_accessed: parse_datetime(&get_string(row, 8)?)?,
        last_useful: parse_opt_datetime(get_opt_string(row, 9))?,
        tick_created: get_i64(row, 10)? as u64,
        tick_last_accessed: get_opt_i64(row, 11).map(|t| t as u64),
        tick_last_useful: get_opt_i64(row, 12).map(|t| t as u64),
        learning_context,
        initial_strength: get_f64(row, 14)? as f32,
        current_strength: get_f64(row, 15)? as f32,
        decay_function: parse_enum(&get_string(row, 16)?)?,
        decay_rate: get_f64(row, 17)? as f32,
        persistence_score: get_f64(row, 18)? as f32,
        access_count: get_i64(row, 19)? as u32,
        successful_uses: get_i64(row, 20)? as u32,
        status: parse_enum(&get_string(row, 21)?)?,
        pinned: get_i64(row, 22)? != 0,
        superseded_by: get_opt_string(row, 23).map(|s| parse_uuid(&s)).transpose()?,
        valid_until_tick: get_opt_i64(row, 24).map(|t| t as u64),
        embedding_pending: get_i64(row, 25)? != 0,
    })
}

pub(crate) fn row_to_relationship(row: &Row) -> Result<Relationship> {
    let context_tags: Vec<String> = parse_json("context tags", &get_string(row, 8)?)?;
    Ok(Relationship {
        id: parse_uuid(&get_string(row, 0)?)?,
        project_id: parse_uuid(&get_string(row, 1)?)?,
        from: parse_uuid(&get_string(row, 2)?)?,
        to: parse_uuid(&get_string(row, 3)?)?,
        relationship_type: parse_enum(&get_string(row, 4)?)?,
        weight: get_f64(row, 5)? as f32,
        last_activated: parse_datetime(&get_string(row, 6)?)?,
        activation_count: get_i64(row, 7)? as u32,
        context_tags,
        origin: parse_enum(&get_string(row, 9)?)?,
        created_at: parse_datetime(&get_string(row, 10)?)?,
    })
}

pub(crate) fn row_to_task(row: &Row) -> Result<Task> {
    let depends_on: Vec<Uuid> = parse_json("depends_on", &get_string(row, 6)?)?;
    let blocked_by: Vec<Uuid> = parse_json("blocked_by", &get_string(row, 7)?)?;
    let failure_context = get_opt_string(row, 15)
        .map(|s| parse_json::<serde_json::Value>("failure context", &s))
        .transpose()?;

    Ok(Task {
        id: parse_uuid(&get_string(row, 0)?)?,
        project_id: parse_uuid(&get_string(row, 1)?)?,
        title: get_string(row, 2)?,
        description: get_string(row, 3)?,
        skill_area: get_opt_string(row, 4),
        status: parse_enum(&get_string(row, 5)?)?,
        depends_on: depends_on.into_iter().collect(),
        blocked_by: blocked_by.into_iter().collect(),
        outcome: get_opt_string(row, 8),
        created_at: parse_datetime(&get_string(row, 9)?)?,
        updated_at: parse_datetime(&get_string(row, 10)?)?,
        started_at: parse_opt_datetime(get_opt_string(row, 11))?,
        completed_at: parse_opt_datetime(get_opt_string(row, 12))?,
        failed_at: parse_opt_datetime(get_opt_string(row, 13))?,
        failure_reason: get_opt_string(row, 14),
        failure_context,
    })
}

pub(crate) fn row_to_question(row: &Row) -> Result<Question> {
    let blocks_tasks: Vec<Uuid> = parse_json("blocks_tasks", &get_string(row, 6)?)?;
    Ok(Question {
        id: parse_uuid(&get_string(row, 0)?)?,
        project_id: parse_uuid(&get_string(row, 1)?)?,
        text: get_string(row, 2)?,
        context: get_opt_string(row, 3),
        status: parse_enum(&get_string(row, 4)?)?,
        answer: get_opt_string(row, 5),
        blocks_tasks,
        asked_at: parse_datetime(&get_string(row, 7)?)?,
        answered_at: parse_opt_datetime(get_opt_string(row, 8))?,
    })
}

pub(crate) fn row_to_goal(row: &Row) -> Result<Goal> {
    Ok(Goal {
        id: parse_uuid(&get_string(row, 0)?)?,
        project_id: parse_uuid(&get_string(row, 1)?)?,
        goal_text: get_string(row, 2)?,
        active: get_i64(row, 3)? != 0,
        created_at: parse_datetime(&get_string(row, 4)?)?,
        completed_at: parse_opt_datetime(get_opt_string(row, 5))?,
        outcome: get_opt_string(row, 6),
    })
}

pub(crate) fn row_to_pending_goal(row: &Row) -> Result<PendingGoal> {
    Ok(PendingGoal {
        project_id: parse_uuid(&get_string(row, 0)?)?,
        goal_text: get_string(row, 1)?,
        queued_at: parse_datetime(&get_string(row, 2)?)?,
    })
}

pub(crate) fn row_to_activity(row: &Row) -> Result<Activity> {
    Ok(Activity {
        id: parse_uuid(&get_string(row, 0)?)?,
        project_id: parse_uuid(&get_string(row, 1)?)?,
        action: get_string(row, 2)?,
        details: parse_json("activity details", &get_string(row, 3)?)?,
        timestamp: parse_datetime(&get_string(row, 4)?)?,
    })
}

pub(crate) fn row_to_orientation(row: &Row) -> Result<Orientation> {
    // The whole snapshot lives in the data column; version and
    // last_rewritten columns exist for cheap queries.
    parse_json("orientation", &get_string(row, 0)?)
}

pub(crate) fn row_to_agent_state(row: &Row) -> Result<AgentState> {
    Ok(AgentState {
        project_id: parse_uuid(&get_string(row, 0)?)?,
        current_tick: get_i64(row, 1)? as u64,
        last_decay_tick: get_i64(row, 2)? as u64,
        last_consolidation_tick: get_i64(row, 3)? as u64,
    })
}

pub(crate) fn row_to_chunk_archive(row: &Row) -> Result<ChunkArchiveEntry> {
    Ok(ChunkArchiveEntry {
        chunk_id: parse_uuid(&get_string(row, 0)?)?,
        project_id: parse_uuid(&get_string(row, 1)?)?,
        summary: get_string(row, 2)?,
        content_hash: get_string(row, 3)?,
        final_strength: get_f64(row, 4)? as f32,
        tick_archived: get_i64(row, 5)? as u64,
    })
}

pub(crate) fn row_to_coherence_warning(row: &Row) -> Result<CoherenceWarning> {
    Ok(CoherenceWarning {
        id: parse_uuid(&get_string(row, 0)?)?,
        project_id: parse_uuid(&get_string(row, 1)?)?,
        new_chunk_id: parse_uuid(&get_string(row, 2)?)?,
        existing_chunk_id: parse_uuid(&get_string(row, 3)?)?,
        confidence: get_f64(row, 4)? as f32,
        conflict_type: get_string(row, 5)?,
        explanation: get_string(row, 6)?,
        created_at: parse_datetime(&get_string(row, 7)?)?,
    })
}
