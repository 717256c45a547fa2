//! Edge and co-retrieval record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{RelationshipOrigin, RelationshipType, Tick};

/// Directed typed edge between two chunks. Unique per `(from, to, type)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub id: Uuid,
    pub project_id: Uuid,
    pub from: Uuid,
    pub to: Uuid,
    pub relationship_type: RelationshipType,
    pub weight: f32,
    pub last_activated: DateTime<Utc>,
    pub activation_count: u32,
    pub context_tags: Vec<String>,
    pub origin: RelationshipOrigin,
    pub created_at: DateTime<Utc>,
}

impl Relationship {
    #[must_use]
    pub fn new(
        project_id: Uuid,
        from: Uuid,
        to: Uuid,
        relationship_type: RelationshipType,
        weight: f32,
        context_tags: Vec<String>,
        origin: RelationshipOrigin,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            project_id,
            from,
            to,
            relationship_type,
            weight: weight.clamp(0.0, 1.0),
            last_activated: now,
            activation_count: 0,
            context_tags,
            origin,
            created_at: now,
        }
    }
}

/// Which edges to follow from a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outgoing,
    Incoming,
    Both,
}

/// Ephemeral observation that two chunks appeared in one retrieval result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoRetrievalRecord {
    pub project_id: Uuid,
    /// Smaller id first; pairs are unordered.
    pub chunk_a: Uuid,
    pub chunk_b: Uuid,
    pub session_id: Uuid,
    pub query_context: String,
    pub tick: Tick,
    pub observed_at: DateTime<Utc>,
}

impl CoRetrievalRecord {
    /// Build a record with the pair in canonical order.
    #[must_use]
    pub fn observed(
        project_id: Uuid,
        a: Uuid,
        b: Uuid,
        session_id: Uuid,
        query_context: &str,
        tick: Tick,
    ) -> Self {
        let (chunk_a, chunk_b) = if a <= b { (a, b) } else { (b, a) };
        Self {
            project_id,
            chunk_a,
            chunk_b,
            session_id,
            query_context: query_context.to_string(),
            tick,
            observed_at: Utc::now(),
        }
    }
}
