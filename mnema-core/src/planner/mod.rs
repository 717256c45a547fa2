//! Query planner: classifies free-form queries and routes them to the right
//! subsystem.
//!
//! Operational questions go to the working-state engine, lookups to
//! tag-filtered chunk queries, connection questions to graph traversal,
//! exploration to pure semantic search, and everything else to the hybrid
//! retriever. The final hybrid scores are weighted by chunk confidence.

use regex::Regex;
use std::sync::LazyLock;

use crate::retrieval::RetrievedChunk;
use crate::types::RelationshipType;

/// Structured operational request decoded from the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationalQuery {
    BlockedTasks,
    ReadyTasks,
    OpenQuestions,
    RecentActivity,
}

/// Where a classified query is sent.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryRoute {
    /// Structured working-state readout.
    Operational(OperationalQuery),
    /// Tag-filtered chunk retrieval on the extracted terms.
    Lookup { terms: Vec<String> },
    /// Relationship traversal, optionally narrowed to one edge type.
    Connection {
        relationship_type: Option<RelationshipType>,
    },
    /// Semantic search only, with the lowered similarity floor.
    Exploration,
    /// Full hybrid pipeline.
    Hybrid,
}

/// Defaults for planner-driven hybrid retrieval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HybridDefaults {
    pub limit: usize,
    pub expand_limit: usize,
    pub min_weight: f32,
}

impl Default for HybridDefaults {
    fn default() -> Self {
        Self {
            limit: 20,
            expand_limit: 5,
            min_weight: 0.6,
        }
    }
}

static BLOCKED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bwhat'?s blocked\b|\bblocked tasks?\b").unwrap());
static READY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bready( tasks?)?\b|\bwhat can i (do|start)\b").unwrap());
static OPEN_QUESTIONS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bopen questions?\b|\bunanswered\b").unwrap());
static RECENT_ACTIVITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\brecent activity\b|\bwhat happened\b|\bactivity log\b").unwrap());

static LOOKUP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bwhat did we decide\b|\bfind the\b|\bresource for\b|\bwhere is the\b").unwrap()
});

static CONNECTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bcontradicts?\b|\bsupports?\b|\bbuilds on\b|\brelated to\b").unwrap()
});

static EXPLORATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bwhat do i know about\b|\btell me about\b|\bhow does\b.*\bwork\b").unwrap()
});

/// Words stripped before treating the remainder as lookup terms.
const LOOKUP_NOISE: &[&str] = &[
    "what", "did", "we", "decide", "about", "find", "the", "a", "an", "resource", "for", "where",
    "is", "on",
];

fn lookup_terms(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty() && !LOOKUP_NOISE.contains(w))
        .map(str::to_string)
        .collect()
}

fn connection_type(query: &str) -> Option<RelationshipType> {
    let q = query.to_lowercase();
    if q.contains("contradict") {
        Some(RelationshipType::Contradicts)
    } else if q.contains("support") {
        Some(RelationshipType::Supports)
    } else if q.contains("builds on") {
        Some(RelationshipType::BuildsOn)
    } else if q.contains("related to") {
        Some(RelationshipType::RelatedTo)
    } else {
        None
    }
}

/// Classify a query into its route.
#[must_use]
pub fn classify(query: &str) -> QueryRoute {
    if BLOCKED.is_match(query) {
        return QueryRoute::Operational(OperationalQuery::BlockedTasks);
    }
    if OPEN_QUESTIONS.is_match(query) {
        return QueryRoute::Operational(OperationalQuery::OpenQuestions);
    }
    if RECENT_ACTIVITY.is_match(query) {
        return QueryRoute::Operational(OperationalQuery::RecentActivity);
    }
    if READY.is_match(query) {
        return QueryRoute::Operational(OperationalQuery::ReadyTasks);
    }
    if LOOKUP.is_match(query) {
        return QueryRoute::Lookup {
            terms: lookup_terms(query),
        };
    }
    if CONNECTION.is_match(query) {
        return QueryRoute::Connection {
            relationship_type: connection_type(query),
        };
    }
    if EXPLORATION.is_match(query) {
        return QueryRoute::Exploration;
    }
    QueryRoute::Hybrid
}

/// Multiply hybrid scores by the confidence table and re-sort.
pub fn apply_confidence_weighting(hits: &mut Vec<RetrievedChunk>) {
    for hit in hits.iter_mut() {
        hit.score = (hit.score * hit.chunk.confidence.score_multiplier()).clamp(0.0, 1.0);
    }
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.chunk.id.cmp(&b.chunk.id))
    });
}
