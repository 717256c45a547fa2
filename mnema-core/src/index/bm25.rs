//! In-memory BM25 keyword index.
//!
//! A standard inverted index per project: postings `term -> (chunk -> tf)`,
//! per-document lengths, and the usual BM25 scoring with k1 = 1.2 and
//! b = 0.75. Updated on chunk insert/delete; `rebuild` produces the same
//! index from the same documents in any order.

use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::types::ChunkType;

const K1: f32 = 1.2;
const B: f32 = 0.75;

/// Words carrying no ranking signal.
const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "from", "has", "have", "how",
    "i", "in", "is", "it", "its", "me", "my", "no", "not", "of", "on", "or", "our", "so", "that",
    "the", "their", "then", "there", "these", "they", "this", "to", "was", "we", "were", "what",
    "when", "which", "will", "with", "you", "your",
];

/// Lowercase Unicode word splitting with stop-word removal.
///
/// Splits on every non-alphanumeric boundary, so `snake_case` identifiers
/// and punctuation-heavy content degrade into plain word tokens.
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .filter(|t| !STOP_WORDS.contains(t))
        .map(str::to_string)
        .collect()
}

#[derive(Default)]
struct ProjectIndex {
    /// term -> chunk -> term frequency
    postings: HashMap<String, HashMap<Uuid, u32>>,
    /// chunk -> token count
    doc_lengths: HashMap<Uuid, u32>,
    /// chunk -> type, for type-filtered search
    doc_types: HashMap<Uuid, ChunkType>,
}

impl ProjectIndex {
    fn avg_doc_length(&self) -> f32 {
        if self.doc_lengths.is_empty() {
            return 0.0;
        }
        self.doc_lengths.values().sum::<u32>() as f32 / self.doc_lengths.len() as f32
    }

    fn insert(&mut self, chunk_id: Uuid, chunk_type: ChunkType, tokens: &[String]) {
        self.remove(chunk_id);
        self.doc_lengths.insert(chunk_id, tokens.len() as u32);
        self.doc_types.insert(chunk_id, chunk_type);
        for token in tokens {
            *self
                .postings
                .entry(token.clone())
                .or_default()
                .entry(chunk_id)
                .or_insert(0) += 1;
        }
    }

    fn remove(&mut self, chunk_id: Uuid) -> bool {
        let existed = self.doc_lengths.remove(&chunk_id).is_some();
        self.doc_types.remove(&chunk_id);
        if existed {
            self.postings.retain(|_, docs| {
                docs.remove(&chunk_id);
                !docs.is_empty()
            });
        }
        existed
    }

    fn search(&self, query: &str, k: usize, types: Option<&[ChunkType]>) -> Vec<(Uuid, f32)> {
        let terms = tokenize(query);
        if terms.is_empty() || self.doc_lengths.is_empty() {
            return Vec::new();
        }

        let n = self.doc_lengths.len() as f32;
        let avgdl = self.avg_doc_length();
        let unique_terms: HashSet<&String> = terms.iter().collect();

        let mut scores: HashMap<Uuid, f32> = HashMap::new();
        for term in unique_terms {
            let Some(docs) = self.postings.get(term) else {
                continue;
            };
            let df = docs.len() as f32;
            let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();

            for (&chunk_id, &tf) in docs {
                let dl = *self.doc_lengths.get(&chunk_id).unwrap_or(&0) as f32;
                let tf = tf as f32;
                let score = idf * (tf * (K1 + 1.0)) / (tf + K1 * (1.0 - B + B * dl / avgdl));
                *scores.entry(chunk_id).or_insert(0.0) += score;
            }
        }

        let mut hits: Vec<(Uuid, f32)> = scores
            .into_iter()
            .filter(|(id, _)| {
                types.is_none_or(|allowed| {
                    self.doc_types
                        .get(id)
                        .is_some_and(|ty| allowed.contains(ty))
                })
            })
            .collect();

        // Uuid tiebreak keeps equal-score ordering deterministic.
        hits.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        hits.truncate(k);
        hits
    }
}

/// Keyword index over chunk content, partitioned by project.
#[derive(Default)]
pub struct Bm25Index {
    projects: RwLock<HashMap<Uuid, ProjectIndex>>,
}

impl Bm25Index {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Index (or re-index) one chunk's content.
    pub fn insert(&self, project_id: Uuid, chunk_id: Uuid, chunk_type: ChunkType, content: &str) {
        let tokens = tokenize(content);
        self.projects
            .write()
            .entry(project_id)
            .or_default()
            .insert(chunk_id, chunk_type, &tokens);
    }

    /// Drop a chunk from the index. Returns whether it was present.
    pub fn remove(&self, project_id: Uuid, chunk_id: Uuid) -> bool {
        self.projects
            .write()
            .get_mut(&project_id)
            .is_some_and(|p| p.remove(chunk_id))
    }

    /// Ranked `(chunk_id, bm25_score)` for a query within one project.
    #[must_use]
    pub fn search(
        &self,
        project_id: Uuid,
        query: &str,
        k: usize,
        types: Option<&[ChunkType]>,
    ) -> Vec<(Uuid, f32)> {
        self.projects
            .read()
            .get(&project_id)
            .map(|p| p.search(query, k, types))
            .unwrap_or_default()
    }

    /// Replace one project's index from scratch. Deterministic: document
    /// order does not affect results.
    pub fn rebuild(&self, project_id: Uuid, docs: Vec<(Uuid, ChunkType, String)>) {
        let mut fresh = ProjectIndex::default();
        for (chunk_id, chunk_type, content) in docs {
            let tokens = tokenize(&content);
            fresh.insert(chunk_id, chunk_type, &tokens);
        }
        self.projects.write().insert(project_id, fresh);
    }

    /// Indexed document count for one project.
    #[must_use]
    pub fn project_len(&self, project_id: Uuid) -> usize {
        self.projects
            .read()
            .get(&project_id)
            .map_or(0, |p| p.doc_lengths.len())
    }
}
