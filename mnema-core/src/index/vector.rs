//! In-memory vector index with linear cosine search.
//!
//! One map for all projects, filtered per query. Complexity is
//! O(N_project · D) per search, which holds up to the supported chunk count;
//! nothing here is approximate.

use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

use crate::embeddings::cosine_similarity;
use crate::error::{Error, Result};

/// One persisted row of the index, used for bulk load at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorEntry {
    pub chunk_id: Uuid,
    pub project_id: Uuid,
    pub vector: Vec<f32>,
}

/// In-memory map `chunk_id -> (project_id, vector)` with a fixed dimension.
pub struct VectorIndex {
    dimensions: usize,
    entries: RwLock<HashMap<Uuid, (Uuid, Vec<f32>)>>,
}

impl VectorIndex {
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// The dimension every stored vector must have.
    #[must_use]
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Bulk load persisted rows, replacing the in-memory map.
    ///
    /// Holds the write lock for the duration, so reads block until the
    /// rebuild finishes. Any row with a drifted dimension aborts the load:
    /// a half-loaded index is worse than a refused start.
    pub fn load(&self, rows: Vec<VectorEntry>) -> Result<()> {
        let mut entries = self.entries.write();
        entries.clear();
        for row in rows {
            if row.vector.len() != self.dimensions {
                entries.clear();
                return Err(Error::StoreCorruption(format!(
                    "persisted vector for chunk {} has dimension {}, index expects {}; \
                     reproject or clear embeddings before starting",
                    row.chunk_id,
                    row.vector.len(),
                    self.dimensions
                )));
            }
            entries.insert(row.chunk_id, (row.project_id, row.vector));
        }
        tracing::info!(count = entries.len(), "vector index loaded");
        Ok(())
    }

    /// Upsert a vector.
    pub fn store(&self, chunk_id: Uuid, project_id: Uuid, vector: Vec<f32>) -> Result<()> {
        if vector.len() != self.dimensions {
            return Err(Error::DimensionMismatch {
                expected: self.dimensions,
                actual: vector.len(),
            });
        }
        self.entries.write().insert(chunk_id, (project_id, vector));
        Ok(())
    }

    /// Remove a chunk's vector. Returns whether it was present.
    pub fn remove(&self, chunk_id: Uuid) -> bool {
        self.entries.write().remove(&chunk_id).is_some()
    }

    /// Fetch a stored vector.
    #[must_use]
    pub fn get(&self, chunk_id: Uuid) -> Option<Vec<f32>> {
        self.entries.read().get(&chunk_id).map(|(_, v)| v.clone())
    }

    /// Top-k chunks within `project_id` by cosine similarity, descending,
    /// where similarity ≥ `min_sim`.
    #[must_use]
    pub fn search(
        &self,
        project_id: Uuid,
        query: &[f32],
        k: usize,
        min_sim: f32,
    ) -> Vec<(Uuid, f32)> {
        let entries = self.entries.read();
        let mut hits: Vec<(Uuid, f32)> = entries
            .iter()
            .filter(|(_, (pid, _))| *pid == project_id)
            .map(|(id, (_, v))| (*id, cosine_similarity(query, v)))
            .filter(|(_, sim)| *sim >= min_sim)
            .collect();

        hits.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(k);
        hits
    }

    /// Number of vectors for one project.
    #[must_use]
    pub fn project_len(&self, project_id: Uuid) -> usize {
        self.entries
            .read()
            .values()
            .filter(|(pid, _)| *pid == project_id)
            .count()
    }

    /// Total number of vectors held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(dim: usize, hot: usize) -> Vec<f32> {
        let mut v = vec![0.0; dim];
        v[hot] = 1.0;
        v
    }

    #[test]
    fn store_and_search_ranks_by_similarity() {
        let index = VectorIndex::new(4);
        let project = Uuid::new_v4();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        index.store(a, project, unit(4, 0)).unwrap();
        index.store(b, project, vec![0.9, 0.1, 0.0, 0.0]).unwrap();

        let hits = index.search(project, &unit(4, 0), 10, 0.0);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0, a);
        assert!((hits[0].1 - 1.0).abs() < 1e-6);
        assert!(hits[1].1 < hits[0].1);
    }

    #[test]
    fn search_is_project_scoped() {
        let index = VectorIndex::new(2);
        let p1 = Uuid::new_v4();
        let p2 = Uuid::new_v4();
        index.store(Uuid::new_v4(), p1, vec![1.0, 0.0]).unwrap();
        index.store(Uuid::new_v4(), p2, vec![1.0, 0.0]).unwrap();

        assert_eq!(index.search(p1, &[1.0, 0.0], 10, 0.0).len(), 1);
        assert_eq!(index.project_len(p1), 1);
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn min_similarity_filters() {
        let index = VectorIndex::new(2);
        let project = Uuid::new_v4();
        index.store(Uuid::new_v4(), project, vec![0.0, 1.0]).unwrap();

        let hits = index.search(project, &[1.0, 0.0], 10, 0.5);
        assert!(hits.is_empty());
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let index = VectorIndex::new(3);
        let err = index
            .store(Uuid::new_v4(), Uuid::new_v4(), vec![1.0, 0.0])
            .unwrap_err();
        assert!(matches!(
            err,
            Error::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        ));
    }

    #[test]
    fn remove_deletes_from_map() {
        let index = VectorIndex::new(2);
        let id = Uuid::new_v4();
        index.store(id, Uuid::new_v4(), vec![1.0, 0.0]).unwrap();
        assert!(index.remove(id));
        assert!(!index.remove(id));
        assert!(index.get(id).is_none());
    }

    #[test]
    fn load_replaces_and_validates() {
        let index = VectorIndex::new(2);
        let project = Uuid::new_v4();
        index
            .store(Uuid::new_v4(), project, vec![0.5, 0.5])
            .unwrap();

        let good = vec![VectorEntry {
            chunk_id: Uuid::new_v4(),
            project_id: project,
            vector: vec![1.0, 0.0],
        }];
        index.load(good).unwrap();
        assert_eq!(index.len(), 1);

        let bad = vec![VectorEntry {
            chunk_id: Uuid::new_v4(),
            project_id: project,
            vector: vec![1.0, 0.0, 0.0],
        }];
        let err = index.load(bad).unwrap_err();
        assert!(matches!(err, Error::StoreCorruption(_)));
        assert!(index.is_empty());
    }
}
