//! Weighted reciprocal rank fusion over the retrieval legs.

use std::collections::HashMap;
use uuid::Uuid;

/// RRF smoothing constant.
const RRF_K: f32 = 60.0;

/// One ranked leg with its fusion weight. Entries are in rank order.
pub struct RankedLeg<'a> {
    pub weight: f32,
    pub entries: &'a [(Uuid, f32)],
}

/// Fuse rankings into `(chunk_id, fused_score)` sorted descending.
///
/// Weights are renormalized over the legs actually present, so a keyword-only
/// fallback still produces scores on the same scale.
#[must_use]
pub fn reciprocal_rank_fusion(legs: &[RankedLeg<'_>]) -> Vec<(Uuid, f32)> {
    let active_weight: f32 = legs
        .iter()
        .filter(|leg| !leg.entries.is_empty())
        .map(|leg| leg.weight)
        .sum();
    if active_weight <= 0.0 {
        return Vec::new();
    }

    let mut fused: HashMap<Uuid, f32> = HashMap::new();
    for leg in legs {
        if leg.entries.is_empty() {
            continue;
        }
        let weight = leg.weight / active_weight;
        for (rank, (id, _)) in leg.entries.iter().enumerate() {
            *fused.entry(*id).or_insert(0.0) += weight / (RRF_K + rank as f32 + 1.0);
        }
    }

    let mut out: Vec<(Uuid, f32)> = fused.into_iter().collect();
    out.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    out
}
