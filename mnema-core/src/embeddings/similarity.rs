//! Vector similarity.

/// Cosine similarity between two vectors, clamped to `[0, 1]`.
///
/// Mismatched or empty vectors score 0. Raw cosine lands in `[-1, 1]`;
/// retrieval scores must stay in `[0, 1]`, so negatives clamp to zero
/// rather than being rescaled — anti-correlated vectors are simply not
/// similar.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }

    (dot / (mag_a * mag_b)).clamp(0.0, 1.0)
}

/// Normalize a vector to unit length in place. Zero vectors pass through.
#[must_use]
pub fn normalize(mut vector: Vec<f32>) -> Vec<f32> {
    let magnitude = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if magnitude > 0.0 {
        for x in &mut vector {
            *x /= magnitude;
        }
    }
    vector
}
