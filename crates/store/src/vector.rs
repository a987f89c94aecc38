//! Vector similarity and ranking.
//!
//! Stored embeddings are unit-norm, so similarity is a plain dot product.

use serde::{Deserialize, Serialize};

/// One ranked search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Display string of the matching entry
    pub text: String,
    /// Similarity to the query, in [-1, 1]
    pub score: f32,
}

/// Dot product of two vectors.
///
/// Returns 0.0 if the lengths differ or either vector is empty.
pub fn similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| *x as f64 * *y as f64)
        .sum();
    dot as f32
}

/// Rank `(text, embedding)` candidates against a query embedding.
///
/// Sorted by descending score, scores below `threshold` dropped, at most
/// `limit` returned.
pub fn rank<'a, I>(candidates: I, query: &[f32], limit: usize, threshold: f32) -> Vec<SearchHit>
where
    I: IntoIterator<Item = (&'a str, &'a [f32])>,
{
    let mut hits: Vec<SearchHit> = candidates
        .into_iter()
        .map(|(text, embedding)| SearchHit {
            text: text.to_string(),
            score: similarity(query, embedding),
        })
        .filter(|hit| hit.score >= threshold)
        .collect();

    hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    hits.truncate(limit);
    hits
}
