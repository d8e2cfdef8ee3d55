//! Vector Search - Cosine Similarity over Stored Embeddings
//!
//! `TigerStyle`: Degenerate inputs score 0 instead of failing.

use crate::memory::{MemoryEntry, Tier};

use super::types::{MatchType, MemorySearchResult};

/// Cosine similarity, accumulated in f64.
///
/// Mismatched lengths, empty vectors and zero vectors all give 0.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let similarity = dot / (norm_a.sqrt() * norm_b.sqrt());
    if similarity.is_finite() {
        similarity.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

/// Rank entries with a usable embedding by similarity, best first.
///
/// Similarities ≤ 0 are dropped; ties keep candidate order.
pub fn rank_by_vector<'a, I>(query: &[f32], candidates: I, limit: usize) -> Vec<MemorySearchResult>
where
    I: IntoIterator<Item = (&'a MemoryEntry, Tier)>,
{
    let mut results: Vec<MemorySearchResult> = candidates
        .into_iter()
        .filter_map(|(entry, tier)| {
            let embedding = entry.usable_embedding()?;
            let similarity = cosine_similarity(query, embedding);
            (similarity > 0.0).then(|| {
                MemorySearchResult::new(entry.clone(), similarity, tier, MatchType::Vector)
            })
        })
        .collect();

    results.sort_by(|a, b| b.score.total_cmp(&a.score));
    results.truncate(limit);
    results
}
