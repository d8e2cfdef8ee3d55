//! Fusion - Weighted Reciprocal Rank Fusion
//!
//! `TigerStyle`: Position-based scoring, no comparison of raw scores across
//! rankers.
//!
//! ```text
//! fused(id) = Σ_lists  weight / (k + position + 1)      k = 60
//! score(id) = fused(id) / max(fused)                     top result = 1.0
//! ```

use std::collections::HashMap;

use crate::constants::SEARCH_RRF_K;

use super::types::{MatchType, MemorySearchResult};

/// Merge keyword and vector rankings.
///
/// Entries are identified by id. Ties keep first-seen order (keyword list
/// first). Every result is tagged `Hybrid`.
///
/// # Panics
/// Panics if either weight is negative.
#[must_use]
pub fn merge_hybrid_results(
    keyword: &[MemorySearchResult],
    vector: &[MemorySearchResult],
    text_weight: f64,
    vector_weight: f64,
) -> Vec<MemorySearchResult> {
    // Preconditions
    assert!(text_weight >= 0.0, "text_weight must be non-negative");
    assert!(vector_weight >= 0.0, "vector_weight must be non-negative");

    let mut order: Vec<&MemorySearchResult> = Vec::new();
    let mut fused: HashMap<&str, f64> = HashMap::new();

    for (list, weight) in [(keyword, text_weight), (vector, vector_weight)] {
        for (position, result) in list.iter().enumerate() {
            let contribution = weight / (SEARCH_RRF_K + position as f64 + 1.0);
            let id = result.entry.id.as_str();
            match fused.get_mut(id) {
                Some(score) => *score += contribution,
                None => {
                    fused.insert(id, contribution);
                    order.push(result);
                }
            }
        }
    }

    let max = fused.values().copied().fold(0.0f64, f64::max);
    let mut merged: Vec<MemorySearchResult> = order
        .into_iter()
        .map(|result| {
            let raw = fused.get(result.entry.id.as_str()).copied().unwrap_or(0.0);
            let score = if max > 0.0 { (raw / max).min(1.0) } else { 0.0 };
            MemorySearchResult::new(result.entry.clone(), score, result.tier, MatchType::Hybrid)
        })
        .collect();

    merged.sort_by(|a, b| b.score.total_cmp(&a.score));

    // Postcondition
    debug_assert!(merged.first().map_or(true, |r| max == 0.0 || r.score == 1.0));
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{EntryType, MemoryEntry, Tier};

    fn result(id: &str, match_type: MatchType) -> MemorySearchResult {
        MemorySearchResult::new(
            MemoryEntry::new(id, EntryType::Knowledge).with_id(id),
            0.5,
            Tier::Episodic,
            match_type,
        )
    }

    fn ids(results: &[MemorySearchResult]) -> Vec<&str> {
        results.iter().map(|r| r.entry.id.as_str()).collect()
    }

    #[test]
    fn test_shared_entry_ranks_first() {
        let keyword = vec![result("X", MatchType::Keyword), result("Y", MatchType::Keyword)];
        let vector = vec![result("Y", MatchType::Vector), result("Z", MatchType::Vector)];

        let merged = merge_hybrid_results(&keyword, &vector, 0.4, 0.6);
        assert_eq!(ids(&merged)[0], "Y");
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0].score, 1.0);
        assert!(merged.iter().all(|r| r.match_type == MatchType::Hybrid));
        assert!(merged.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_weights_order_single_list_entries() {
        let keyword = vec![result("K", MatchType::Keyword)];
        let vector = vec![result("V", MatchType::Vector)];

        let merged = merge_hybrid_results(&keyword, &vector, 0.4, 0.6);
        assert_eq!(ids(&merged), vec!["V", "K"]);
        assert!((merged[1].score - 0.4 / 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_both_lists_at_rank_zero_dominates() {
        let keyword = vec![
            result("B", MatchType::Keyword),
            result("K1", MatchType::Keyword),
            result("K2", MatchType::Keyword),
        ];
        let vector = vec![
            result("B", MatchType::Vector),
            result("V1", MatchType::Vector),
        ];

        let merged = merge_hybrid_results(&keyword, &vector, 0.4, 0.6);
        let both = merged.iter().find(|r| r.entry.id == "B").unwrap();
        assert!(merged.iter().all(|r| both.score >= r.score));
    }

    #[test]
    fn test_ties_keep_first_seen_order() {
        let keyword = vec![result("A", MatchType::Keyword)];
        let vector = vec![result("B", MatchType::Vector)];
        let merged = merge_hybrid_results(&keyword, &vector, 0.5, 0.5);
        assert_eq!(ids(&merged), vec!["A", "B"]);
    }

    #[test]
    fn test_empty_and_zero_weight() {
        assert!(merge_hybrid_results(&[], &[], 0.4, 0.6).is_empty());

        let keyword = vec![result("A", MatchType::Keyword)];
        let merged = merge_hybrid_results(&keyword, &[], 0.0, 1.0);
        assert_eq!(merged[0].score, 0.0);
    }
}
