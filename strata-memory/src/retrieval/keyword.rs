//! Keyword Search - FTS Query Building and In-Memory Scoring
//!
//! `TigerStyle`: Bounded token counts, scores clipped to [0, 1].

use crate::constants::{
    SEARCH_FALLBACK_COVERAGE_WEIGHT, SEARCH_FALLBACK_OCCURRENCE_BONUS,
    SEARCH_FALLBACK_OCCURRENCE_BONUS_MAX, SEARCH_FALLBACK_SCORE_FLOOR,
    SEARCH_QUERY_TOKENS_COUNT_MAX,
};
use crate::memory::{MemoryEntry, Tier};

use super::types::{MatchType, MemorySearchResult};

/// Build an FTS5 query: each whitespace token quoted (inner quotes doubled),
/// joined with `OR`, at most `SEARCH_QUERY_TOKENS_COUNT_MAX` tokens.
///
/// Returns `None` for a blank query.
#[must_use]
pub fn build_fts_query(query: &str) -> Option<String> {
    let tokens: Vec<String> = query
        .split_whitespace()
        .take(SEARCH_QUERY_TOKENS_COUNT_MAX)
        .map(|token| format!("\"{}\"", token.replace('"', "\"\"")))
        .collect();

    if tokens.is_empty() {
        None
    } else {
        Some(tokens.join(" OR "))
    }
}

/// Map an engine rank (any sign, lower is better) to (0, 1).
///
/// BM25 ranks are negative with larger magnitude for better matches, so the
/// magnitude grows with relevance.
#[must_use]
pub fn rank_to_score(rank: f64) -> f64 {
    let magnitude = rank.abs();
    if magnitude.is_nan() {
        return 0.0;
    }
    if magnitude.is_infinite() {
        return 1.0;
    }
    magnitude / (magnitude + 1.0)
}

/// Lowercased, de-duplicated query terms, capped like the FTS query.
#[must_use]
pub fn query_terms(query: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for token in query.split_whitespace().take(SEARCH_QUERY_TOKENS_COUNT_MAX) {
        let term = token.to_lowercase();
        if !terms.contains(&term) {
            terms.push(term);
        }
    }
    terms
}

/// Score content against query terms without an index.
///
/// `0.7 × coverage + min(0.3, 0.02 × occurrences) + 0.1`, clipped to [0, 1].
/// Returns `None` when no term occurs.
#[must_use]
pub fn score_content(terms: &[String], content: &str) -> Option<f64> {
    if terms.is_empty() {
        return None;
    }

    let haystack = content.to_lowercase();
    let mut matched = 0usize;
    let mut occurrences = 0usize;
    for term in terms {
        let count = haystack.matches(term.as_str()).count();
        if count > 0 {
            matched += 1;
            occurrences += count;
        }
    }
    if matched == 0 {
        return None;
    }

    let coverage = matched as f64 / terms.len() as f64;
    let bonus = (SEARCH_FALLBACK_OCCURRENCE_BONUS * occurrences as f64)
        .min(SEARCH_FALLBACK_OCCURRENCE_BONUS_MAX);
    let score = SEARCH_FALLBACK_COVERAGE_WEIGHT * coverage + bonus + SEARCH_FALLBACK_SCORE_FLOOR;

    Some(score.clamp(0.0, 1.0))
}

/// Rank entries with `score_content`, best first, at most `limit`.
///
/// Ties keep candidate order.
pub fn rank_in_memory<'a, I>(query: &str, candidates: I, limit: usize) -> Vec<MemorySearchResult>
where
    I: IntoIterator<Item = (&'a MemoryEntry, Tier)>,
{
    let terms = query_terms(query);
    let mut results: Vec<MemorySearchResult> = candidates
        .into_iter()
        .filter_map(|(entry, tier)| {
            score_content(&terms, &entry.content).map(|score| {
                MemorySearchResult::new(entry.clone(), score, tier, MatchType::Keyword)
            })
        })
        .collect();

    results.sort_by(|a, b| b.score.total_cmp(&a.score));
    results.truncate(limit);
    results
}
