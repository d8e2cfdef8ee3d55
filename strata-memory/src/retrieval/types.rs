//! Retrieval Types - Search Options and Results
//!
//! `TigerStyle`: Type-safe options, explicit validation.

use serde::Serialize;

use crate::constants::{
    SEARCH_MIN_SCORE_DEFAULT, SEARCH_TEXT_WEIGHT_DEFAULT, SEARCH_VECTOR_WEIGHT_DEFAULT,
};
use crate::memory::{MemoryEntry, Tier};

// =============================================================================
// Results
// =============================================================================

/// Which ranking produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    /// Full-text or in-memory keyword scoring
    Keyword,
    /// Cosine similarity
    Vector,
    /// Reciprocal rank fusion of both
    Hybrid,
}

/// One ranked search hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemorySearchResult {
    /// The matching entry
    pub entry: MemoryEntry,
    /// Relevance in [0, 1]
    pub score: f64,
    /// Tier the entry lives in
    pub tier: Tier,
    /// Ranking that produced the score
    pub match_type: MatchType,
}

impl MemorySearchResult {
    /// Create a result.
    ///
    /// # Panics
    /// Panics if `score` is outside [0, 1].
    #[must_use]
    pub fn new(entry: MemoryEntry, score: f64, tier: Tier, match_type: MatchType) -> Self {
        // Precondition
        assert!(
            (0.0..=1.0).contains(&score),
            "score must be in [0, 1], got {score}"
        );
        Self {
            entry,
            score,
            tier,
            match_type,
        }
    }
}

// =============================================================================
// Hybrid Search Options
// =============================================================================

/// Options for `hybrid_search`.
///
/// `TigerStyle`: Builder pattern with validation.
#[derive(Debug, Clone)]
pub struct HybridSearchOptions {
    /// Query vector; without it the search is keyword-only
    pub query_embedding: Option<Vec<f32>>,
    /// Tiers to search
    pub tiers: Vec<Tier>,
    /// Result cap (`None` = the manager's `max_results`)
    pub max_results: Option<usize>,
    /// Results scoring below this are dropped
    pub min_score: f64,
    /// Fusion weight of the vector list
    pub vector_weight: f64,
    /// Fusion weight of the keyword list
    pub text_weight: f64,
}

impl Default for HybridSearchOptions {
    fn default() -> Self {
        Self {
            query_embedding: None,
            tiers: Tier::DURABLE.to_vec(),
            max_results: None,
            min_score: SEARCH_MIN_SCORE_DEFAULT,
            vector_weight: SEARCH_VECTOR_WEIGHT_DEFAULT,
            text_weight: SEARCH_TEXT_WEIGHT_DEFAULT,
        }
    }
}

impl HybridSearchOptions {
    /// Create options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the query embedding.
    #[must_use]
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.query_embedding = Some(embedding);
        self
    }

    /// Restrict the tiers searched.
    #[must_use]
    pub fn with_tiers(mut self, tiers: impl Into<Vec<Tier>>) -> Self {
        self.tiers = tiers.into();
        self
    }

    /// Set the result cap.
    ///
    /// # Panics
    /// Panics if `max_results` is zero.
    #[must_use]
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        // Precondition
        assert!(max_results > 0, "max_results must be positive");
        self.max_results = Some(max_results);
        self
    }

    /// Set the minimum score.
    ///
    /// # Panics
    /// Panics if `min_score` is outside [0, 1].
    #[must_use]
    pub fn with_min_score(mut self, min_score: f64) -> Self {
        // Precondition
        assert!(
            (0.0..=1.0).contains(&min_score),
            "min_score must be in [0, 1], got {min_score}"
        );
        self.min_score = min_score;
        self
    }

    /// Set fusion weights.
    ///
    /// # Panics
    /// Panics if either weight is negative.
    #[must_use]
    pub fn with_weights(mut self, vector_weight: f64, text_weight: f64) -> Self {
        // Precondition
        assert!(
            vector_weight >= 0.0 && text_weight >= 0.0,
            "weights must be non-negative"
        );
        self.vector_weight = vector_weight;
        self.text_weight = text_weight;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::EntryType;

    #[test]
    fn test_defaults() {
        let options = HybridSearchOptions::default();
        assert!(options.query_embedding.is_none());
        assert_eq!(options.tiers, vec![Tier::Episodic, Tier::Semantic]);
        assert!((options.vector_weight - 0.6).abs() < f64::EPSILON);
        assert!((options.text_weight - 0.4).abs() < f64::EPSILON);
        assert_eq!(options.min_score, 0.0);
    }

    #[test]
    fn test_builder() {
        let options = HybridSearchOptions::new()
            .with_embedding(vec![1.0, 0.0])
            .with_tiers([Tier::Semantic])
            .with_max_results(3)
            .with_min_score(0.2)
            .with_weights(1.0, 0.0);

        assert_eq!(options.tiers, vec![Tier::Semantic]);
        assert_eq!(options.max_results, Some(3));
        assert_eq!(options.text_weight, 0.0);
    }

    #[test]
    #[should_panic(expected = "min_score must be in")]
    fn test_invalid_min_score() {
        let _ = HybridSearchOptions::new().with_min_score(1.5);
    }

    #[test]
    fn test_result_serializes_match_type() {
        let result = MemorySearchResult::new(
            MemoryEntry::new("x", EntryType::Knowledge),
            0.5,
            Tier::Semantic,
            MatchType::Hybrid,
        );
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["matchType"], "hybrid");
        assert_eq!(json["tier"], "semantic");
    }
}
