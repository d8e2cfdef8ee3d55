//! Manager search: recency filter, keyword, vector and hybrid ranking.

use tracing::{debug, warn};

use super::{ErrorKind, MemoryManager};
use crate::constants::SEARCH_FUSION_EXPANSION_FACTOR;
use crate::memory::{MemoryEntry, Tier};
use crate::retrieval::{
    build_fts_query, merge_hybrid_results, rank_by_vector, rank_in_memory, rank_to_score,
    HybridSearchOptions, MatchType, MemorySearchResult,
};

impl MemoryManager {
    /// Case-insensitive substring match in one tier, newest first, at most
    /// `max_results`. The scratchpad holds no entries and returns nothing.
    #[must_use]
    pub fn retrieve(&self, query: &str, tier: Tier) -> Vec<MemoryEntry> {
        if !tier.is_durable() {
            return Vec::new();
        }

        let needle = query.to_lowercase();
        let mut matches: Vec<MemoryEntry> = self
            .tier(tier)
            .iter()
            .rev()
            .filter(|e| e.content.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        matches.truncate(self.config.max_results);
        matches
    }

    /// Keyword search over `tiers`, best first.
    ///
    /// Uses the full-text index when the backend has one; otherwise (or if
    /// the index query fails, which is recorded) scores content in memory.
    #[tracing::instrument(skip(self, query), fields(query_len = query.len()))]
    pub fn search_keyword(
        &mut self,
        query: &str,
        tiers: &[Tier],
        limit: usize,
    ) -> Vec<MemorySearchResult> {
        let tiers = durable_tiers(tiers);
        if tiers.is_empty() || limit == 0 {
            return Vec::new();
        }

        if self.backend.capabilities().full_text {
            let Some(fts_query) = build_fts_query(query) else {
                return Vec::new();
            };
            match self.backend.search_full_text(&fts_query, &tiers, limit) {
                Ok(hits) => {
                    let mut results: Vec<MemorySearchResult> = hits
                        .into_iter()
                        .filter_map(|hit| {
                            let (tier, index) = self.locate(&hit.id)?;
                            tiers.contains(&tier).then(|| {
                                MemorySearchResult::new(
                                    self.tier(tier)[index].clone(),
                                    rank_to_score(hit.rank),
                                    tier,
                                    MatchType::Keyword,
                                )
                            })
                        })
                        .collect();
                    results.sort_by(|a, b| b.score.total_cmp(&a.score));
                    debug!(hits = results.len(), "full-text search");
                    return results;
                }
                Err(e) => {
                    warn!(error = %e, "full-text query failed, scoring in memory");
                    self.record(ErrorKind::IndexUnavailable, format!("fts query: {e}"));
                }
            }
        }

        rank_in_memory(query, self.candidates(&tiers), limit)
    }

    /// Cosine ranking of entries with an embedding in `tiers`, best first.
    #[must_use]
    pub fn search_vector(
        &self,
        embedding: &[f32],
        tiers: &[Tier],
        limit: usize,
    ) -> Vec<MemorySearchResult> {
        let tiers = durable_tiers(tiers);
        rank_by_vector(embedding, self.candidates(&tiers), limit)
    }

    /// Keyword search fused with vector search when a query embedding is
    /// given.
    #[tracing::instrument(skip(self, query, options), fields(query_len = query.len()))]
    pub fn hybrid_search(
        &mut self,
        query: &str,
        options: &HybridSearchOptions,
    ) -> Vec<MemorySearchResult> {
        let max_results = options.max_results.unwrap_or(self.config.max_results);
        let keep = |results: Vec<MemorySearchResult>| -> Vec<MemorySearchResult> {
            results
                .into_iter()
                .filter(|r| r.score >= options.min_score)
                .take(max_results)
                .collect()
        };

        let Some(embedding) = options.query_embedding.as_deref() else {
            return keep(self.search_keyword(query, &options.tiers, max_results));
        };

        let expanded = max_results.saturating_mul(SEARCH_FUSION_EXPANSION_FACTOR);
        let keyword = self.search_keyword(query, &options.tiers, expanded);
        let vector = self.search_vector(embedding, &options.tiers, expanded);
        if keyword.is_empty() {
            return keep(vector);
        }

        let merged = merge_hybrid_results(
            &keyword,
            &vector,
            options.text_weight,
            options.vector_weight,
        );
        debug!(
            keyword = keyword.len(),
            vector = vector.len(),
            fused = merged.len(),
            "hybrid fusion"
        );
        keep(merged)
    }

    /// Entries of `tiers`, newest first within each tier.
    fn candidates<'a>(
        &'a self,
        tiers: &'a [Tier],
    ) -> impl Iterator<Item = (&'a MemoryEntry, Tier)> + 'a {
        tiers
            .iter()
            .flat_map(move |tier| self.tier(*tier).iter().rev().map(move |e| (e, *tier)))
    }
}

/// Durable tiers from `tiers`, de-duplicated, in order.
fn durable_tiers(tiers: &[Tier]) -> Vec<Tier> {
    let mut durable: Vec<Tier> = Vec::with_capacity(2);
    for tier in tiers {
        if tier.is_durable() && !durable.contains(tier) {
            durable.push(*tier);
        }
    }
    durable
}
