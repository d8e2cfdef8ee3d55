//! Retrieval - Keyword, Vector and Hybrid Ranking
//!
//! `TigerStyle`: Pure ranking functions; the manager supplies candidates and
//! the full-text hits.
//!
//! # Architecture
//!
//! ```text
//! keyword ─┐  build_fts_query / rank_to_score   (index path)
//!          │  rank_in_memory                    (no index)
//! vector ──┤  rank_by_vector (cosine)
//!          ▼
//! fusion     merge_hybrid_results (weighted RRF, k = 60)
//! ```

mod fusion;
mod keyword;
mod types;
mod vector;

pub use fusion::merge_hybrid_results;
pub use keyword::{build_fts_query, query_terms, rank_in_memory, rank_to_score, score_content};
pub use types::{HybridSearchOptions, MatchType, MemorySearchResult};
pub use vector::{cosine_similarity, rank_by_vector};
