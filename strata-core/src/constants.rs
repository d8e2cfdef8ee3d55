//! Limits and Defaults
//!
//! `TigerStyle`: Names go from general to specific and end in a unit,
//! e.g. `SCRATCHPAD_KEY_BYTES_MAX`, `CACHE_ENTRIES_COUNT_DEFAULT`.

// =============================================================================
// Cache Limits
// =============================================================================

/// Default capacity of the entry cache
pub const CACHE_ENTRIES_COUNT_DEFAULT: i64 = 500;

// =============================================================================
// Tier Limits
// =============================================================================

/// Default number of results returned by retrieval and kept after compaction
pub const TIER_RESULTS_COUNT_DEFAULT: usize = 10;

/// Episodic size (as a multiple of max results) that arms automatic compaction
pub const TIER_EPISODIC_COMPACTION_MULTIPLIER: usize = 2;

/// Default fraction of the armed size that must be exceeded before compacting
pub const TIER_COMPACTION_THRESHOLD_DEFAULT: f64 = 0.8;

// =============================================================================
// Scratchpad Limits
// =============================================================================

/// Maximum number of scratchpad keys
pub const SCRATCHPAD_ENTRIES_COUNT_MAX: usize = 10_000;

/// Maximum length of a scratchpad key
pub const SCRATCHPAD_KEY_BYTES_MAX: usize = 256;

// =============================================================================
// Entry Limits
// =============================================================================

/// Maximum size of entry content
pub const ENTRY_CONTENT_BYTES_MAX: usize = 1_000_000;

/// Length of the random suffix in generated entry ids
pub const ENTRY_ID_SUFFIX_CHARS: usize = 12;

/// Length of the hex content-hash prefix stored alongside entries
pub const ENTRY_HASH_HEX_CHARS: usize = 16;

// =============================================================================
// Search Limits
// =============================================================================

/// Maximum number of tokens turned into a full-text query
pub const SEARCH_QUERY_TOKENS_COUNT_MAX: usize = 20;

/// Candidate expansion factor applied to each list before fusion
pub const SEARCH_FUSION_EXPANSION_FACTOR: usize = 3;

/// Reciprocal Rank Fusion constant `k`
pub const SEARCH_RRF_K: f64 = 60.0;

/// Default weight of the vector list in hybrid fusion
pub const SEARCH_VECTOR_WEIGHT_DEFAULT: f64 = 0.6;

/// Default weight of the keyword list in hybrid fusion
pub const SEARCH_TEXT_WEIGHT_DEFAULT: f64 = 0.4;

/// Default minimum score for hybrid results
pub const SEARCH_MIN_SCORE_DEFAULT: f64 = 0.0;

/// Weight of term coverage in the in-memory keyword scorer
pub const SEARCH_FALLBACK_COVERAGE_WEIGHT: f64 = 0.7;

/// Per-occurrence bonus in the in-memory keyword scorer
pub const SEARCH_FALLBACK_OCCURRENCE_BONUS: f64 = 0.02;

/// Cap on the occurrence bonus in the in-memory keyword scorer
pub const SEARCH_FALLBACK_OCCURRENCE_BONUS_MAX: f64 = 0.3;

/// Score floor added to every in-memory keyword match
pub const SEARCH_FALLBACK_SCORE_FLOOR: f64 = 0.1;

// =============================================================================
// Compaction Limits
// =============================================================================

/// Number of entries quoted in a compaction summary preview
pub const COMPACTION_PREVIEW_ENTRIES_COUNT_MAX: usize = 3;

/// Characters of each entry quoted in a compaction summary preview
pub const COMPACTION_PREVIEW_CHARS_MAX: usize = 100;

// =============================================================================
// Health Limits
// =============================================================================

/// Number of recorded errors retained for the health report
pub const HEALTH_ERRORS_COUNT_MAX: usize = 100;

// =============================================================================
// Schema
// =============================================================================

/// Current persisted schema version
pub const SCHEMA_VERSION: u32 = 2;

/// Current snapshot format version
pub const SNAPSHOT_VERSION: u32 = 1;

// =============================================================================
// DST (Deterministic Simulation Testing) Limits
// =============================================================================

/// Maximum seeds in one sweep
pub const DST_SEEDS_COUNT_MAX: u64 = 10_000;

/// Maximum operations replayed per seed
pub const DST_STEPS_COUNT_MAX: usize = 100_000;

/// Upper bound on a fault rule's probability
pub const DST_FAULT_PROBABILITY_MAX: f64 = 1.0;

/// Milliseconds in a day
pub const TIME_MS_PER_DAY: u64 = 86_400_000;

/// Largest single jump of a simulated clock
pub const DST_TIME_ADVANCE_MS_MAX: u64 = 365 * TIME_MS_PER_DAY;

// =============================================================================
// Tests
// =============================================================================
