//! Memory Configuration
//!
//! `TigerStyle`: Sensible defaults, builder pattern, explicit over implicit.
//!
//! Configuration is supplied once at construction. Every field has a default,
//! so a partial document (or no document at all) deserializes cleanly.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer};
use tracing::warn;

use crate::constants::{
    CACHE_ENTRIES_COUNT_DEFAULT, TIER_COMPACTION_THRESHOLD_DEFAULT, TIER_RESULTS_COUNT_DEFAULT,
};

/// Sentinel path selecting an in-memory database.
pub const IN_MEMORY_SENTINEL: &str = ":memory:";

// =============================================================================
// DbPath
// =============================================================================

/// Where the durable store lives.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DbPath {
    /// A database file on disk
    File(PathBuf),
    /// A process-local database, gone at close
    #[default]
    InMemory,
}

impl DbPath {
    /// Parse a configured path; `":memory:"` and the empty string select
    /// the in-memory database.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == IN_MEMORY_SENTINEL {
            Self::InMemory
        } else {
            Self::File(PathBuf::from(trimmed))
        }
    }

    /// File path, `None` for the in-memory database.
    #[must_use]
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Self::File(path) => Some(path),
            Self::InMemory => None,
        }
    }
}

impl fmt::Display for DbPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::InMemory => f.write_str(IN_MEMORY_SENTINEL),
        }
    }
}

impl From<&str> for DbPath {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl From<PathBuf> for DbPath {
    fn from(path: PathBuf) -> Self {
        Self::File(path)
    }
}

impl From<&Path> for DbPath {
    fn from(path: &Path) -> Self {
        Self::File(path.to_path_buf())
    }
}

impl<'de> Deserialize<'de> for DbPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

// =============================================================================
// MemoryConfig
// =============================================================================

/// Configuration for a `MemoryManager`.
///
/// `TigerStyle`:
/// - Sensible defaults via Default impl
/// - Builder pattern for customization
/// - All fields public for transparency
///
/// # Example
///
/// ```rust
/// use strata_memory::manager::{DbPath, MemoryConfig};
///
/// let config = MemoryConfig::default()
///     .with_max_results(5)
///     .with_lru_cache_size(0)
///     .without_fts();
/// assert_eq!(config.db_path, DbPath::InMemory);
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MemoryConfig {
    /// Database location.
    ///
    /// Default: in-memory
    pub db_path: DbPath,

    /// Whether to maintain the full-text index.
    ///
    /// Default: true
    pub fts_enabled: bool,

    /// Entry cache capacity. `0` disables caching, negative means unbounded.
    ///
    /// Default: 500
    pub lru_cache_size: i64,

    /// Whether to use write-ahead logging on file databases.
    ///
    /// Default: true
    pub wal_mode: bool,

    /// Result cap for `retrieve` and hybrid search, and the episodic size
    /// kept after compaction.
    ///
    /// Default: 10
    pub max_results: usize,

    /// Fraction of `2 × max_results` episodic entries that must be exceeded
    /// before automatic compaction runs.
    ///
    /// Default: 0.8
    pub compaction_threshold: f64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            db_path: DbPath::InMemory,
            fts_enabled: true,
            lru_cache_size: CACHE_ENTRIES_COUNT_DEFAULT,
            wal_mode: true,
            max_results: TIER_RESULTS_COUNT_DEFAULT,
            compaction_threshold: TIER_COMPACTION_THRESHOLD_DEFAULT,
        }
    }
}

impl MemoryConfig {
    /// Create a new config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `STRATA_*` environment variables.
    ///
    /// Unparseable values are ignored with a warning.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each
    /// `STRATA_*` key.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup("STRATA_DB_PATH") {
            config.db_path = DbPath::parse(&raw);
        }
        if let Some(value) = parse_var(&lookup, "STRATA_FTS_ENABLED", parse_bool) {
            config.fts_enabled = value;
        }
        if let Some(value) = parse_var(&lookup, "STRATA_LRU_CACHE_SIZE", |s| s.parse().ok()) {
            config.lru_cache_size = value;
        }
        if let Some(value) = parse_var(&lookup, "STRATA_WAL_MODE", parse_bool) {
            config.wal_mode = value;
        }
        if let Some(value) = parse_var(&lookup, "STRATA_MAX_RESULTS", |s| {
            s.parse::<usize>().ok().filter(|n| *n > 0)
        }) {
            config.max_results = value;
        }
        if let Some(value) = parse_var(&lookup, "STRATA_COMPACTION_THRESHOLD", |s| {
            s.parse::<f64>().ok().filter(|t| t.is_finite() && *t >= 0.0)
        }) {
            config.compaction_threshold = value;
        }

        config
    }

    /// Set the database location.
    ///
    /// # Arguments
    /// - `db_path` - File path or `DbPath::InMemory`
    #[must_use]
    pub fn with_db_path(mut self, db_path: impl Into<DbPath>) -> Self {
        self.db_path = db_path.into();
        self
    }

    /// Turn off the full-text index.
    #[must_use]
    pub fn without_fts(mut self) -> Self {
        self.fts_enabled = false;
        self
    }

    /// Set the entry cache capacity.
    ///
    /// # Arguments
    /// - `size` - Capacity; `0` disables, negative is unbounded
    #[must_use]
    pub fn with_lru_cache_size(mut self, size: i64) -> Self {
        self.lru_cache_size = size;
        self
    }

    /// Turn off write-ahead logging.
    #[must_use]
    pub fn without_wal(mut self) -> Self {
        self.wal_mode = false;
        self
    }

    /// Set the result cap.
    ///
    /// # Arguments
    /// - `max_results` - Must be positive
    ///
    /// # Panics
    /// Panics if `max_results` is 0.
    #[must_use]
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        assert!(max_results > 0, "max_results must be positive");
        self.max_results = max_results;
        self
    }

    /// Set the compaction threshold.
    ///
    /// # Arguments
    /// - `threshold` - Non-negative fraction of `2 × max_results`
    ///
    /// # Panics
    /// Panics if `threshold` is negative or not finite.
    #[must_use]
    pub fn with_compaction_threshold(mut self, threshold: f64) -> Self {
        assert!(
            threshold.is_finite() && threshold >= 0.0,
            "compaction_threshold must be a non-negative number"
        );
        self.compaction_threshold = threshold;
        self
    }

    /// Replace out-of-range values with their defaults.
    ///
    /// `MemoryManager` applies this to every config it is built with.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        if self.max_results == 0 {
            warn!(
                default = TIER_RESULTS_COUNT_DEFAULT,
                "max_results of 0 replaced with default"
            );
            self.max_results = TIER_RESULTS_COUNT_DEFAULT;
        }
        if !(self.compaction_threshold.is_finite() && self.compaction_threshold >= 0.0) {
            warn!(
                value = self.compaction_threshold,
                default = TIER_COMPACTION_THRESHOLD_DEFAULT,
                "invalid compaction_threshold replaced with default"
            );
            self.compaction_threshold = TIER_COMPACTION_THRESHOLD_DEFAULT;
        }

        // Postconditions
        debug_assert!(self.max_results > 0);
        debug_assert!(self.compaction_threshold >= 0.0);
        self
    }
}

fn parse_var<F, T, P>(lookup: &F, key: &str, parse: P) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    P: Fn(&str) -> Option<T>,
{
    let raw = lookup(key)?;
    let parsed = parse(raw.trim());
    if parsed.is_none() {
        warn!(key, value = %raw, "ignoring invalid configuration value");
    }
    parsed
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = MemoryConfig::default();
        assert_eq!(config.db_path, DbPath::InMemory);
        assert!(config.fts_enabled);
        assert_eq!(config.lru_cache_size, 500);
        assert!(config.wal_mode);
        assert_eq!(config.max_results, 10);
        assert!((config.compaction_threshold - 0.8).abs() < f64::EPSILON);
    }

    #[test]
    fn test_builder() {
        let config = MemoryConfig::new()
            .with_db_path("/tmp/strata.db")
            .without_fts()
            .without_wal()
            .with_lru_cache_size(-1)
            .with_max_results(5)
            .with_compaction_threshold(1.0);

        assert_eq!(config.db_path, DbPath::File(PathBuf::from("/tmp/strata.db")));
        assert!(!config.fts_enabled);
        assert!(!config.wal_mode);
        assert_eq!(config.lru_cache_size, -1);
        assert_eq!(config.max_results, 5);
    }

    #[test]
    #[should_panic(expected = "max_results must be positive")]
    fn test_zero_max_results_panics() {
        let _ = MemoryConfig::new().with_max_results(0);
    }

    #[test]
    fn test_db_path_parse() {
        assert_eq!(DbPath::parse(":memory:"), DbPath::InMemory);
        assert_eq!(DbPath::parse("  "), DbPath::InMemory);
        assert_eq!(
            DbPath::parse("data/mem.db"),
            DbPath::File(PathBuf::from("data/mem.db"))
        );
        assert_eq!(DbPath::InMemory.to_string(), ":memory:");
        assert!(DbPath::InMemory.as_path().is_none());
    }

    #[test]
    fn test_deserialize_partial() {
        let config: MemoryConfig =
            serde_json::from_str(r#"{"dbPath": "a.db", "maxResults": 3}"#).unwrap();
        assert_eq!(config.db_path, DbPath::File(PathBuf::from("a.db")));
        assert_eq!(config.max_results, 3);
        assert!(config.fts_enabled);
        assert_eq!(config.lru_cache_size, 500);

        let empty: MemoryConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, MemoryConfig::default());
    }

    #[test]
    fn test_from_lookup() {
        let config = MemoryConfig::from_lookup(lookup(&[
            ("STRATA_DB_PATH", ":memory:"),
            ("STRATA_FTS_ENABLED", "false"),
            ("STRATA_LRU_CACHE_SIZE", "0"),
            ("STRATA_WAL_MODE", "off"),
            ("STRATA_MAX_RESULTS", "7"),
            ("STRATA_COMPACTION_THRESHOLD", "0.5"),
        ]));

        assert_eq!(config.db_path, DbPath::InMemory);
        assert!(!config.fts_enabled);
        assert_eq!(config.lru_cache_size, 0);
        assert!(!config.wal_mode);
        assert_eq!(config.max_results, 7);
        assert!((config.compaction_threshold - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_deserialized_out_of_range_values_normalized() {
        let config: MemoryConfig =
            serde_json::from_str(r#"{"maxResults": 0, "compactionThreshold": -0.5}"#).unwrap();
        assert_eq!(config.max_results, 0);

        let config = config.normalized();
        assert_eq!(config.max_results, TIER_RESULTS_COUNT_DEFAULT);
        assert!(
            (config.compaction_threshold - TIER_COMPACTION_THRESHOLD_DEFAULT).abs() < f64::EPSILON
        );

        let valid = MemoryConfig::default().with_max_results(3);
        assert_eq!(valid.clone().normalized(), valid);
    }

    #[test]
    fn test_from_lookup_ignores_invalid() {
        let config = MemoryConfig::from_lookup(lookup(&[
            ("STRATA_FTS_ENABLED", "maybe"),
            ("STRATA_LRU_CACHE_SIZE", "lots"),
            ("STRATA_MAX_RESULTS", "0"),
            ("STRATA_COMPACTION_THRESHOLD", "-1"),
        ]));
        assert_eq!(config, MemoryConfig::default());
    }
}
