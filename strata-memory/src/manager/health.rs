//! Health - Recorded Durability Errors and the Health Report
//!
//! `TigerStyle`: Bounded log, counters that never roll off.
//!
//! Durability problems never fail a public call. They land here, and
//! `get_health_report` is the only place a caller can see them.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::constants::HEALTH_ERRORS_COUNT_MAX;
use crate::storage::{BackendKind, Capabilities};
use strata_core::CacheStats;

// =============================================================================
// Error Log
// =============================================================================

/// Class of a recorded durability error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// Durable engine could not be opened; running on the fallback
    BackendUnavailable,
    /// Full-text index could not be created or queried
    IndexUnavailable,
    /// A write to the store failed
    PersistFailure,
    /// Startup hydration failed
    LoadFailure,
    /// A stored field could not be decoded
    MalformedData,
}

impl ErrorKind {
    /// camelCase name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BackendUnavailable => "backendUnavailable",
            Self::IndexUnavailable => "indexUnavailable",
            Self::PersistFailure => "persistFailure",
            Self::LoadFailure => "loadFailure",
            Self::MalformedData => "malformedData",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedError {
    /// Class
    pub kind: ErrorKind,
    /// Human-readable detail
    pub message: String,
    /// When it was recorded
    pub at: DateTime<Utc>,
}

/// Newest `HEALTH_ERRORS_COUNT_MAX` errors plus lifetime counts per kind.
#[derive(Debug, Clone, Default)]
pub struct ErrorLog {
    recent: VecDeque<RecordedError>,
    counts: BTreeMap<ErrorKind, u64>,
}

impl ErrorLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error, dropping the oldest once full.
    pub fn record(&mut self, kind: ErrorKind, message: impl Into<String>, at: DateTime<Utc>) {
        if self.recent.len() == HEALTH_ERRORS_COUNT_MAX {
            self.recent.pop_front();
        }
        self.recent.push_back(RecordedError {
            kind,
            message: message.into(),
            at,
        });
        *self.counts.entry(kind).or_default() += 1;

        // Postcondition
        debug_assert!(self.recent.len() <= HEALTH_ERRORS_COUNT_MAX);
    }

    /// Errors of `kind` recorded over the log's lifetime.
    #[must_use]
    pub fn count(&self, kind: ErrorKind) -> u64 {
        self.counts.get(&kind).copied().unwrap_or(0)
    }

    /// Whether any error of `kind` was ever recorded.
    #[must_use]
    pub fn has(&self, kind: ErrorKind) -> bool {
        self.count(kind) > 0
    }

    /// Retained errors, oldest first.
    pub fn recent(&self) -> impl Iterator<Item = &RecordedError> {
        self.recent.iter()
    }

    /// Number of retained errors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.recent.len()
    }

    /// Check if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.recent.is_empty()
    }

    /// Lifetime counts per kind.
    #[must_use]
    pub fn counts(&self) -> &BTreeMap<ErrorKind, u64> {
        &self.counts
    }
}

// =============================================================================
// Report
// =============================================================================

/// Overall health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Durable, indexed, no failures
    Healthy,
    /// Working with reduced guarantees
    Degraded,
    /// Writes have been lost from the durable store
    Error,
}

impl HealthStatus {
    /// Derive the status from what was recorded and how the backend runs.
    ///
    /// ```text
    /// any persistFailure                                   → Error
    /// fallback backend | index down while enabled
    ///   | any loadFailure / malformedData                  → Degraded
    /// otherwise                                            → Healthy
    /// ```
    #[must_use]
    pub fn derive(
        log: &ErrorLog,
        backend: BackendKind,
        fts_enabled: bool,
        index_error: Option<&str>,
    ) -> Self {
        if log.has(ErrorKind::PersistFailure) {
            return Self::Error;
        }
        let degraded = backend == BackendKind::Fallback
            || (fts_enabled && (index_error.is_some() || log.has(ErrorKind::IndexUnavailable)))
            || log.has(ErrorKind::LoadFailure)
            || log.has(ErrorKind::MalformedData);
        if degraded {
            Self::Degraded
        } else {
            Self::Healthy
        }
    }
}

/// Snapshot of engine health.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    /// Overall status
    pub status: HealthStatus,
    /// Active backend
    pub backend: BackendKind,
    /// What the backend supports
    pub capabilities: Capabilities,
    /// Batch and import run atomically
    pub transactional: bool,
    /// Driver probe outcome
    pub driver: String,
    /// Full-text index requested in the configuration
    pub fts_enabled: bool,
    /// Why the index is unavailable, if it is
    pub index_error: Option<String>,
    /// Persisted schema version, when readable
    pub schema_version: Option<u32>,
    /// Entry cache statistics
    pub cache: CacheStats,
    /// Scratchpad keys
    pub scratchpad_entries: usize,
    /// Episodic entries
    pub episodic_entries: usize,
    /// Semantic entries
    pub semantic_entries: usize,
    /// Sessions with a delta watermark
    pub sessions: usize,
    /// Lifetime error counts per kind
    pub error_counts: BTreeMap<ErrorKind, u64>,
    /// Most recent errors, oldest first
    pub errors: Vec<RecordedError>,
}

impl HealthReport {
    /// Whether the status is `Healthy`.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

// =============================================================================
// Tests
// =============================================================================
