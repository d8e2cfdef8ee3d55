//! FaultInjector - Seeded Storage Faults
//!
//! `TigerStyle`: Faults are registered up front and drawn from one RNG.
//!
//! Backends name every operation they perform (`insert:memories`,
//! `select:memory_meta`, `commit`, `fts`, ...) and ask the injector whether
//! that operation should fail. Rules match operation names by substring.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::rng::DeterministicRng;
use crate::constants::DST_FAULT_PROBABILITY_MAX;

/// A failure a backend can be told to simulate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FaultType {
    // Row-level
    /// Insert or upsert fails
    StorageWriteFail,
    /// Select fails
    StorageReadFail,
    /// Delete fails
    StorageDeleteFail,
    /// Select succeeds but payload columns come back garbled
    StorageCorruption,
    /// Write fails for lack of space
    StorageDiskFull,

    // Engine-level
    /// Database cannot be opened or the schema cannot be created
    DbConnectionFail,
    /// `begin` or `commit` fails
    DbTransactionFail,
    /// Statement times out
    DbQueryTimeout,

    /// Full-text query fails
    IndexUnavailable,
}

impl FaultType {
    /// snake_case name used in logs and error messages.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StorageWriteFail => "storage_write_fail",
            Self::StorageReadFail => "storage_read_fail",
            Self::StorageDeleteFail => "storage_delete_fail",
            Self::StorageCorruption => "storage_corruption",
            Self::StorageDiskFull => "storage_disk_full",
            Self::DbConnectionFail => "db_connection_fail",
            Self::DbTransactionFail => "db_transaction_fail",
            Self::DbQueryTimeout => "db_query_timeout",
            Self::IndexUnavailable => "index_unavailable",
        }
    }
}

impl fmt::Display for FaultType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One injection rule.
#[derive(Debug, Clone)]
pub struct FaultConfig {
    fault: FaultType,
    probability: f64,
    filter: Option<String>,
    budget: Option<u64>,
}

impl FaultConfig {
    /// Fire `fault` with `probability` on every operation.
    ///
    /// # Panics
    /// Panics unless `0.0 <= probability <= 1.0`.
    #[must_use]
    pub fn new(fault: FaultType, probability: f64) -> Self {
        assert!(
            (0.0..=DST_FAULT_PROBABILITY_MAX).contains(&probability),
            "probability {probability} outside [0, {DST_FAULT_PROBABILITY_MAX}]"
        );
        Self {
            fault,
            probability,
            filter: None,
            budget: None,
        }
    }

    /// Only consider operations whose name contains `filter`.
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Stop after this rule has fired `max` times.
    ///
    /// # Panics
    /// Panics if `max` is zero.
    #[must_use]
    pub fn with_max_injections(mut self, max: u64) -> Self {
        assert!(max > 0, "injection budget must be positive");
        self.budget = Some(max);
        self
    }

    /// Fault this rule injects.
    #[must_use]
    pub fn fault(&self) -> FaultType {
        self.fault
    }

    fn matches(&self, operation: &str) -> bool {
        self.filter
            .as_deref()
            .map_or(true, |filter| operation.contains(filter))
    }
}

#[derive(Debug)]
struct Draws {
    rng: DeterministicRng,
    /// Times each rule fired, parallel to `FaultInjector::rules`
    fired: Vec<u64>,
    by_fault: BTreeMap<FaultType, u64>,
}

/// Decides, per named operation, whether a backend should fail.
///
/// Shared between a backend and the test through an `Arc`; draws are
/// serialized behind one lock so the sequence stays seed-determined.
#[derive(Debug)]
pub struct FaultInjector {
    rules: Vec<FaultConfig>,
    draws: Mutex<Draws>,
}

impl FaultInjector {
    /// Injector with no rules.
    #[must_use]
    pub fn new(rng: DeterministicRng) -> Self {
        Self {
            rules: Vec::new(),
            draws: Mutex::new(Draws {
                rng,
                fired: Vec::new(),
                by_fault: BTreeMap::new(),
            }),
        }
    }

    fn draws(&self) -> MutexGuard<'_, Draws> {
        self.draws.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a rule. Rules are tried in registration order.
    pub fn register(&mut self, rule: FaultConfig) {
        self.draws().fired.push(0);
        self.rules.push(rule);

        debug_assert_eq!(self.rules.len(), self.draws().fired.len());
    }

    /// Fault to inject for `operation`, if any.
    ///
    /// The first matching rule with budget left draws once; a hit ends the
    /// search, a miss moves on to the next rule.
    pub fn should_inject(&self, operation: &str) -> Option<FaultType> {
        let mut draws = self.draws();

        for (index, rule) in self.rules.iter().enumerate() {
            if !rule.matches(operation) {
                continue;
            }
            if rule.budget.is_some_and(|max| draws.fired[index] >= max) {
                continue;
            }
            if draws.rng.next_bool(rule.probability) {
                draws.fired[index] += 1;
                *draws.by_fault.entry(rule.fault).or_default() += 1;
                return Some(rule.fault);
            }
        }
        None
    }

    /// Whether any rule is registered.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        !self.rules.is_empty()
    }

    /// Times `fault` was injected.
    #[must_use]
    pub fn injections(&self, fault: FaultType) -> u64 {
        self.draws().by_fault.get(&fault).copied().unwrap_or(0)
    }

    /// Times any fault was injected.
    #[must_use]
    pub fn total_injections(&self) -> u64 {
        self.draws().by_fault.values().sum()
    }
}

/// Collects rules before the injector is shared with a backend.
#[derive(Debug)]
pub struct FaultInjectorBuilder {
    rng: DeterministicRng,
    rules: Vec<FaultConfig>,
}

impl FaultInjectorBuilder {
    /// Start from a seeded RNG.
    #[must_use]
    pub fn new(rng: DeterministicRng) -> Self {
        Self {
            rng,
            rules: Vec::new(),
        }
    }

    /// Add one rule.
    #[must_use]
    pub fn with_fault(mut self, rule: FaultConfig) -> Self {
        self.rules.push(rule);
        self
    }

    /// Unfiltered write and read failures.
    #[must_use]
    pub fn with_storage_faults(self, probability: f64) -> Self {
        self.with_fault(FaultConfig::new(FaultType::StorageWriteFail, probability))
            .with_fault(FaultConfig::new(FaultType::StorageReadFail, probability))
    }

    /// Transaction failures and timeouts.
    #[must_use]
    pub fn with_db_faults(self, probability: f64) -> Self {
        self.with_fault(FaultConfig::new(FaultType::DbTransactionFail, probability))
            .with_fault(FaultConfig::new(FaultType::DbQueryTimeout, probability))
    }

    /// Finish.
    #[must_use]
    pub fn build(self) -> FaultInjector {
        let mut injector = FaultInjector::new(self.rng);
        for rule in self.rules {
            injector.register(rule);
        }
        injector
    }
}
