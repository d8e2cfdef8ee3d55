//! SimConfig - Which Seeds a DST Run Replays
//!
//! `TigerStyle`: A sweep is a fixed seed range; `DST_SEED` pins it to one.

use std::env;
use std::ops::RangeInclusive;

use crate::constants::{DST_SEEDS_COUNT_MAX, DST_STEPS_COUNT_MAX};

/// Seed range and operations per seed for a simulation test.
///
/// Tests loop over [`SimConfig::seeds`] and build one [`DeterministicRng`]
/// per seed, so any failure names the seed that reproduces it.
///
/// [`DeterministicRng`]: super::DeterministicRng
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimConfig {
    seeds: RangeInclusive<u64>,
    steps: usize,
}

impl SimConfig {
    /// Replay seeds `0..count`, `steps` operations each.
    ///
    /// # Example
    /// ```
    /// use strata_core::dst::SimConfig;
    /// let config = SimConfig::sweep(8, 100);
    /// assert_eq!(config.seeds(), 0..=7);
    /// ```
    ///
    /// # Panics
    /// Panics if either count is zero or above its limit.
    #[must_use]
    pub fn sweep(count: u64, steps: usize) -> Self {
        assert!(
            count > 0 && count <= DST_SEEDS_COUNT_MAX,
            "seed count {count} outside 1..={DST_SEEDS_COUNT_MAX}"
        );
        Self::checked(0..=count - 1, steps)
    }

    /// Replay exactly one seed.
    ///
    /// # Panics
    /// Panics if `steps` is zero or above `DST_STEPS_COUNT_MAX`.
    #[must_use]
    pub fn pinned(seed: u64, steps: usize) -> Self {
        Self::checked(seed..=seed, steps)
    }

    /// `sweep(count, steps)`, unless `DST_SEED` names a single seed.
    ///
    /// # Panics
    /// Panics if `DST_SEED` is set but is not a u64.
    #[must_use]
    pub fn from_env(count: u64, steps: usize) -> Self {
        match env::var("DST_SEED") {
            Ok(raw) => {
                let seed = raw
                    .trim()
                    .parse::<u64>()
                    .unwrap_or_else(|_| panic!("DST_SEED must be a u64, got {raw:?}"));
                Self::pinned(seed, steps)
            }
            Err(_) => Self::sweep(count, steps),
        }
    }

    fn checked(seeds: RangeInclusive<u64>, steps: usize) -> Self {
        assert!(
            steps > 0 && steps <= DST_STEPS_COUNT_MAX,
            "steps {steps} outside 1..={DST_STEPS_COUNT_MAX}"
        );
        Self { seeds, steps }
    }

    /// Seeds to replay.
    #[must_use]
    pub fn seeds(&self) -> RangeInclusive<u64> {
        self.seeds.clone()
    }

    /// Operations per seed.
    #[must_use]
    pub fn steps(&self) -> usize {
        self.steps
    }
}
