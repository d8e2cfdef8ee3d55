//! SimClock - Simulated Time
//!
//! `TigerStyle`: Time only moves when a test moves it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::constants::{DST_TIME_ADVANCE_MS_MAX, TIME_MS_PER_DAY};

/// Millisecond clock shared by every clone.
///
/// A test keeps one handle to advance and gives another to the engine
/// through [`TimeSource::Sim`].
#[derive(Debug, Clone, Default)]
pub struct SimClock {
    epoch_ms: Arc<AtomicU64>,
}

impl SimClock {
    /// Clock at the Unix epoch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Clock at `start_ms` milliseconds after the Unix epoch.
    ///
    /// # Example
    /// ```
    /// use strata_core::dst::SimClock;
    /// let clock = SimClock::at_ms(1_704_067_200_000);
    /// clock.advance_ms(250);
    /// assert_eq!(clock.now().to_rfc3339(), "2024-01-01T00:00:00.250+00:00");
    /// ```
    #[must_use]
    pub fn at_ms(start_ms: u64) -> Self {
        Self {
            epoch_ms: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    /// Milliseconds since the Unix epoch.
    #[must_use]
    pub fn now_ms(&self) -> u64 {
        self.epoch_ms.load(Ordering::SeqCst)
    }

    /// Current simulated instant.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        let ms = i64::try_from(self.now_ms()).unwrap_or(i64::MAX);
        DateTime::from_timestamp_millis(ms).unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Move forward `ms` milliseconds and return the new reading.
    ///
    /// # Panics
    /// Panics if `ms` is above `DST_TIME_ADVANCE_MS_MAX`.
    pub fn advance_ms(&self, ms: u64) -> u64 {
        assert!(
            ms <= DST_TIME_ADVANCE_MS_MAX,
            "advance_ms({ms}) above {DST_TIME_ADVANCE_MS_MAX}"
        );
        let before = self.epoch_ms.fetch_add(ms, Ordering::SeqCst);
        before.saturating_add(ms)
    }

    /// Move forward whole days.
    pub fn advance_days(&self, days: u64) -> u64 {
        self.advance_ms(days.saturating_mul(TIME_MS_PER_DAY))
    }
}

// =============================================================================
// TimeSource
// =============================================================================

/// Where the engine reads the current time.
///
/// Both variants have millisecond precision, the precision timestamps are
/// stored at.
#[derive(Debug, Clone, Default)]
pub enum TimeSource {
    /// Wall clock
    #[default]
    System,
    /// A test-controlled clock
    Sim(SimClock),
}

impl TimeSource {
    /// Current time, truncated to milliseconds.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Self::System => {
                let now = Utc::now();
                DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
            }
            Self::Sim(clock) => clock.now(),
        }
    }

    /// Whether time is simulated.
    #[must_use]
    pub fn is_simulated(&self) -> bool {
        matches!(self, Self::Sim(_))
    }
}

impl From<SimClock> for TimeSource {
    fn from(clock: SimClock) -> Self {
        Self::Sim(clock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_at_epoch() {
        let clock = SimClock::new();
        assert_eq!(clock.now_ms(), 0);
        assert_eq!(clock.now().timestamp(), 0);
    }

    #[test]
    fn test_advance_returns_new_reading() {
        let clock = SimClock::at_ms(500);
        assert_eq!(clock.advance_ms(1_500), 2_000);
        assert_eq!(clock.advance_days(1), 2_000 + TIME_MS_PER_DAY);
    }

    #[test]
    fn test_handles_share_one_clock() {
        let clock = SimClock::at_ms(10);
        let source = TimeSource::from(clock.clone());

        clock.advance_ms(32);
        assert_eq!(source.now().timestamp_millis(), 42);
        assert!(source.is_simulated());
    }

    #[test]
    #[should_panic(expected = "above")]
    fn test_advance_beyond_limit_panics() {
        SimClock::new().advance_ms(DST_TIME_ADVANCE_MS_MAX + 1);
    }

    #[test]
    fn test_system_source_drops_sub_millisecond_precision() {
        let source = TimeSource::System;
        assert!(!source.is_simulated());
        assert_eq!(source.now().timestamp_subsec_nanos() % 1_000_000, 0);
    }
}
