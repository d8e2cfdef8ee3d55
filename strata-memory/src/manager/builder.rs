//! Manager Builder
//!
//! `TigerStyle`: Clean API, sensible defaults, never fails.
//!
//! Without an explicit backend the builder probes for SQLite and falls back
//! to the in-process backend when the durable engine cannot be opened.

use strata_core::TimeSource;

use super::config::MemoryConfig;
use super::MemoryManager;
use crate::storage::StorageBackend;

// =============================================================================
// MemoryManagerBuilder
// =============================================================================

/// Builder for constructing `MemoryManager` instances.
///
/// `TigerStyle`:
/// - Fluent API with method chaining
/// - Every component optional; defaults come from the configuration
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use strata_memory::manager::{MemoryConfig, MemoryManager};
/// use strata_memory::storage::FallbackBackend;
/// use strata_memory::dst::SimClock;
///
/// let clock = SimClock::at_ms(1_700_000_000_000);
/// let manager = MemoryManager::builder()
///     .with_config(MemoryConfig::default().with_max_results(5))
///     .with_backend(Box::new(FallbackBackend::new()))
///     .with_time_source(clock.into())
///     .build();
/// assert_eq!(manager.config().max_results, 5);
/// ```
#[derive(Debug, Default)]
pub struct MemoryManagerBuilder {
    config: MemoryConfig,
    backend: Option<Box<dyn StorageBackend>>,
    time: TimeSource,
}

impl MemoryManagerBuilder {
    /// Create a new builder with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the configuration.
    ///
    /// # Arguments
    /// - `config` - Engine configuration
    #[must_use]
    pub fn with_config(mut self, config: MemoryConfig) -> Self {
        self.config = config;
        self
    }

    /// Use this backend instead of opening one from the configuration.
    ///
    /// # Arguments
    /// - `backend` - Any storage backend (e.g. a fallback with fault injection)
    #[must_use]
    pub fn with_backend(mut self, backend: Box<dyn StorageBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Set where timestamps come from.
    ///
    /// # Arguments
    /// - `time` - System clock or a simulated clock
    #[must_use]
    pub fn with_time_source(mut self, time: TimeSource) -> Self {
        self.time = time;
        self
    }

    /// Build the manager: open or adopt the backend, ensure the schema and
    /// hydrate the tiers.
    #[must_use]
    pub fn build(self) -> MemoryManager {
        MemoryManager::assemble(self.config, self.backend, self.time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{BackendKind, FallbackBackend};
    use strata_core::SimClock;

    #[test]
    fn test_builder_defaults() {
        let builder = MemoryManagerBuilder::new();
        assert_eq!(builder.config, MemoryConfig::default());
        assert!(builder.backend.is_none());
        assert!(!builder.time.is_simulated());
    }

    #[test]
    fn test_builder_with_backend_and_clock() {
        let clock = SimClock::at_ms(42_000);
        let manager = MemoryManagerBuilder::new()
            .with_backend(Box::new(FallbackBackend::new()))
            .with_time_source(clock.into())
            .build();

        assert_eq!(manager.backend_kind(), BackendKind::Fallback);
        assert_eq!(manager.now().timestamp_millis(), 42_000);
    }
}
