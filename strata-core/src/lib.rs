//! Strata Core - Limits, Cache and DST Primitives
//!
//! TigerStyle building blocks shared by the Strata memory engine.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               Strata Core                   │
//! ├─────────────────────────────────────────────┤
//! │  constants   │ Every limit, named with units │
//! │  cache       │ Bounded LRU with statistics   │
//! │  dst         │ Clock, RNG, fault injection   │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust
//! use strata_core::{LruCache, SimClock, TimeSource};
//!
//! let mut cache: LruCache<String, u32> = LruCache::from_config(2);
//! cache.set("a".into(), 1);
//! assert_eq!(cache.get("a"), Some(&1));
//!
//! let clock = SimClock::at_ms(1_000);
//! let time = TimeSource::from(clock.clone());
//! clock.advance_ms(500);
//! assert_eq!(time.now().timestamp_millis(), 1_500);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)]

pub mod cache;
pub mod constants;
pub mod dst;

// Re-export common types
pub use cache::{CacheCapacity, CacheStats, LruCache};
pub use constants::*;
pub use dst::{
    DeterministicRng, FaultConfig, FaultInjector, FaultInjectorBuilder, FaultType, SimClock,
    SimConfig, TimeSource,
};
