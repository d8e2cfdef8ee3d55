//! DST - Deterministic Simulation Testing
//!
//! Seeded randomness, simulated time and fault injection for the memory
//! engine's storage backends.
//!
//! # Usage
//!
//! ```rust
//! use strata_core::dst::{DeterministicRng, FaultConfig, FaultInjectorBuilder, FaultType, SimConfig};
//!
//! for seed in SimConfig::sweep(4, 100).seeds() {
//!     let faults = FaultInjectorBuilder::new(DeterministicRng::new(seed))
//!         .with_fault(FaultConfig::new(FaultType::StorageWriteFail, 1.0).with_filter("insert"))
//!         .build();
//!
//!     assert_eq!(faults.should_inject("insert:memories"), Some(FaultType::StorageWriteFail));
//!     assert_eq!(faults.should_inject("select:memories"), None);
//! }
//! ```
//!
//! Replay a single failing seed:
//! ```bash
//! DST_SEED=12345 cargo test
//! ```

mod clock;
mod config;
mod fault;
mod rng;

pub use clock::{SimClock, TimeSource};
pub use config::SimConfig;
pub use fault::{FaultConfig, FaultInjector, FaultInjectorBuilder, FaultType};
pub use rng::DeterministicRng;
