//! # Strata Memory
//!
//! A tiered memory persistence engine for AI agents with deterministic
//! simulation testing.
//!
//! ## Features
//!
//! - **Three Tiers**: A bounded scratchpad for session state, an episodic
//!   tier for what happened and a semantic tier for what is known
//! - **Hybrid Search**: FTS5 keyword ranking fused with embedding cosine
//!   similarity through Reciprocal Rank Fusion
//! - **Compaction**: Old episodic entries fold into semantic summaries
//! - **Session Deltas**: Transcripts are indexed incrementally per session
//! - **Graceful Degradation**: If SQLite is unavailable the engine keeps
//!   working in memory and reports itself degraded
//! - **Deterministic Testing**: Simulated clock, seeded RNG and fault
//!   injection on every backend call
//!
//! ## Quick Start
//!
//! ```rust
//! use strata_memory::{EntryType, MemoryConfig, MemoryManager, Tier};
//!
//! let mut memory = MemoryManager::open(MemoryConfig::default());
//!
//! memory.store_scratchpad("goal", "ship the release").unwrap();
//!
//! let entry = memory.new_entry("Deployed v2 to staging", EntryType::Interaction);
//! let id = memory.add_episodic(entry).unwrap();
//!
//! let hits = memory.retrieve("staging", Tier::Episodic);
//! assert_eq!(hits[0].id, id);
//! assert!(memory.get_health_report().is_healthy());
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                     MemoryManager                       │
//! ├─────────────────────────────────────────────────────────┤
//! │  Scratchpad   │ Bounded key/value, never persisted      │
//! │  Episodic     │ Chronological, auto-compacted           │
//! │  Semantic     │ Facts and compaction summaries          │
//! │  LRU Cache    │ id → entry, evicted on delete/archive   │
//! ├─────────────────────────────────────────────────────────┤
//! │  retrieval    │ keyword · vector · RRF fusion           │
//! │  compaction   │ archive planning and summaries          │
//! ├─────────────────────────────────────────────────────────┤
//! │  StorageBackend  │ SQLite (WAL + FTS5) │ Fallback        │
//! ├─────────────────────────────────────────────────────────┤
//! │  DST Framework   │ SimClock · DeterministicRng · Faults  │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Simulation-First Testing
//!
//! ```rust
//! use strata_memory::dst::{DeterministicRng, FaultConfig, FaultInjector, FaultType, SimClock};
//! use strata_memory::storage::FallbackBackend;
//! use strata_memory::{EntryType, MemoryManager};
//! use std::sync::Arc;
//!
//! let mut faults = FaultInjector::new(DeterministicRng::new(42));
//! faults.register(FaultConfig::new(FaultType::StorageWriteFail, 1.0).with_filter("insert"));
//!
//! let backend = FallbackBackend::new().with_fault_injector(Arc::new(faults));
//! let mut memory = MemoryManager::builder()
//!     .with_backend(Box::new(backend))
//!     .with_time_source(SimClock::at_ms(0).into())
//!     .build();
//!
//! // Writes fail underneath, the in-memory tiers stay authoritative.
//! let entry = memory.new_entry("still here", EntryType::Knowledge);
//! let id = memory.add_semantic(entry).unwrap();
//! assert!(memory.get_entry_by_id(&id).is_some());
//! assert!(!memory.get_health_report().is_healthy());
//! ```
//!
//! ## Feature Flags
//!
//! - `sqlite` (default) - SQLite backend with WAL and FTS5

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)]

pub use strata_core::{constants, dst};

pub mod compaction;
pub mod manager;
pub mod memory;
pub mod retrieval;
pub mod storage;
pub mod telemetry;

// Re-export common types
pub use manager::{
    BatchError, BatchItem, BatchResult, DbPath, ErrorKind, HealthReport, HealthStatus,
    MemoryConfig, MemoryContext, MemoryError, MemoryManager, MemoryManagerBuilder, MemoryResult,
    MemorySnapshot,
};
pub use memory::{DeltaIndexResult, EntryType, MemoryEntry, SessionDeltaState, Tier, TranscriptEntry};
pub use retrieval::{HybridSearchOptions, MatchType, MemorySearchResult};
pub use storage::{BackendKind, StorageBackend, StorageError};
pub use strata_core::{CacheStats, SimClock, TimeSource};

#[cfg(feature = "sqlite")]
pub use storage::{SqliteBackend, SqliteOptions};
