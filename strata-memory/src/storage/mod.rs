//! Storage - Durable Backends for the Memory Tiers
//!
//! TigerStyle: One trait, two implementations, typed commands.
//!
//! # Architecture
//!
//! ```text
//! MemoryManager
//!      │  Command / search_full_text / begin..commit
//!      ▼
//! dyn StorageBackend ──► SqliteBackend   (feature "sqlite", durable, FTS5)
//!                    └─► FallbackBackend (in-process, optional faults)
//! ```
//!
//! The backend is a write-behind copy of the in-memory tiers, not the
//! system of record: a failed write is recorded for the health report and
//! the tiers keep the new state.

mod backend;
mod codec;
mod command;
pub mod driver;
mod error;
mod fallback;
mod schema;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use backend::{BackendKind, Capabilities, RankedId, StorageBackend};
pub use codec::{decode_delta, decode_entry, delta_upsert, entry_upsert, fts_replace, DecodedEntry};
pub use command::{Command, Order, Predicate, Row, SqlValue, Table};
pub use driver::DriverState;
pub use error::{StorageError, StorageResult};
pub use fallback::FallbackBackend;
pub use schema::{Migration, MIGRATIONS, SCHEMA_VERSION_KEY};
#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteBackend, SqliteOptions};
