//! Memory Manager - Tiers, Cache and Durable Store
//!
//! `TigerStyle`: Single writer, in-memory tiers authoritative, graceful
//! degradation.
//!
//! # Overview
//!
//! ```text
//!                       ┌──────────────── MemoryManager ────────────────┐
//! store_scratchpad ───► │ scratchpad   (volatile, never persisted)      │
//! add_episodic ───────► │ episodic     (chronological, auto-compacted)  │──► write-behind
//! add_semantic ───────► │ semantic     (summaries land here)            │    dyn StorageBackend
//! get_entry_by_id ────► │ LruCache     (id → entry)                     │
//! hybrid_search ──────► │ keyword (FTS or in-memory) + vector → RRF     │
//!                       └───────────────────────────────────────────────┘
//! ```
//!
//! # Durability
//!
//! The tier arrays are the system of record for the running process. The
//! backend receives a copy of every change, and failures writing that copy
//! are recorded for `get_health_report` rather than returned to the caller.
//! Only batch upserts and snapshot imports are atomic, and only on a backend
//! with transactions.
//!
//! # Example
//!
//! ```rust
//! use strata_memory::manager::{MemoryConfig, MemoryManager};
//! use strata_memory::memory::EntryType;
//!
//! let mut memory = MemoryManager::open(MemoryConfig::default());
//! let entry = memory.new_entry("Deployed the billing service", EntryType::Interaction);
//! let id = memory.add_episodic(entry).unwrap();
//! assert!(memory.get_entry_by_id(&id).is_some());
//! memory.close();
//! ```

mod batch;
mod builder;
mod compaction;
mod config;
mod error;
mod health;
mod search;
mod sessions;
mod snapshot;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use strata_core::{LruCache, TimeSource};
use tracing::{debug, info, warn};

pub use batch::{BatchError, BatchItem, BatchResult};
pub use builder::MemoryManagerBuilder;
pub use config::{DbPath, MemoryConfig, IN_MEMORY_SENTINEL};
pub use error::{MemoryError, MemoryResult};
pub use health::{ErrorKind, ErrorLog, HealthReport, HealthStatus, RecordedError};
pub use snapshot::MemorySnapshot;

use crate::memory::{EntryType, MemoryEntry, Scratchpad, SessionDeltaState, Tier};
use crate::storage::{
    decode_delta, decode_entry, driver, entry_upsert, fts_replace, BackendKind, Command,
    DriverState, FallbackBackend, Order, Predicate, StorageBackend, StorageResult, Table,
    SCHEMA_VERSION_KEY,
};

// =============================================================================
// Context
// =============================================================================

/// What an agent sees when a session starts.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryContext {
    /// Current scratchpad values
    pub scratchpad: BTreeMap<String, Value>,
    /// Most recent episodic entries, newest first
    pub recent_episodic: Vec<MemoryEntry>,
    /// Most recent semantic entries, newest first
    pub recent_semantic: Vec<MemoryEntry>,
    /// Total episodic entries
    pub episodic_count: usize,
    /// Total semantic entries
    pub semantic_count: usize,
    /// Sessions with a delta watermark
    pub session_count: usize,
}

/// Whether an upsert created or replaced an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Placement {
    Inserted,
    Updated,
}

// =============================================================================
// MemoryManager
// =============================================================================

/// Tiered memory engine.
///
/// `TigerStyle`:
/// - All mutation through `&mut self`, no internal locking
/// - Every live entry in exactly one of episodic or semantic
/// - Cache only ever holds copies of live entries
#[derive(Debug)]
pub struct MemoryManager {
    config: MemoryConfig,
    backend: Box<dyn StorageBackend>,
    cache: LruCache<String, MemoryEntry>,
    scratchpad: Scratchpad,
    episodic: Vec<MemoryEntry>,
    semantic: Vec<MemoryEntry>,
    session_deltas: BTreeMap<String, SessionDeltaState>,
    errors: ErrorLog,
    time: TimeSource,
    schema_version: Option<u32>,
}

impl MemoryManager {
    /// Start building a manager.
    #[must_use]
    pub fn builder() -> MemoryManagerBuilder {
        MemoryManagerBuilder::new()
    }

    /// Open a manager from configuration.
    ///
    /// Never fails: if SQLite cannot be used the manager runs on the
    /// in-process fallback and reports `Degraded`.
    #[must_use]
    pub fn open(config: MemoryConfig) -> Self {
        Self::builder().with_config(config).build()
    }

    pub(crate) fn assemble(
        config: MemoryConfig,
        backend: Option<Box<dyn StorageBackend>>,
        time: TimeSource,
    ) -> Self {
        let config = config.normalized();
        let mut errors = ErrorLog::new();

        let mut backend = match backend {
            Some(mut backend) => {
                if let Err(e) = backend.ensure_schema() {
                    warn!(error = %e, backend = %backend.kind(), "schema setup failed");
                    errors.record(ErrorKind::BackendUnavailable, e.to_string(), time.now());
                }
                backend
            }
            None => match open_durable(&config) {
                Ok(backend) => backend,
                Err(reason) => {
                    warn!(reason = %reason, "durable backend unavailable, using fallback");
                    errors.record(ErrorKind::BackendUnavailable, reason, time.now());
                    let mut fallback: Box<dyn StorageBackend> = Box::new(FallbackBackend::new());
                    if let Err(e) = fallback.ensure_schema() {
                        errors.record(ErrorKind::BackendUnavailable, e.to_string(), time.now());
                    }
                    fallback
                }
            },
        };

        if config.fts_enabled && backend.kind() == BackendKind::Sqlite {
            if let Some(reason) = backend.index_error() {
                warn!(reason = %reason, "full-text index unavailable, using in-memory scoring");
                errors.record(ErrorKind::IndexUnavailable, reason, time.now());
            }
        }

        let schema_version = read_schema_version(backend.as_mut());

        let mut manager = Self {
            cache: LruCache::from_config(config.lru_cache_size),
            config,
            backend,
            scratchpad: Scratchpad::new(),
            episodic: Vec::new(),
            semantic: Vec::new(),
            session_deltas: BTreeMap::new(),
            errors,
            time,
            schema_version,
        };
        manager.load_persisted_entries();

        info!(
            backend = %manager.backend.kind(),
            db_path = %manager.config.db_path,
            episodic = manager.episodic.len(),
            semantic = manager.semantic.len(),
            sessions = manager.session_deltas.len(),
            "memory manager opened"
        );
        manager
    }

    /// Summarize the loaded state for a new session.
    #[tracing::instrument(skip(self))]
    pub fn initialize_context(&mut self) -> MemoryContext {
        let recent = |tier: &[MemoryEntry], limit: usize| -> Vec<MemoryEntry> {
            let mut newest: Vec<MemoryEntry> = tier.iter().rev().cloned().collect();
            newest.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
            newest.truncate(limit);
            newest
        };

        let context = MemoryContext {
            scratchpad: self.scratchpad.entries().clone(),
            recent_episodic: recent(&self.episodic, self.config.max_results),
            recent_semantic: recent(&self.semantic, self.config.max_results),
            episodic_count: self.episodic.len(),
            semantic_count: self.semantic.len(),
            session_count: self.session_deltas.len(),
        };
        debug!(
            episodic = context.episodic_count,
            semantic = context.semantic_count,
            "context initialized"
        );
        context
    }

    // =========================================================================
    // Scratchpad
    // =========================================================================

    /// Store a scratchpad value.
    ///
    /// # Errors
    /// Returns `MemoryError::Scratchpad` if the key breaks a limit.
    pub fn store_scratchpad(&mut self, key: &str, value: impl Into<Value>) -> MemoryResult<()> {
        self.scratchpad.set(key, value.into())?;
        Ok(())
    }

    /// Read a scratchpad value.
    #[must_use]
    pub fn retrieve_scratchpad(&self, key: &str) -> Option<&Value> {
        self.scratchpad.get(key)
    }

    /// Remove a scratchpad value, returning it.
    pub fn delete_scratchpad(&mut self, key: &str) -> Option<Value> {
        self.scratchpad.remove(key)
    }

    /// Remove every scratchpad value.
    pub fn clear_scratchpad(&mut self) {
        self.scratchpad.clear();
    }

    // =========================================================================
    // Entries
    // =========================================================================

    /// Create an entry stamped with the manager's clock.
    #[must_use]
    pub fn new_entry(&self, content: impl Into<String>, entry_type: EntryType) -> MemoryEntry {
        MemoryEntry::at(content, entry_type, self.time.now())
    }

    /// Add (or replace, by id) an episodic entry. May trigger automatic
    /// compaction.
    ///
    /// # Errors
    /// Returns `MemoryError::InvalidEntry` if the entry fails validation.
    #[tracing::instrument(skip(self, entry), fields(id = %entry.id))]
    pub fn add_episodic(&mut self, entry: MemoryEntry) -> MemoryResult<String> {
        let id = self.add(entry, Tier::Episodic)?;
        self.maybe_auto_compact();
        Ok(id)
    }

    /// Add (or replace, by id) a semantic entry.
    ///
    /// # Errors
    /// Returns `MemoryError::InvalidEntry` if the entry fails validation.
    #[tracing::instrument(skip(self, entry), fields(id = %entry.id))]
    pub fn add_semantic(&mut self, entry: MemoryEntry) -> MemoryResult<String> {
        self.add(entry, Tier::Semantic)
    }

    fn add(&mut self, entry: MemoryEntry, tier: Tier) -> MemoryResult<String> {
        entry.validate().map_err(MemoryError::invalid_entry)?;

        let id = entry.id.clone();
        self.persist_entry(&entry, tier);
        let placement = self.place(entry, tier);
        debug!(id = %id, tier = %tier, ?placement, "entry stored");
        Ok(id)
    }

    /// Look an entry up by id, cache first.
    pub fn get_entry_by_id(&mut self, id: &str) -> Option<MemoryEntry> {
        if let Some(entry) = self.cache.get(id) {
            return Some(entry.clone());
        }
        let (tier, index) = self.locate(id)?;
        let entry = self.tier(tier)[index].clone();
        self.cache.set(entry.id.clone(), entry.clone());
        Some(entry)
    }

    /// Tier an entry lives in.
    #[must_use]
    pub fn tier_of(&self, id: &str) -> Option<Tier> {
        self.locate(id).map(|(tier, _)| tier)
    }

    /// Delete an entry from its tier, the cache and the store.
    ///
    /// Returns whether the entry existed.
    #[tracing::instrument(skip(self))]
    pub fn delete_entry(&mut self, id: &str) -> bool {
        let Some((tier, index)) = self.locate(id) else {
            return false;
        };
        self.tier_mut(tier).remove(index);
        self.cache.delete(id);
        self.delete_persisted_entry(id);

        // Postcondition
        debug_assert!(self.locate(id).is_none());
        true
    }

    /// Attach (or replace) an entry's embedding.
    ///
    /// # Errors
    /// Returns `MemoryError::EntryNotFound` for an unknown id and
    /// `MemoryError::InvalidEmbedding` for an empty or non-finite vector.
    #[tracing::instrument(skip(self, embedding), fields(dims = embedding.len()))]
    pub fn store_embedding(&mut self, id: &str, embedding: Vec<f32>) -> MemoryResult<()> {
        if embedding.is_empty() {
            return Err(MemoryError::InvalidEmbedding {
                id: id.to_string(),
                reason: "embedding is empty".to_string(),
            });
        }
        if embedding.iter().any(|x| !x.is_finite()) {
            return Err(MemoryError::InvalidEmbedding {
                id: id.to_string(),
                reason: "embedding contains non-finite values".to_string(),
            });
        }

        let (tier, index) = self.locate(id).ok_or_else(|| MemoryError::not_found(id))?;
        let updated = {
            let entry = &mut self.tier_mut(tier)[index];
            entry.embedding = Some(embedding);
            entry.clone()
        };
        self.persist_entry(&updated, tier);
        if self.cache.peek(id).is_some() {
            self.cache.set(updated.id.clone(), updated);
        }
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Episodic entries, chronological.
    #[must_use]
    pub fn episodic(&self) -> &[MemoryEntry] {
        &self.episodic
    }

    /// Semantic entries, chronological.
    #[must_use]
    pub fn semantic(&self) -> &[MemoryEntry] {
        &self.semantic
    }

    /// Scratchpad values.
    #[must_use]
    pub fn scratchpad(&self) -> &BTreeMap<String, Value> {
        self.scratchpad.entries()
    }

    /// Configuration in effect.
    #[must_use]
    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// Active backend.
    #[must_use]
    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    /// Entry cache statistics.
    #[must_use]
    pub fn cache_stats(&self) -> strata_core::CacheStats {
        self.cache.stats()
    }

    /// Current time from the manager's clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.time.now()
    }

    /// Recorded durability errors.
    #[must_use]
    pub fn error_log(&self) -> &ErrorLog {
        &self.errors
    }

    /// Build the health report.
    #[must_use]
    pub fn get_health_report(&self) -> HealthReport {
        let capabilities = self.backend.capabilities();
        let index_error = self.backend.index_error();
        let status = HealthStatus::derive(
            &self.errors,
            self.backend.kind(),
            self.config.fts_enabled,
            index_error.as_deref(),
        );

        HealthReport {
            status,
            backend: self.backend.kind(),
            capabilities,
            transactional: capabilities.transactions,
            driver: describe_driver(&driver::state()),
            fts_enabled: self.config.fts_enabled,
            index_error,
            schema_version: self.schema_version,
            cache: self.cache.stats(),
            scratchpad_entries: self.scratchpad.len(),
            episodic_entries: self.episodic.len(),
            semantic_entries: self.semantic.len(),
            sessions: self.session_deltas.len(),
            error_counts: self.errors.counts().clone(),
            errors: self.errors.recent().cloned().collect(),
        }
    }

    /// Flush the store and release it.
    #[tracing::instrument(skip(self))]
    pub fn close(mut self) {
        if let Err(e) = self.backend.checkpoint() {
            warn!(error = %e, "checkpoint at close failed");
        }
        info!(
            episodic = self.episodic.len(),
            semantic = self.semantic.len(),
            errors = self.errors.len(),
            "memory manager closed"
        );
    }

    // =========================================================================
    // Tier bookkeeping
    // =========================================================================

    fn tier(&self, tier: Tier) -> &Vec<MemoryEntry> {
        match tier {
            Tier::Episodic => &self.episodic,
            Tier::Semantic => &self.semantic,
            Tier::Scratchpad => unreachable!("scratchpad holds no entries"),
        }
    }

    fn tier_mut(&mut self, tier: Tier) -> &mut Vec<MemoryEntry> {
        match tier {
            Tier::Episodic => &mut self.episodic,
            Tier::Semantic => &mut self.semantic,
            Tier::Scratchpad => unreachable!("scratchpad holds no entries"),
        }
    }

    pub(crate) fn locate(&self, id: &str) -> Option<(Tier, usize)> {
        Tier::DURABLE.into_iter().find_map(|tier| {
            self.tier(tier)
                .iter()
                .position(|e| e.id == id)
                .map(|index| (tier, index))
        })
    }

    /// Put an entry into `tier`, replacing it if the id is already there
    /// and moving it if the id lives in the other tier.
    ///
    /// Tiers stay sorted by timestamp; among equal timestamps the newest
    /// write goes last.
    pub(crate) fn place(&mut self, entry: MemoryEntry, tier: Tier) -> Placement {
        // Precondition
        assert!(tier.is_durable(), "scratchpad holds no entries");

        let id = entry.id.clone();
        let placement = match self.locate(&id) {
            Some((found, index))
                if found == tier && self.tier(tier)[index].timestamp == entry.timestamp =>
            {
                self.tier_mut(tier)[index] = entry.clone();
                Placement::Updated
            }
            Some((found, index)) => {
                self.tier_mut(found).remove(index);
                insert_chronological(self.tier_mut(tier), entry.clone());
                if found == tier {
                    Placement::Updated
                } else {
                    Placement::Inserted
                }
            }
            None => {
                insert_chronological(self.tier_mut(tier), entry.clone());
                Placement::Inserted
            }
        };
        self.cache.set(id.clone(), entry);

        // Postcondition
        debug_assert_eq!(self.tier_of(&id), Some(tier));
        debug_assert!(self
            .tier(tier)
            .windows(2)
            .all(|w| w[0].timestamp <= w[1].timestamp));
        placement
    }

    // =========================================================================
    // Write-behind persistence
    // =========================================================================

    /// Abandon an open transaction; a failure to do so is a lost write too.
    fn roll_back(&mut self, context: &str) {
        if let Err(e) = self.backend.rollback() {
            self.record(
                ErrorKind::PersistFailure,
                format!("rollback after {context}: {e}"),
            );
        }
    }

    fn record(&mut self, kind: ErrorKind, message: impl Into<String>) {
        let message = message.into();
        warn!(kind = %kind, message = %message, "durability error recorded");
        self.errors.record(kind, message, self.time.now());
    }

    /// Write an entry row (and its index row) without recording failures.
    pub(crate) fn try_persist_entry(
        &mut self,
        entry: &MemoryEntry,
        tier: Tier,
    ) -> StorageResult<()> {
        let now = self.time.now();
        self.backend.execute(&entry_upsert(entry, tier, now))?;
        if self.backend.capabilities().full_text {
            for command in fts_replace(entry, tier) {
                self.backend.execute(&command)?;
            }
        }
        Ok(())
    }

    /// Best-effort write of an entry; failures are recorded.
    pub(crate) fn persist_entry(&mut self, entry: &MemoryEntry, tier: Tier) {
        if let Err(e) = self.try_persist_entry(entry, tier) {
            self.record(
                ErrorKind::PersistFailure,
                format!("persist {}: {e}", entry.id),
            );
        }
    }

    /// Best-effort removal of an entry row and its index row.
    pub(crate) fn delete_persisted_entry(&mut self, id: &str) {
        let mut result = self.backend.execute(&Command::delete(Table::Memories, id));
        if result.is_ok() && self.backend.capabilities().full_text {
            result = self.backend.execute(&Command::delete(Table::MemoriesFts, id));
        }
        if let Err(e) = result {
            self.record(ErrorKind::PersistFailure, format!("delete {id}: {e}"));
        }
    }

    /// Best-effort write of a session watermark.
    pub(crate) fn persist_delta(&mut self, session_id: &str) {
        let Some(state) = self.session_deltas.get(session_id) else {
            return;
        };
        let command = crate::storage::delta_upsert(session_id, state);
        if let Err(e) = self.backend.execute(&command) {
            self.record(
                ErrorKind::PersistFailure,
                format!("persist session {session_id}: {e}"),
            );
        }
    }

    /// Populate the tiers and session deltas from the store.
    fn load_persisted_entries(&mut self) {
        let select = Command::Select {
            table: Table::Memories,
            predicate: Predicate::All,
            order: Order::Desc("timestamp"),
        };
        let rows = match self.backend.execute(&select) {
            Ok(rows) => rows,
            Err(e) => {
                self.record(ErrorKind::LoadFailure, format!("load entries: {e}"));
                return;
            }
        };

        let mut loaded = 0usize;
        for row in &rows {
            match decode_entry(row) {
                Ok(decoded) => {
                    if !decoded.malformed.is_empty() {
                        self.record(
                            ErrorKind::MalformedData,
                            format!(
                                "{}: dropped {}",
                                decoded.entry.id,
                                decoded.malformed.join(", ")
                            ),
                        );
                    }
                    if !decoded.tier.is_durable() || self.locate(&decoded.entry.id).is_some() {
                        continue;
                    }
                    self.tier_mut(decoded.tier).push(decoded.entry);
                    loaded += 1;
                }
                Err(e) => self.record(ErrorKind::MalformedData, e.to_string()),
            }
        }
        // Rows arrive newest first; the tiers are chronological
        self.episodic.reverse();
        self.semantic.reverse();

        match self.backend.execute(&Command::select_all(Table::SessionDeltas)) {
            Ok(rows) => {
                for row in &rows {
                    match decode_delta(row) {
                        Ok((session_id, state)) => {
                            self.session_deltas.insert(session_id, state);
                        }
                        Err(e) => self.record(ErrorKind::MalformedData, e.to_string()),
                    }
                }
            }
            Err(e) => self.record(ErrorKind::LoadFailure, format!("load session deltas: {e}")),
        }

        if loaded > 0 {
            info!(
                entries = loaded,
                sessions = self.session_deltas.len(),
                "hydrated from store"
            );
        }
    }
}

// =============================================================================
// Backend selection
// =============================================================================

fn open_durable(config: &MemoryConfig) -> Result<Box<dyn StorageBackend>, String> {
    match driver::probe() {
        DriverState::Found { .. } => open_sqlite(config),
        DriverState::NotFound { reason } => Err(format!("sqlite driver not found: {reason}")),
        DriverState::NotProbed => Err("sqlite driver not probed".to_string()),
    }
}

#[cfg(feature = "sqlite")]
fn open_sqlite(config: &MemoryConfig) -> Result<Box<dyn StorageBackend>, String> {
    use crate::storage::{SqliteBackend, SqliteOptions};

    let options = SqliteOptions {
        fts_enabled: config.fts_enabled,
        wal_mode: config.wal_mode,
    };
    let mut backend = SqliteBackend::open(config.db_path.as_path(), options)
        .map_err(|e| format!("open {}: {e}", config.db_path))?;
    backend
        .ensure_schema()
        .map_err(|e| format!("schema for {}: {e}", config.db_path))?;
    Ok(Box::new(backend))
}

#[cfg(not(feature = "sqlite"))]
fn open_sqlite(_config: &MemoryConfig) -> Result<Box<dyn StorageBackend>, String> {
    Err("built without the sqlite feature".to_string())
}

fn read_schema_version(backend: &mut dyn StorageBackend) -> Option<u32> {
    let select = Command::Select {
        table: Table::MemoryMeta,
        predicate: Predicate::Eq("key", SCHEMA_VERSION_KEY.into()),
        order: Order::Unordered,
    };
    let rows = backend.execute(&select).ok()?;
    let value = rows.first()?.get("value");
    value
        .as_text()
        .and_then(|s| s.parse().ok())
        .or_else(|| value.as_integer().and_then(|n| u32::try_from(n).ok()))
}

fn describe_driver(state: &DriverState) -> String {
    match state {
        DriverState::NotProbed => "not probed".to_string(),
        DriverState::Found { version } => format!("sqlite {version}"),
        DriverState::NotFound { reason } => format!("not found: {reason}"),
    }
}

/// Insert after every entry with the same or an earlier timestamp.
fn insert_chronological(tier: &mut Vec<MemoryEntry>, entry: MemoryEntry) {
    let at = tier.partition_point(|e| e.timestamp <= entry.timestamp);
    tier.insert(at, entry);
}

// =============================================================================
// Tests
// =============================================================================
