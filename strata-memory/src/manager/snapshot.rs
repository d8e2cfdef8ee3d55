//! Snapshot - Full-State Export and Import
//!
//! `TigerStyle`: Versioned format, validate before replacing anything.
//!
//! ```json
//! {
//!   "version": 1,
//!   "exportedAt": "2024-01-01T00:00:00Z",
//!   "scratchpad": { "goal": "ship" },
//!   "episodic": [ { "id": "mem_…", "content": "…", "type": "interaction", "timestamp": "…" } ],
//!   "semantic": [ … ],
//!   "sessionDeltas": { "s1": { "lastIndexedTurn": 3, "lastIndexedAt": "…", "pendingTurns": 0 } }
//! }
//! ```
//!
//! Cache statistics are not part of a snapshot.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use super::{ErrorKind, MemoryError, MemoryManager, MemoryResult};
use crate::constants::SNAPSHOT_VERSION;
use crate::memory::{MemoryEntry, SessionDeltaState, Tier};
use crate::storage::{delta_upsert, Command, StorageResult, Table};

/// Everything needed to rebuild a manager's state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemorySnapshot {
    /// Format version
    pub version: u32,
    /// When the snapshot was taken
    pub exported_at: DateTime<Utc>,
    /// Scratchpad values
    #[serde(default)]
    pub scratchpad: BTreeMap<String, Value>,
    /// Episodic entries, chronological
    #[serde(default)]
    pub episodic: Vec<MemoryEntry>,
    /// Semantic entries, chronological
    #[serde(default)]
    pub semantic: Vec<MemoryEntry>,
    /// Session watermarks
    #[serde(default)]
    pub session_deltas: BTreeMap<String, SessionDeltaState>,
}

impl MemorySnapshot {
    /// Serialize as pretty JSON.
    ///
    /// # Errors
    /// Returns `MemoryError::SnapshotFormat` if serialization fails.
    pub fn to_json(&self) -> MemoryResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse from JSON.
    ///
    /// # Errors
    /// Returns `MemoryError::SnapshotFormat` for malformed JSON.
    pub fn from_json(json: &str) -> MemoryResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Check the snapshot can be imported.
    ///
    /// # Errors
    /// Returns `MemoryError::SnapshotVersion` for a newer format and
    /// `MemoryError::InvalidEntry` for an entry that fails validation or an
    /// id present more than once.
    pub fn validate(&self) -> MemoryResult<()> {
        if self.version > SNAPSHOT_VERSION {
            return Err(MemoryError::SnapshotVersion {
                found: self.version,
                supported: SNAPSHOT_VERSION,
            });
        }

        let mut ids: HashSet<&str> = HashSet::new();
        for entry in self.episodic.iter().chain(&self.semantic) {
            entry.validate().map_err(MemoryError::invalid_entry)?;
            if !ids.insert(entry.id.as_str()) {
                return Err(MemoryError::invalid_entry(format!(
                    "entry {} appears more than once",
                    entry.id
                )));
            }
        }
        Ok(())
    }
}

impl MemoryManager {
    /// Capture the current state.
    #[must_use]
    pub fn export_snapshot(&self) -> MemorySnapshot {
        MemorySnapshot {
            version: SNAPSHOT_VERSION,
            exported_at: self.time.now(),
            scratchpad: self.scratchpad.entries().clone(),
            episodic: self.episodic.clone(),
            semantic: self.semantic.clone(),
            session_deltas: self.session_deltas.clone(),
        }
    }

    /// Replace all state with a snapshot and re-persist it.
    ///
    /// The in-memory state is replaced even if persisting fails; that
    /// failure is recorded. On a transactional backend the store is
    /// rewritten in one transaction.
    ///
    /// # Errors
    /// Returns an error, leaving the state untouched, if the snapshot fails
    /// `MemorySnapshot::validate`.
    #[tracing::instrument(skip(self, snapshot), fields(
        episodic = snapshot.episodic.len(),
        semantic = snapshot.semantic.len()
    ))]
    pub fn import_snapshot(&mut self, snapshot: MemorySnapshot) -> MemoryResult<()> {
        snapshot.validate()?;

        let MemorySnapshot {
            scratchpad,
            mut episodic,
            mut semantic,
            session_deltas,
            ..
        } = snapshot;

        let dropped = self.scratchpad.replace(scratchpad);
        if dropped > 0 {
            warn!(dropped, "scratchpad keys over limits dropped on import");
        }
        episodic.sort_by_key(|e| e.timestamp);
        semantic.sort_by_key(|e| e.timestamp);
        self.episodic = episodic;
        self.semantic = semantic;
        self.session_deltas = session_deltas;
        self.cache.clear();

        if self.backend.capabilities().transactions {
            if let Err(e) = self.rewrite_store_atomically() {
                self.record(ErrorKind::PersistFailure, format!("snapshot import: {e}"));
                self.roll_back("snapshot import");
            }
        } else {
            self.rewrite_store_best_effort();
        }

        info!(
            episodic = self.episodic.len(),
            semantic = self.semantic.len(),
            sessions = self.session_deltas.len(),
            "snapshot imported"
        );
        Ok(())
    }

    fn rewrite_store_atomically(&mut self) -> StorageResult<()> {
        self.backend.begin()?;
        for command in self.truncate_commands() {
            self.backend.execute(&command)?;
        }
        for (entry, tier) in self.all_entries() {
            self.try_persist_entry(&entry, tier)?;
        }
        for command in self.delta_commands() {
            self.backend.execute(&command)?;
        }
        self.backend.commit()
    }

    fn rewrite_store_best_effort(&mut self) {
        for command in self.truncate_commands() {
            if let Err(e) = self.backend.execute(&command) {
                self.record(ErrorKind::PersistFailure, format!("{}: {e}", command.label()));
            }
        }
        for (entry, tier) in self.all_entries() {
            self.persist_entry(&entry, tier);
        }
        let sessions: Vec<String> = self.session_deltas.keys().cloned().collect();
        for session_id in sessions {
            self.persist_delta(&session_id);
        }
    }

    fn truncate_commands(&self) -> Vec<Command> {
        let mut tables = vec![Table::Memories, Table::SessionDeltas];
        if self.backend.capabilities().full_text {
            tables.push(Table::MemoriesFts);
        }
        tables
            .into_iter()
            .map(|table| Command::Truncate { table })
            .collect()
    }

    fn all_entries(&self) -> Vec<(MemoryEntry, Tier)> {
        self.episodic
            .iter()
            .map(|e| (e.clone(), Tier::Episodic))
            .chain(self.semantic.iter().map(|e| (e.clone(), Tier::Semantic)))
            .collect()
    }

    fn delta_commands(&self) -> Vec<Command> {
        self.session_deltas
            .iter()
            .map(|(session_id, state)| delta_upsert(session_id, state))
            .collect()
    }
}
