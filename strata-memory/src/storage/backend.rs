//! Storage Backend Trait
//!
//! TigerStyle: Abstract interface for durable entry storage.
//!
//! # Simulation-First
//!
//! The in-process `FallbackBackend` (with optional fault injection) and the
//! SQLite backend satisfy the same contract. The manager only ever holds a
//! `Box<dyn StorageBackend>`.

use std::fmt;

use serde::Serialize;

use super::command::{Command, Row};
use super::error::StorageResult;
use crate::memory::Tier;

/// Which implementation is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Embedded SQLite database
    Sqlite,
    /// In-process tables
    Fallback,
}

impl BackendKind {
    /// Lowercase name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Fallback => "fallback",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a backend can do. Surfaced in the health report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    /// BEGIN/COMMIT/ROLLBACK are real
    pub transactions: bool,
    /// Full-text index is usable
    pub full_text: bool,
    /// Data survives a restart
    pub durable: bool,
    /// Write-ahead journaling is on
    pub wal: bool,
}

/// A full-text hit: entry id plus the engine's native rank (lower is better).
#[derive(Debug, Clone, PartialEq)]
pub struct RankedId {
    /// Entry id
    pub id: String,
    /// Engine rank
    pub rank: f64,
}

/// Abstract storage backend.
///
/// TigerStyle: Synchronous, single-writer, explicit errors.
pub trait StorageBackend: Send + fmt::Debug {
    /// Which implementation this is.
    fn kind(&self) -> BackendKind;

    /// Current capabilities.
    fn capabilities(&self) -> Capabilities;

    /// Create tables, indices and the full-text index; apply migrations.
    ///
    /// Idempotent. A full-text failure does not fail the call; it is
    /// reported by `index_error` instead.
    fn ensure_schema(&mut self) -> StorageResult<()>;

    /// Execute one command. Only `Select` returns rows.
    fn execute(&mut self, command: &Command) -> StorageResult<Vec<Row>>;

    /// Query the full-text index, restricted to `tiers`.
    ///
    /// Results are ordered best first.
    fn search_full_text(
        &mut self,
        query: &str,
        tiers: &[Tier],
        limit: usize,
    ) -> StorageResult<Vec<RankedId>>;

    /// Start a transaction.
    fn begin(&mut self) -> StorageResult<()>;

    /// Commit the open transaction.
    fn commit(&mut self) -> StorageResult<()>;

    /// Roll back the open transaction.
    fn rollback(&mut self) -> StorageResult<()>;

    /// Flush journaled writes before shutdown.
    fn checkpoint(&mut self) -> StorageResult<()>;

    /// Why the full-text index is unavailable, if it is.
    fn index_error(&self) -> Option<String>;
}
