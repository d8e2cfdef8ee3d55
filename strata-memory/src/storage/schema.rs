//! Schema - Versioned DDL for the SQLite Backend
//!
//! TigerStyle: Migrations are append-only and numbered contiguously up to
//! `SCHEMA_VERSION`. A fresh database runs every migration in order.

use crate::constants::SCHEMA_VERSION;

/// `memory_meta` key holding the applied schema version.
pub const SCHEMA_VERSION_KEY: &str = "schema_version";

/// One schema step.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    /// Version reached after applying
    pub version: u32,
    /// What the step does
    pub description: &'static str,
    /// Statements, executed in order inside one batch
    pub statements: &'static [&'static str],
}

/// Every migration, oldest first.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "base tables and indices",
        statements: &[
            "CREATE TABLE IF NOT EXISTS memories (
                id TEXT PRIMARY KEY,
                tier TEXT NOT NULL,
                content TEXT NOT NULL,
                type TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                metadata TEXT,
                embedding TEXT
            )",
            "CREATE INDEX IF NOT EXISTS idx_memories_tier ON memories(tier)",
            "CREATE INDEX IF NOT EXISTS idx_memories_timestamp ON memories(timestamp DESC)",
            "CREATE INDEX IF NOT EXISTS idx_memories_tier_type ON memories(tier, type)",
            "CREATE TABLE IF NOT EXISTS session_deltas (
                session_id TEXT PRIMARY KEY,
                last_indexed_turn INTEGER NOT NULL DEFAULT 0,
                last_indexed_at INTEGER NOT NULL,
                pending_turns INTEGER NOT NULL DEFAULT 0
            )",
            "CREATE TABLE IF NOT EXISTS memory_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
        ],
    },
    Migration {
        version: 2,
        description: "content hash and row bookkeeping timestamps",
        statements: &[
            "ALTER TABLE memories ADD COLUMN hash TEXT",
            "ALTER TABLE memories ADD COLUMN created_at INTEGER",
            "ALTER TABLE memories ADD COLUMN updated_at INTEGER",
            "CREATE INDEX IF NOT EXISTS idx_memories_hash ON memories(hash)",
        ],
    },
];

/// Full-text index over entry content. Created outside the migration chain
/// so a build without FTS5 still gets every other table.
pub const FTS_CREATE: &str = "CREATE VIRTUAL TABLE IF NOT EXISTS memories_fts USING fts5(
    id UNINDEXED,
    tier UNINDEXED,
    type UNINDEXED,
    content
)";

/// Repopulate the full-text index from `memories`.
pub const FTS_REBUILD: &[&str] = &[
    "DELETE FROM memories_fts",
    "INSERT INTO memories_fts (id, tier, type, content) SELECT id, tier, type, content FROM memories",
];

/// Migrations still to apply on top of `current`.
pub fn pending(current: u32) -> impl Iterator<Item = &'static Migration> {
    MIGRATIONS.iter().filter(move |m| m.version > current)
}

/// Latest version reachable through `MIGRATIONS`.
#[must_use]
pub fn latest_version() -> u32 {
    let latest = MIGRATIONS.last().map_or(0, |m| m.version);
    debug_assert_eq!(latest, SCHEMA_VERSION, "migrations out of sync");
    latest
}
