//! Row Codec - Entries and Deltas to and from Rows
//!
//! TigerStyle: Required columns fail the row; optional JSON columns that do
//! not parse are dropped and reported, never fatal.

use chrono::{DateTime, Utc};

use super::command::{Command, Row, Table};
use super::error::{StorageError, StorageResult};
use crate::memory::{EntryType, MemoryEntry, Metadata, SessionDeltaState, Tier};

/// An entry read back from storage.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedEntry {
    /// The entry (optional fields dropped if malformed)
    pub entry: MemoryEntry,
    /// Tier the row belongs to
    pub tier: Tier,
    /// Columns that could not be decoded
    pub malformed: Vec<&'static str>,
}

// =============================================================================
// Entries
// =============================================================================

/// Upsert command for an entry row.
#[must_use]
pub fn entry_upsert(entry: &MemoryEntry, tier: Tier, now: DateTime<Utc>) -> Command {
    // Precondition
    assert!(tier.is_durable(), "scratchpad entries are never persisted");

    let metadata = entry
        .metadata
        .as_ref()
        .and_then(|m| serde_json::to_string(m).ok());
    let embedding = entry
        .embedding
        .as_ref()
        .and_then(|e| serde_json::to_string(e).ok());

    Command::upsert(
        Table::Memories,
        vec![
            ("id", entry.id.as_str().into()),
            ("tier", tier.as_str().into()),
            ("content", entry.content.as_str().into()),
            ("type", entry.entry_type.as_str().into()),
            ("timestamp", entry.timestamp.timestamp_millis().into()),
            ("metadata", metadata.into()),
            ("embedding", embedding.into()),
            ("hash", entry.content_hash().into()),
            ("created_at", entry.timestamp.timestamp_millis().into()),
            ("updated_at", now.timestamp_millis().into()),
        ],
    )
}

/// Commands that replace an entry's full-text row (delete, then insert).
#[must_use]
pub fn fts_replace(entry: &MemoryEntry, tier: Tier) -> [Command; 2] {
    [
        Command::delete(Table::MemoriesFts, entry.id.as_str()),
        Command::upsert(
            Table::MemoriesFts,
            vec![
                ("id", entry.id.as_str().into()),
                ("tier", tier.as_str().into()),
                ("type", entry.entry_type.as_str().into()),
                ("content", entry.content.as_str().into()),
            ],
        ),
    ]
}

/// Decode a `memories` row.
///
/// # Errors
/// Returns a malformed-row error if id, tier, content, type or timestamp is
/// missing or unreadable.
pub fn decode_entry(row: &Row) -> StorageResult<DecodedEntry> {
    debug_assert_eq!(row.table(), Table::Memories);

    let id = row.text("id")?.to_string();
    let tier: Tier = row
        .text("tier")?
        .parse()
        .map_err(|e: String| StorageError::malformed(format!("{id}: {e}")))?;
    let timestamp = millis_to_datetime(row.integer("timestamp")?)
        .ok_or_else(|| StorageError::malformed(format!("{id}: timestamp out of range")))?;

    let mut malformed = Vec::new();
    let metadata = row.opt_text("metadata").and_then(|raw| {
        serde_json::from_str::<Metadata>(raw)
            .map_err(|_| malformed.push("metadata"))
            .ok()
    });
    let embedding = row.opt_text("embedding").and_then(|raw| {
        serde_json::from_str::<Vec<f32>>(raw)
            .map_err(|_| malformed.push("embedding"))
            .ok()
    });

    Ok(DecodedEntry {
        entry: MemoryEntry {
            id,
            content: row.text("content")?.to_string(),
            entry_type: EntryType::from(row.text("type")?),
            timestamp,
            metadata,
            embedding,
        },
        tier,
        malformed,
    })
}

// =============================================================================
// Session Deltas
// =============================================================================

/// Upsert command for a session delta row.
#[must_use]
pub fn delta_upsert(session_id: &str, state: &SessionDeltaState) -> Command {
    Command::upsert(
        Table::SessionDeltas,
        vec![
            ("session_id", session_id.into()),
            ("last_indexed_turn", to_i64(state.last_indexed_turn).into()),
            (
                "last_indexed_at",
                state.last_indexed_at.timestamp_millis().into(),
            ),
            ("pending_turns", to_i64(state.pending_turns).into()),
        ],
    )
}

/// Decode a `session_deltas` row.
///
/// # Errors
/// Returns a malformed-row error if any column is missing or negative.
pub fn decode_delta(row: &Row) -> StorageResult<(String, SessionDeltaState)> {
    debug_assert_eq!(row.table(), Table::SessionDeltas);

    let session_id = row.text("session_id")?.to_string();
    let non_negative = |column: &str| -> StorageResult<u64> {
        u64::try_from(row.integer(column)?).map_err(|_| {
            StorageError::malformed(format!("{session_id}: negative {column}"))
        })
    };

    let state = SessionDeltaState {
        last_indexed_turn: non_negative("last_indexed_turn")?,
        last_indexed_at: millis_to_datetime(row.integer("last_indexed_at")?).ok_or_else(
            || StorageError::malformed(format!("{session_id}: last_indexed_at out of range")),
        )?,
        pending_turns: non_negative("pending_turns")?,
    };
    Ok((session_id, state))
}

// =============================================================================
// Helpers
// =============================================================================

fn millis_to_datetime(ms: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
