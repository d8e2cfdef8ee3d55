//! Session Deltas - Per-Session Transcript Watermarks
//!
//! TigerStyle: Watermark only moves forward; turns at or below it are never
//! indexed again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entry::{EntryType, MemoryEntry};

/// Metadata marker for entries produced from transcripts.
pub const TRANSCRIPT_SOURCE: &str = "transcript";

/// Indexing progress for one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDeltaState {
    /// Highest turn number already indexed (0 = none)
    pub last_indexed_turn: u64,
    /// When the watermark last moved
    pub last_indexed_at: DateTime<Utc>,
    /// Turns seen but not yet indexed
    pub pending_turns: u64,
}

impl SessionDeltaState {
    /// State for a session that has never been indexed.
    #[must_use]
    pub fn unseen(now: DateTime<Utc>) -> Self {
        Self {
            last_indexed_turn: 0,
            last_indexed_at: now,
            pending_turns: 0,
        }
    }

    /// Move the watermark to `turn`, clearing pending turns.
    ///
    /// # Panics
    /// Panics if `turn` is below the current watermark.
    pub fn advance(&mut self, turn: u64, now: DateTime<Utc>) {
        // Precondition
        assert!(
            turn >= self.last_indexed_turn,
            "watermark cannot move backwards: {turn} < {}",
            self.last_indexed_turn
        );

        self.last_indexed_turn = turn;
        self.last_indexed_at = now;
        self.pending_turns = 0;
    }
}

/// One line of a conversation transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptEntry {
    /// 1-based turn number
    pub turn_number: u64,
    /// Speaker role (`user`, `assistant`, ...)
    pub role: String,
    /// Spoken text
    pub content: String,
    /// When the turn happened, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl TranscriptEntry {
    /// Create a transcript line without a timestamp.
    #[must_use]
    pub fn new(turn_number: u64, role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            turn_number,
            role: role.into(),
            content: content.into(),
            timestamp: None,
        }
    }

    /// Convert into an episodic entry tagged with its session.
    #[must_use]
    pub fn to_memory_entry(&self, session_id: &str, now: DateTime<Utc>) -> MemoryEntry {
        MemoryEntry::at(
            format!("[{}] {}", self.role, self.content),
            EntryType::Interaction,
            self.timestamp.unwrap_or(now),
        )
        .with_meta("session_id", session_id)
        .with_meta("role", self.role.as_str())
        .with_meta("turn_number", self.turn_number)
        .with_meta("source", TRANSCRIPT_SOURCE)
    }
}

/// Outcome of indexing a transcript.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeltaIndexResult {
    /// Turns written to episodic memory
    pub indexed: usize,
    /// Turns at or below the watermark
    pub skipped: usize,
}

/// Split a transcript into turns above the watermark.
///
/// Returns the new turns in input order.
#[must_use]
pub fn select_new_turns(watermark: u64, entries: &[TranscriptEntry]) -> Vec<&TranscriptEntry> {
    entries
        .iter()
        .filter(|entry| entry.turn_number > watermark)
        .collect()
}
