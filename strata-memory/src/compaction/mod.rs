//! Compaction - Archiving Old Episodic Entries into Summaries
//!
//! `TigerStyle`: Pure planning functions; the manager applies the plan to the
//! tiers, the cache and the backend.
//!
//! # Two Paths
//!
//! ```text
//! automatic  len > 2×max_results  and  len > threshold × 2×max_results
//!            → oldest (len − max_results) entries → ONE summary
//! explicit   run_compaction(target)
//!            → oldest (len − target) entries, grouped by type → one summary per type
//! ```
//!
//! Summaries are `EntryType::Summary` entries destined for the semantic tier.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::constants::{
    COMPACTION_PREVIEW_CHARS_MAX, COMPACTION_PREVIEW_ENTRIES_COUNT_MAX,
    TIER_EPISODIC_COMPACTION_MULTIPLIER,
};
use crate::memory::{EntryType, MemoryEntry};

/// Content of a summary built from nothing.
pub const EMPTY_ARCHIVE: &str = "Empty archive";

/// `source` metadata value on summary entries.
pub const COMPACTION_SOURCE: &str = "compaction";

// =============================================================================
// Result
// =============================================================================

/// Outcome of a compaction run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompactionResult {
    /// Entries removed from the tier
    pub archived: usize,
    /// Summary entries added to semantic
    pub summaries_created: usize,
    /// Tier size before
    pub entries_before: usize,
    /// Tier size after
    pub entries_after: usize,
}

impl CompactionResult {
    /// A run that changed nothing.
    #[must_use]
    pub fn unchanged(size: usize) -> Self {
        Self {
            archived: 0,
            summaries_created: 0,
            entries_before: size,
            entries_after: size,
        }
    }
}

// =============================================================================
// Planning
// =============================================================================

/// Whether adding to episodic should trigger automatic compaction.
#[must_use]
pub fn should_auto_compact(len: usize, max_results: usize, threshold: f64) -> bool {
    let armed_at = TIER_EPISODIC_COMPACTION_MULTIPLIER * max_results;
    len > armed_at && len as f64 > threshold * armed_at as f64
}

/// Split entries into (archive, keep): the oldest `len − keep` by timestamp
/// are archived. Both halves stay chronological; equal timestamps keep their
/// original order.
#[must_use]
pub fn split_oldest(
    mut entries: Vec<MemoryEntry>,
    keep: usize,
) -> (Vec<MemoryEntry>, Vec<MemoryEntry>) {
    if entries.len() <= keep {
        return (Vec::new(), entries);
    }

    entries.sort_by_key(|e| e.timestamp);
    let kept = entries.split_off(entries.len() - keep);

    // Postcondition
    debug_assert_eq!(kept.len(), keep);
    (entries, kept)
}

// =============================================================================
// Summaries
// =============================================================================

/// The single summary produced by automatic compaction.
#[must_use]
pub fn auto_summary(archived: &[MemoryEntry], now: DateTime<Utc>) -> MemoryEntry {
    let content = match time_range(archived) {
        None => EMPTY_ARCHIVE.to_string(),
        Some((start, end)) => format!(
            "Archived summary of {} interactions ({} to {})",
            archived.len(),
            start.to_rfc3339_opts(SecondsFormat::Millis, true),
            end.to_rfc3339_opts(SecondsFormat::Millis, true),
        ),
    };
    summary_entry(content, archived, "auto", now)
}

/// Text of one per-type summary.
///
/// `Archived summary of N <type> entries (YYYY-MM-DD to YYYY-MM-DD): preview`,
/// where the preview quotes the first characters of the first few entries.
#[must_use]
pub fn summarize_group(entry_type: &EntryType, group: &[MemoryEntry]) -> String {
    let Some((start, end)) = time_range(group) else {
        return EMPTY_ARCHIVE.to_string();
    };

    let preview: Vec<String> = group
        .iter()
        .take(COMPACTION_PREVIEW_ENTRIES_COUNT_MAX)
        .map(|e| e.content.chars().take(COMPACTION_PREVIEW_CHARS_MAX).collect())
        .collect();

    format!(
        "Archived summary of {} {entry_type} entries ({} to {}): {}",
        group.len(),
        start.format("%Y-%m-%d"),
        end.format("%Y-%m-%d"),
        preview.join("; ")
    )
}

/// One summary per entry type, in type order.
#[must_use]
pub fn group_summaries(archived: &[MemoryEntry], now: DateTime<Utc>) -> Vec<MemoryEntry> {
    let mut groups: BTreeMap<&EntryType, Vec<MemoryEntry>> = BTreeMap::new();
    for entry in archived {
        groups
            .entry(&entry.entry_type)
            .or_default()
            .push(entry.clone());
    }

    groups
        .into_iter()
        .map(|(entry_type, group)| {
            let content = summarize_group(entry_type, &group);
            summary_entry(content, &group, "explicit", now)
                .with_meta("archived_type", entry_type.as_str())
        })
        .collect()
}

fn summary_entry(
    content: String,
    archived: &[MemoryEntry],
    mode: &str,
    now: DateTime<Utc>,
) -> MemoryEntry {
    let mut summary = MemoryEntry::at(content, EntryType::Summary, now)
        .with_meta("source", COMPACTION_SOURCE)
        .with_meta("mode", mode)
        .with_meta("archived_count", archived.len());

    if let Some((start, end)) = time_range(archived) {
        summary = summary
            .with_meta("range_start", start.to_rfc3339_opts(SecondsFormat::Millis, true))
            .with_meta("range_end", end.to_rfc3339_opts(SecondsFormat::Millis, true));
    }
    summary
}

fn time_range(entries: &[MemoryEntry]) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let start = entries.iter().map(|e| e.timestamp).min()?;
    let end = entries.iter().map(|e| e.timestamp).max()?;
    Some((start, end))
}

// =============================================================================
// Tests
// =============================================================================
