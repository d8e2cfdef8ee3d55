//! Batch Upsert
//!
//! `TigerStyle`: All-or-nothing on a transactional backend, item by item on
//! the fallback.
//!
//! ```text
//! transactional   validate each ─► BEGIN ─► write all ─► COMMIT ─► apply to tiers
//!                                      └─ any failure ─► ROLLBACK, every item failed
//! fallback        validate ─► apply ─► best-effort write      (per item)
//! ```

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use super::{ErrorKind, MemoryManager, Placement};
use crate::memory::{generate_id, truncate_to_ms, EntryType, MemoryEntry, Metadata, Tier};
use crate::storage::StorageResult;

// =============================================================================
// Types
// =============================================================================

/// One item of a batch upsert.
///
/// An item whose id is found in the target tier updates that entry;
/// anything else creates a new entry (with a generated id if none is given).
#[derive(Debug, Clone, PartialEq)]
pub struct BatchItem {
    /// Existing or chosen id
    pub id: Option<String>,
    /// Entry content
    pub content: String,
    /// Entry type
    pub entry_type: EntryType,
    /// Timestamp; defaults to now for new entries and is kept for updates
    pub timestamp: Option<DateTime<Utc>>,
    /// Metadata
    pub metadata: Option<Metadata>,
    /// Embedding; an update without one keeps the stored embedding
    pub embedding: Option<Vec<f32>>,
}

impl BatchItem {
    /// Create an item for a new entry.
    #[must_use]
    pub fn new(content: impl Into<String>, entry_type: EntryType) -> Self {
        Self {
            id: None,
            content: content.into(),
            entry_type,
            timestamp: None,
            metadata: None,
            embedding: None,
        }
    }

    /// Target an id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the timestamp.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Set the metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Set the embedding.
    #[must_use]
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

impl From<MemoryEntry> for BatchItem {
    fn from(entry: MemoryEntry) -> Self {
        Self {
            id: Some(entry.id),
            content: entry.content,
            entry_type: entry.entry_type,
            timestamp: Some(entry.timestamp),
            metadata: entry.metadata,
            embedding: entry.embedding,
        }
    }
}

/// Why one item failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchError {
    /// Position in the batch
    pub index: usize,
    /// Item id, if it had or was given one
    pub id: Option<String>,
    /// What went wrong
    pub message: String,
}

/// Outcome of a batch upsert.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    /// New entries
    pub inserted: usize,
    /// Replaced entries
    pub updated: usize,
    /// Items not applied
    pub failed: usize,
    /// One error per failed item
    pub errors: Vec<BatchError>,
}

impl BatchResult {
    /// Items applied.
    #[must_use]
    pub fn applied(&self) -> usize {
        self.inserted + self.updated
    }

    fn fail(&mut self, index: usize, id: Option<String>, message: impl Into<String>) {
        self.failed += 1;
        self.errors.push(BatchError {
            index,
            id,
            message: message.into(),
        });
    }

    fn count(&mut self, placement: Placement) {
        match placement {
            Placement::Inserted => self.inserted += 1,
            Placement::Updated => self.updated += 1,
        }
    }
}

struct Prepared {
    index: usize,
    entry: MemoryEntry,
}

// =============================================================================
// Manager
// =============================================================================

impl MemoryManager {
    /// Insert or update many entries in one tier.
    ///
    /// On a transactional backend the whole batch commits or none of it
    /// does; on the fallback each item stands alone. Items failing
    /// validation fail individually either way. The scratchpad tier rejects
    /// every item.
    #[tracing::instrument(skip(self, items), fields(items = items.len()))]
    pub fn batch_upsert(&mut self, items: Vec<BatchItem>, tier: Tier) -> BatchResult {
        let total = items.len();
        let mut result = BatchResult::default();

        if !tier.is_durable() {
            for (index, item) in items.into_iter().enumerate() {
                result.fail(index, item.id, "scratchpad tier does not hold entries");
            }
            return result;
        }

        let mut prepared = Vec::with_capacity(total);
        let mut seen: HashSet<String> = HashSet::new();
        for (index, item) in items.into_iter().enumerate() {
            let entry = self.resolve(item, tier, &seen);
            match entry.validate() {
                Ok(()) => {
                    seen.insert(entry.id.clone());
                    prepared.push(Prepared { index, entry });
                }
                Err(reason) => result.fail(index, Some(entry.id), reason),
            }
        }

        if self.backend.capabilities().transactions {
            self.apply_atomically(prepared, tier, total, &mut result);
        } else {
            for Prepared { entry, .. } in prepared {
                self.persist_entry(&entry, tier);
                let placement = self.place(entry, tier);
                result.count(placement);
            }
        }

        if tier == Tier::Episodic && result.applied() > 0 {
            self.maybe_auto_compact();
        }

        // Postcondition
        debug_assert_eq!(result.applied() + result.failed, total);
        info!(
            tier = %tier,
            inserted = result.inserted,
            updated = result.updated,
            failed = result.failed,
            "batch upsert"
        );
        result
    }

    fn apply_atomically(
        &mut self,
        prepared: Vec<Prepared>,
        tier: Tier,
        total: usize,
        result: &mut BatchResult,
    ) {
        if prepared.is_empty() {
            return;
        }

        if let Err(e) = self.write_all(&prepared, tier) {
            self.record(ErrorKind::PersistFailure, format!("batch rolled back: {e}"));
            self.roll_back("batch upsert");

            let message = format!("batch rolled back: {e}");
            let mut errors = std::mem::take(&mut result.errors);
            for item in &prepared {
                errors.push(BatchError {
                    index: item.index,
                    id: Some(item.entry.id.clone()),
                    message: message.clone(),
                });
            }
            errors.sort_by_key(|e| e.index);
            *result = BatchResult {
                inserted: 0,
                updated: 0,
                failed: total,
                errors,
            };
            return;
        }

        for Prepared { entry, .. } in prepared {
            let placement = self.place(entry, tier);
            result.count(placement);
        }
    }

    fn write_all(&mut self, prepared: &[Prepared], tier: Tier) -> StorageResult<()> {
        self.backend.begin()?;
        for item in prepared {
            self.try_persist_entry(&item.entry, tier)?;
        }
        self.backend.commit()
    }

    /// Turn an item into the entry it will become.
    fn resolve(&self, item: BatchItem, tier: Tier, seen: &HashSet<String>) -> MemoryEntry {
        let existing = item.id.as_deref().and_then(|id| match self.locate(id) {
            Some((found, index)) if found == tier => Some(&self.tier(tier)[index]),
            _ => None,
        });

        let now = self.time.now();
        let timestamp = truncate_to_ms(
            item.timestamp
                .or_else(|| existing.map(|e| e.timestamp))
                .unwrap_or(now),
        );
        let id = match item.id {
            Some(id) => id,
            None => unique_id(timestamp, seen),
        };
        let embedding = item
            .embedding
            .or_else(|| existing.and_then(|e| e.embedding.clone()));

        MemoryEntry {
            id,
            content: item.content,
            entry_type: item.entry_type,
            timestamp,
            metadata: item.metadata,
            embedding,
        }
    }
}

fn unique_id(timestamp: DateTime<Utc>, seen: &HashSet<String>) -> String {
    loop {
        let id = generate_id(timestamp);
        if !seen.contains(&id) {
            return id;
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
