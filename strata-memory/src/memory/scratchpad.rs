//! Scratchpad - Session-Scoped Key/Value Store
//!
//! TigerStyle: Explicit limits, no persistence, no expiry.
//!
//! # Design
//!
//! The scratchpad holds raw JSON values for the current session. Values
//! carry no timestamp and are never written to the storage backend; they
//! only leave the process through a snapshot.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::constants::{SCRATCHPAD_ENTRIES_COUNT_MAX, SCRATCHPAD_KEY_BYTES_MAX};

// =============================================================================
// Error Types
// =============================================================================

/// Errors from scratchpad operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScratchpadError {
    /// Empty key
    #[error("scratchpad key is empty")]
    EmptyKey,

    /// Key too long
    #[error("key too long: {len} bytes exceeds max {max_len}")]
    KeyTooLong {
        /// Key length
        len: usize,
        /// Maximum allowed
        max_len: usize,
    },

    /// Too many entries
    #[error("too many entries: {count} exceeds max {max_count}")]
    TooManyEntries {
        /// Current entry count
        count: usize,
        /// Maximum allowed
        max_count: usize,
    },
}

/// Result type for scratchpad operations.
pub type ScratchpadResult<T> = Result<T, ScratchpadError>;

// =============================================================================
// Scratchpad
// =============================================================================

/// Volatile key/value store for the current session.
#[derive(Debug, Clone, Default)]
pub struct Scratchpad {
    entries: BTreeMap<String, Value>,
}

impl Scratchpad {
    /// Create an empty scratchpad.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value, replacing any previous value under `key`.
    ///
    /// # Errors
    /// Returns error if the key is empty or too long, or if storing a new key
    /// would exceed `SCRATCHPAD_ENTRIES_COUNT_MAX`.
    pub fn set(&mut self, key: &str, value: Value) -> ScratchpadResult<()> {
        // Preconditions
        if key.is_empty() {
            return Err(ScratchpadError::EmptyKey);
        }
        if key.len() > SCRATCHPAD_KEY_BYTES_MAX {
            return Err(ScratchpadError::KeyTooLong {
                len: key.len(),
                max_len: SCRATCHPAD_KEY_BYTES_MAX,
            });
        }
        if !self.entries.contains_key(key) && self.entries.len() >= SCRATCHPAD_ENTRIES_COUNT_MAX {
            return Err(ScratchpadError::TooManyEntries {
                count: self.entries.len() + 1,
                max_count: SCRATCHPAD_ENTRIES_COUNT_MAX,
            });
        }

        self.entries.insert(key.to_string(), value);

        // Postcondition
        debug_assert!(self.entries.len() <= SCRATCHPAD_ENTRIES_COUNT_MAX);
        Ok(())
    }

    /// Get a value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Remove a value. Returns it if it existed.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }

    /// Remove every value.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All values, ordered by key.
    #[must_use]
    pub fn entries(&self) -> &BTreeMap<String, Value> {
        &self.entries
    }

    /// Replace the whole map (snapshot import).
    ///
    /// Keys that break the scratchpad limits are dropped.
    pub fn replace(&mut self, entries: BTreeMap<String, Value>) -> usize {
        self.entries.clear();
        let mut dropped = 0;
        for (key, value) in entries {
            if self.set(&key, value).is_err() {
                dropped += 1;
            }
        }
        dropped
    }
}

// =============================================================================
// Tests
// =============================================================================
