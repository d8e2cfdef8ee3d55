//! Manager Errors
//!
//! `TigerStyle`: Only caller mistakes surface as errors. Durability problems
//! are recorded in the health report instead.

use thiserror::Error;

use crate::memory::{ScratchpadError, Tier};

/// Errors from memory operations.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// Entry failed validation
    #[error("invalid entry: {reason}")]
    InvalidEntry {
        /// What is wrong with it
        reason: String,
    },

    /// No live entry has this id
    #[error("entry not found: {id}")]
    EntryNotFound {
        /// The id looked up
        id: String,
    },

    /// Embedding is empty or contains non-finite values
    #[error("invalid embedding for {id}: {reason}")]
    InvalidEmbedding {
        /// Entry id
        id: String,
        /// What is wrong with it
        reason: String,
    },

    /// Scratchpad limit violated
    #[error(transparent)]
    Scratchpad(#[from] ScratchpadError),

    /// Compaction asked of a tier that is never compacted
    #[error("compaction is not supported for the {tier} tier")]
    CompactionUnsupported {
        /// Requested tier
        tier: Tier,
    },

    /// Snapshot written by a newer format
    #[error("snapshot version {found} is newer than supported version {supported}")]
    SnapshotVersion {
        /// Version in the snapshot
        found: u32,
        /// Newest version this build reads
        supported: u32,
    },

    /// Snapshot could not be parsed or written
    #[error("snapshot format error: {reason}")]
    SnapshotFormat {
        /// Parser message
        reason: String,
    },
}

impl MemoryError {
    /// Create an invalid-entry error.
    #[must_use]
    pub fn invalid_entry(reason: impl Into<String>) -> Self {
        Self::InvalidEntry {
            reason: reason.into(),
        }
    }

    /// Create a not-found error.
    #[must_use]
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::EntryNotFound { id: id.into() }
    }
}

impl From<serde_json::Error> for MemoryError {
    fn from(err: serde_json::Error) -> Self {
        Self::SnapshotFormat {
            reason: err.to_string(),
        }
    }
}

/// Result type for memory operations.
pub type MemoryResult<T> = Result<T, MemoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = MemoryError::CompactionUnsupported {
            tier: Tier::Semantic,
        };
        assert_eq!(
            err.to_string(),
            "compaction is not supported for the semantic tier"
        );

        let err = MemoryError::SnapshotVersion {
            found: 9,
            supported: 1,
        };
        assert!(err.to_string().contains("version 9"));

        let err: MemoryError = ScratchpadError::EmptyKey.into();
        assert!(matches!(err, MemoryError::Scratchpad(_)));
    }

    #[test]
    fn test_from_json_error() {
        let parse = serde_json::from_str::<u32>("nope").unwrap_err();
        let err: MemoryError = parse.into();
        assert!(matches!(err, MemoryError::SnapshotFormat { .. }));
    }
}
