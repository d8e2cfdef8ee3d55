//! Storage Errors
//!
//! `TigerStyle`: Explicit error types with context.

use thiserror::Error;

/// Errors from storage operations.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// Backend could not be opened
    #[error("connection error: {message}")]
    Connection {
        /// Connection error message
        message: String,
    },

    /// Statement failed
    #[error("query error: {message}")]
    Query {
        /// Query error message
        message: String,
    },

    /// Schema creation or migration failed
    #[error("schema error: {message}")]
    Schema {
        /// Schema error message
        message: String,
    },

    /// Full-text index missing or failing
    #[error("index unavailable: {message}")]
    IndexUnavailable {
        /// Why the index is unavailable
        message: String,
    },

    /// Transaction begin/commit/rollback failed
    #[error("transaction error: {message}")]
    Transaction {
        /// Transaction error message
        message: String,
    },

    /// Command does not fit the table
    #[error("invalid command: {message}")]
    InvalidCommand {
        /// What was wrong
        message: String,
    },

    /// Operation not supported by this backend
    #[error("unsupported by {backend} backend: {operation}")]
    Unsupported {
        /// Backend kind
        backend: &'static str,
        /// Operation name
        operation: &'static str,
    },

    /// Row could not be decoded
    #[error("malformed row: {message}")]
    Malformed {
        /// Decode error message
        message: String,
    },

    /// Simulated fault (for DST)
    #[error("simulated fault: {fault_type}")]
    SimulatedFault {
        /// Type of simulated fault
        fault_type: String,
    },
}

impl StorageError {
    /// Create a connection error.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create a query error.
    #[must_use]
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
        }
    }

    /// Create a schema error.
    #[must_use]
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
        }
    }

    /// Create an index-unavailable error.
    #[must_use]
    pub fn index_unavailable(message: impl Into<String>) -> Self {
        Self::IndexUnavailable {
            message: message.into(),
        }
    }

    /// Create a transaction error.
    #[must_use]
    pub fn transaction(message: impl Into<String>) -> Self {
        Self::Transaction {
            message: message.into(),
        }
    }

    /// Create an invalid-command error.
    #[must_use]
    pub fn invalid_command(message: impl Into<String>) -> Self {
        Self::InvalidCommand {
            message: message.into(),
        }
    }

    /// Create a malformed-row error.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }

    /// Create a simulated fault error.
    #[must_use]
    pub fn simulated_fault(fault_type: impl Into<String>) -> Self {
        Self::SimulatedFault {
            fault_type: fault_type.into(),
        }
    }

    /// Check if this is a transient error (can be retried).
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::Transaction { .. } | Self::SimulatedFault { .. }
        )
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        Self::query(err.to_string())
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
