//! Driver Probe - Memoized SQLite Availability Check
//!
//! TigerStyle: Probe once per process, tri-state result, never re-probe a
//! missing driver.

use std::sync::OnceLock;

use tracing::{info, warn};

/// Result of looking for the SQLite driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverState {
    /// `probe` has not run yet
    NotProbed,
    /// Driver is usable
    Found {
        /// SQLite library version
        version: String,
    },
    /// Driver is missing or broken
    NotFound {
        /// Why it could not be used
        reason: String,
    },
}

impl DriverState {
    /// Whether the driver can be used.
    #[must_use]
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Found { .. })
    }
}

static DRIVER: OnceLock<DriverState> = OnceLock::new();

/// Probe for the driver, running the check at most once per process.
pub fn probe() -> &'static DriverState {
    DRIVER.get_or_init(|| {
        let state = detect();
        match &state {
            DriverState::Found { version } => info!(version = %version, "sqlite driver found"),
            DriverState::NotFound { reason } => warn!(reason = %reason, "sqlite driver not found"),
            DriverState::NotProbed => {}
        }
        state
    })
}

/// Current state without probing.
#[must_use]
pub fn state() -> DriverState {
    DRIVER.get().cloned().unwrap_or(DriverState::NotProbed)
}

#[cfg(feature = "sqlite")]
fn detect() -> DriverState {
    let checked = rusqlite::Connection::open_in_memory().and_then(|conn| {
        conn.query_row("SELECT sqlite_version()", [], |row| row.get::<_, String>(0))
    });
    match checked {
        Ok(version) => DriverState::Found { version },
        Err(err) => DriverState::NotFound {
            reason: err.to_string(),
        },
    }
}

#[cfg(not(feature = "sqlite"))]
fn detect() -> DriverState {
    DriverState::NotFound {
        reason: "built without the sqlite feature".to_string(),
    }
}
