//! Logging Initialization
//!
//! `TigerStyle`: Optional subscriber setup that never panics. Library code only
//! emits `tracing` events; binaries and tests opt in here.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use strata_memory::telemetry::{init_logging, LoggingConfig};
//!
//! // Defaults: RUST_LOG if set, otherwise "strata_memory=info"
//! init_logging(LoggingConfig::default()).expect("logging init");
//!
//! // Or configure explicitly
//! let config = LoggingConfig::builder()
//!     .default_filter("strata_memory=debug")
//!     .ansi(false)
//!     .build();
//! let _ = init_logging(config);
//! ```
//!
//! ## Environment Variables
//!
//! - `RUST_LOG` - Filter directives, overriding the configured default

use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset or invalid.
pub const LOG_FILTER_DEFAULT: &str = "strata_memory=info";

/// Logging setup errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// The default filter did not parse
    #[error("invalid log filter '{filter}': {reason}")]
    InvalidFilter {
        /// The rejected directive string
        filter: String,
        /// Parser message
        reason: String,
    },

    /// A global subscriber is already installed
    #[error("logging initialization failed: {reason}")]
    InitFailed {
        /// The reason for the failure
        reason: String,
    },
}

/// Result type for telemetry operations
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Configuration for the fmt subscriber
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Directives applied when `RUST_LOG` is absent
    pub default_filter: String,
    /// Colored output
    pub ansi: bool,
    /// Print the event target (module path)
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default_filter: LOG_FILTER_DEFAULT.to_string(),
            ansi: true,
            with_target: true,
        }
    }
}

impl LoggingConfig {
    /// Create a new builder for `LoggingConfig`
    #[must_use]
    pub fn builder() -> LoggingConfigBuilder {
        LoggingConfigBuilder::default()
    }

    /// Filter from `RUST_LOG`, else the configured default.
    fn env_filter(&self) -> Result<EnvFilter> {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return Ok(filter);
        }
        EnvFilter::try_new(&self.default_filter).map_err(|e| TelemetryError::InvalidFilter {
            filter: self.default_filter.clone(),
            reason: e.to_string(),
        })
    }
}

/// Builder for `LoggingConfig`
#[derive(Debug, Default)]
pub struct LoggingConfigBuilder {
    default_filter: Option<String>,
    ansi: Option<bool>,
    with_target: Option<bool>,
}

impl LoggingConfigBuilder {
    /// Set the fallback filter directives
    #[must_use]
    pub fn default_filter(mut self, filter: impl Into<String>) -> Self {
        self.default_filter = Some(filter.into());
        self
    }

    /// Enable or disable colored output
    #[must_use]
    pub fn ansi(mut self, ansi: bool) -> Self {
        self.ansi = Some(ansi);
        self
    }

    /// Enable or disable event targets
    #[must_use]
    pub fn with_target(mut self, with_target: bool) -> Self {
        self.with_target = Some(with_target);
        self
    }

    /// Build the `LoggingConfig`
    #[must_use]
    pub fn build(self) -> LoggingConfig {
        let default = LoggingConfig::default();
        LoggingConfig {
            default_filter: self.default_filter.unwrap_or(default.default_filter),
            ansi: self.ansi.unwrap_or(default.ansi),
            with_target: self.with_target.unwrap_or(default.with_target),
        }
    }
}

/// Install a global fmt subscriber.
///
/// # Errors
///
/// Returns `TelemetryError::InvalidFilter` if the default filter does not
/// parse, and `TelemetryError::InitFailed` if a global subscriber already
/// exists. Neither leaves the process without logging it already had.
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    let filter = config.env_filter()?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(config.ansi)
        .with_target(config.with_target)
        .try_init()
        .map_err(|e| TelemetryError::InitFailed {
            reason: e.to_string(),
        })?;

    tracing::debug!(default_filter = %config.default_filter, "logging initialized");
    Ok(())
}
