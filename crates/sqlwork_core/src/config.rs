//! Connection settings for opening a unit of work.
//!
//! # Responsibility
//! - Describe one connection (`ConnectionConfig`).
//! - Hold a default plus named connection strings loaded from TOML
//!   (`SqlConnectionConfiguration`).
//!
//! # Invariants
//! - A connection string is never empty or whitespace once validated.
//! - Validation happens before any connection is opened.

use crate::db::SqlDialect;
use crate::error::{UowError, UowResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Settings for one unit-of-work connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// File path, `:memory:`, or a `file:` URI.
    pub connection_string: String,
    #[serde(default)]
    pub dialect: SqlDialect,
    /// How long the driver waits on a locked database before failing.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl ConnectionConfig {
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
            dialect: SqlDialect::default(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }

    pub fn with_dialect(mut self, dialect: SqlDialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Rejects empty connection strings and dialects without a driver.
    ///
    /// # Errors
    /// - `UowError::Configuration` when the connection string is blank.
    /// - `UowError::Configuration` when the dialect cannot be opened by this
    ///   build (only SQLite has a driver).
    pub fn validate(&self) -> UowResult<()> {
        if self.connection_string.trim().is_empty() {
            return Err(UowError::Configuration(
                "a database connection string has not been provided".to_string(),
            ));
        }
        if !self.dialect.has_driver() {
            return Err(UowError::Configuration(format!(
                "no driver available for dialect `{}`",
                self.dialect.as_str()
            )));
        }
        Ok(())
    }
}

impl From<&str> for ConnectionConfig {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ConnectionConfig {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

/// Default and named connection strings.
///
/// ```toml
/// default = "/var/lib/app/main.db"
/// dialect = "sqlite"
///
/// [values]
/// reporting = "/var/lib/app/reporting.db"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlConnectionConfiguration {
    #[serde(default)]
    pub default: String,
    #[serde(default)]
    pub dialect: SqlDialect,
    #[serde(default)]
    pub values: BTreeMap<String, String>,
}

impl SqlConnectionConfiguration {
    pub fn from_toml_str(source: &str) -> UowResult<Self> {
        toml::from_str(source)
            .map_err(|err| UowError::Configuration(format!("invalid connection settings: {err}")))
    }

    /// Connection config for the default connection string.
    pub fn default_config(&self) -> ConnectionConfig {
        ConnectionConfig::new(self.default.clone()).with_dialect(self.dialect)
    }

    /// Connection config for a named connection string.
    ///
    /// # Errors
    /// - `UowError::Configuration` when `name` is not present in `values`.
    pub fn named(&self, name: &str) -> UowResult<ConnectionConfig> {
        let value = self.values.get(name).ok_or_else(|| {
            UowError::Configuration(format!("no connection string named `{name}`"))
        })?;
        Ok(ConnectionConfig::new(value.clone()).with_dialect(self.dialect))
    }
}
