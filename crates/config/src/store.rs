//! Store connection configuration

use serde::Deserialize;
use std::time::Duration;

/// Relational store settings
///
/// ```toml
/// [store]
/// path = "data/metrics.db"
/// statement_timeout = "10s"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Database location; `:memory:` keeps everything in process
    /// Default: ":memory:"
    pub path: String,

    /// Upper bound for every structure query and DDL statement.
    /// Expiry is reported as a temporary error.
    /// Default: 10s
    #[serde(with = "humantime_serde")]
    pub statement_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: ":memory:".into(),
            statement_timeout: Duration::from_secs(10),
        }
    }
}

impl StoreConfig {
    /// Whether the store lives only in memory
    pub fn is_memory(&self) -> bool {
        self.path == ":memory:"
    }
}
