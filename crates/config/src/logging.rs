//! Logging configuration
//!
//! Controls how the `tabula` binary installs its tracing subscriber.

use serde::Deserialize;

/// Log level
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Every store round-trip and cache decision
    Trace,
    /// Live structure reads and skipped columns
    Debug,
    /// Executed DDL statements
    #[default]
    Info,
    /// Conflicting and dropped columns
    Warn,
    Error,
}

/// Target of the embedded store's own tracing output
const STORE_TARGET: &str = "turso_core";

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// `EnvFilter` directive for this level.
    ///
    /// The embedded store is capped at `warn` unless tracing is requested,
    /// so schema statements are not buried under its page-level chatter.
    pub fn directive(&self) -> String {
        match self {
            Self::Trace | Self::Warn | Self::Error => self.as_str().to_string(),
            Self::Debug | Self::Info => format!("{},{}=warn", self.as_str(), STORE_TARGET),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One line per event, for terminals
    #[default]
    Console,
    /// One JSON object per event, for log shippers
    Json,
}

/// Logging configuration
///
/// ```toml
/// [log]
/// level = "info"
/// format = "console"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default: info
    pub level: LogLevel,

    /// Default: console
    pub format: LogFormat,
}
