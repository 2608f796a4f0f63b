//! Configuration error types

use std::io;
use thiserror::Error;

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur when loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file
    #[error("failed to read config file '{path}': {source}")]
    IoError {
        /// Path to the file
        path: String,
        /// Underlying IO error
        #[source]
        source: io::Error,
    },

    /// Failed to parse TOML
    #[error("failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// A section holds a value outside its allowed range
    #[error("[{section}] has invalid {field}: {message}")]
    InvalidValue {
        /// Section name (e.g., "schema", "store")
        section: &'static str,
        /// Field name
        field: &'static str,
        /// Error message
        message: String,
    },

    /// Two schema settings cannot be combined
    #[error("[{section}] {first} conflicts with {second}")]
    Conflict {
        /// Section name
        section: &'static str,
        /// First offending field
        first: &'static str,
        /// Second offending field
        second: &'static str,
    },
}

impl ConfigError {
    /// Create an InvalidValue error
    pub fn invalid_value(
        section: &'static str,
        field: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            section,
            field,
            message: message.into(),
        }
    }

    /// Create a Conflict error
    pub fn conflict(section: &'static str, first: &'static str, second: &'static str) -> Self {
        Self::Conflict {
            section,
            first,
            second,
        }
    }
}
