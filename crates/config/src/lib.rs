//! Tabula Configuration
//!
//! TOML-based configuration loading with sensible defaults.
//! An empty file is a valid configuration: an in-memory store with the
//! default DDL templates.
//!
//! # Parsing
//!
//! ```
//! use tabula_config::Config;
//! use std::str::FromStr;
//!
//! let config = Config::from_str("[schema]\ntags_as_foreign_keys = true").unwrap();
//! assert!(config.schema.tags_as_foreign_keys);
//! ```
//!
//! # Example Config
//!
//! ```toml
//! [log]
//! level = "debug"
//!
//! [store]
//! path = "data/metrics.db"
//! statement_timeout = "5s"
//!
//! [schema]
//! tags_as_foreign_keys = true
//! uint64_type = "uint8"
//! add_column_templates = []   # never alter existing tables
//! ```

mod error;
mod logging;
mod schema;
mod store;
mod validation;

use std::fs;
use std::path::Path;
use std::str::FromStr;

pub use error::{ConfigError, Result};
pub use logging::{LogConfig, LogFormat, LogLevel};
pub use schema::{
    DEFAULT_ADD_COLUMN_TEMPLATE, DEFAULT_CREATE_TEMPLATE, DEFAULT_IDENTIFIER_MAX_BYTES,
    DEFAULT_TAG_TABLE_CREATE_TEMPLATE, SchemaConfig, TimestampColumnType, Uint64Type,
};
pub use store::StoreConfig;

use serde::Deserialize;

/// Main configuration structure
///
/// All sections are optional with sensible defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub log: LogConfig,

    /// Relational store connection settings
    pub store: StoreConfig,

    /// Table layout, type mapping and DDL templates
    pub schema: SchemaConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read, contains invalid TOML, or fails
    /// validation.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::from_str(&contents)
    }

    fn parse(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).map_err(ConfigError::ParseError)?;
        validation::validate_config(&config)?;
        Ok(config)
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
