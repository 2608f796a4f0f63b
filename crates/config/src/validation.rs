//! Configuration validation
//!
//! Validates config consistency:
//! - Identifier limit is usable
//! - Special column names are non-empty and distinct
//! - Tag table settings are coherent when tags are normalized

use crate::Config;
use crate::error::{ConfigError, Result};

/// Validate the entire configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_store(config)?;
    validate_schema(config)?;
    Ok(())
}

fn validate_store(config: &Config) -> Result<()> {
    if config.store.path.trim().is_empty() {
        return Err(ConfigError::invalid_value("store", "path", "must not be empty"));
    }
    if config.store.statement_timeout.is_zero() {
        return Err(ConfigError::invalid_value(
            "store",
            "statement_timeout",
            "must be greater than 0",
        ));
    }
    Ok(())
}

fn validate_schema(config: &Config) -> Result<()> {
    let schema = &config.schema;

    if schema.identifier_max_bytes == 0 {
        return Err(ConfigError::invalid_value(
            "schema",
            "identifier_max_bytes",
            "must be greater than 0",
        ));
    }

    for (field, value) in [
        ("timestamp_column_name", &schema.timestamp_column_name),
        ("tag_id_column_name", &schema.tag_id_column_name),
    ] {
        if value.is_empty() {
            return Err(ConfigError::invalid_value("schema", field, "must not be empty"));
        }
        if value.len() > schema.identifier_max_bytes {
            return Err(ConfigError::invalid_value(
                "schema",
                field,
                format!(
                    "{} bytes exceeds identifier_max_bytes ({})",
                    value.len(),
                    schema.identifier_max_bytes
                ),
            ));
        }
    }

    if schema.timestamp_column_name == schema.tag_id_column_name {
        return Err(ConfigError::conflict(
            "schema",
            "timestamp_column_name",
            "tag_id_column_name",
        ));
    }

    if schema.tag_table_suffix.is_empty() {
        return Err(ConfigError::invalid_value(
            "schema",
            "tag_table_suffix",
            "must not be empty",
        ));
    }

    Ok(())
}
