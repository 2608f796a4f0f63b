//! Resolved schema options
//!
//! [`SchemaOptions`] is the schema crate's view of `[schema]`: templates are
//! parsed and the fixed columns are built once, then shared through an `Arc`
//! by the manager and every table source.

use std::time::Duration;

use tabula_config::{SchemaConfig, Uint64Type};

use crate::column::{Column, ColumnRole};
use crate::error::{Result, SchemaError};
use crate::identifier::qualified;
use crate::template::Template;
use crate::types::SqlType;

/// Bound on each store call when none is configured
pub const DEFAULT_STATEMENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Column holding all tags when tags are folded into json
pub const TAGS_JSON_COLUMN: &str = "tags";

/// Column holding all fields when fields are folded into json
pub const FIELDS_JSON_COLUMN: &str = "fields";

/// Schema options
#[derive(Debug, Clone)]
pub struct SchemaOptions {
    pub namespace: String,
    pub tags_as_foreign_keys: bool,
    pub tag_table_suffix: String,
    pub tags_as_jsonb: bool,
    pub fields_as_jsonb: bool,
    pub uint64_type: Uint64Type,
    pub identifier_max_bytes: usize,
    pub statement_timeout: Duration,

    pub time_column: Column,
    pub tag_id_column: Column,
    pub tags_json_column: Column,
    pub fields_json_column: Column,

    pub create_templates: Vec<Template>,
    pub add_column_templates: Vec<Template>,
    pub tag_table_create_templates: Vec<Template>,
    pub tag_table_add_column_templates: Vec<Template>,
}

impl SchemaOptions {
    /// Build options from configuration, parsing every template
    pub fn from_config(config: &SchemaConfig) -> Result<Self> {
        if config.timestamp_column_name == config.tag_id_column_name {
            return Err(SchemaError::Config(format!(
                "timestamp and tag id columns are both named \"{}\"",
                config.timestamp_column_name
            )));
        }

        let time_type = match config.timestamp_column_type {
            tabula_config::TimestampColumnType::WithoutTimeZone => SqlType::Timestamp,
            tabula_config::TimestampColumnType::WithTimeZone => SqlType::TimestampTz,
        };

        Ok(Self {
            namespace: config.namespace.clone(),
            tags_as_foreign_keys: config.tags_as_foreign_keys,
            tag_table_suffix: config.tag_table_suffix.clone(),
            tags_as_jsonb: config.tags_as_jsonb,
            fields_as_jsonb: config.fields_as_jsonb,
            uint64_type: config.uint64_type,
            identifier_max_bytes: config.identifier_max_bytes,
            statement_timeout: DEFAULT_STATEMENT_TIMEOUT,

            time_column: Column::new(&config.timestamp_column_name, ColumnRole::Time, time_type),
            tag_id_column: Column::new(&config.tag_id_column_name, ColumnRole::TagId, SqlType::BigInt),
            tags_json_column: Column::new(TAGS_JSON_COLUMN, ColumnRole::Tag, SqlType::Jsonb),
            fields_json_column: Column::new(FIELDS_JSON_COLUMN, ColumnRole::Field, SqlType::Jsonb),

            create_templates: parse_all(&config.create_templates)?,
            add_column_templates: parse_all(&config.add_column_templates)?,
            tag_table_create_templates: parse_all(&config.tag_table_create_templates)?,
            tag_table_add_column_templates: parse_all(&config.tag_table_add_column_templates)?,
        })
    }

    /// Bound each store call by `timeout`
    pub fn with_statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout = timeout;
        self
    }

    /// Name of the tag table paired with `metric_table`
    pub fn tag_table_name(&self, metric_table: &str) -> String {
        format!("{}{}", metric_table, self.tag_table_suffix)
    }

    /// Quoted, namespace-qualified table name
    pub fn qualified(&self, table: &str) -> String {
        qualified(&self.namespace, table)
    }

    /// Names a tag or field must not take because a fixed column uses them
    pub fn is_reserved(&self, name: &str) -> bool {
        name == self.time_column.name
            || name == self.tag_id_column.name
            || (self.tags_as_jsonb && name == TAGS_JSON_COLUMN)
            || (self.fields_as_jsonb && name == FIELDS_JSON_COLUMN)
    }
}

fn parse_all(sources: &[String]) -> Result<Vec<Template>> {
    sources.iter().map(|s| Template::parse(s)).collect()
}
