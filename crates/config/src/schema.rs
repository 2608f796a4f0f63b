//! Schema manager configuration
//!
//! Table layout, type mapping and the DDL templates used to create and
//! widen tables. Template strings are kept verbatim here; the schema crate
//! parses them when it builds its options.

use serde::Deserialize;

/// Postgres truncates identifiers beyond 63 bytes (NAMEDATALEN - 1)
pub const DEFAULT_IDENTIFIER_MAX_BYTES: usize = 63;

/// Default statement creating a metric table
pub const DEFAULT_CREATE_TEMPLATE: &str = "CREATE TABLE {{ table }} ({{ columns }})";

/// Default statement adding one column to an existing table
pub const DEFAULT_ADD_COLUMN_TEMPLATE: &str = "ALTER TABLE {{ table }} ADD COLUMN {{ columns }}";

/// Default statement creating a tag table keyed by the tag id
pub const DEFAULT_TAG_TABLE_CREATE_TEMPLATE: &str =
    "CREATE TABLE {{ table }} ({{ columns }}, PRIMARY KEY ({{ columns.tag_id.names }}))";

/// Column type used for unsigned 64-bit integer fields
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Uint64Type {
    /// Arbitrary precision numeric; works on every store
    #[default]
    Numeric,
    /// Native unsigned 64-bit integer (pguint extension)
    Uint8,
}

/// Column type of the timestamp column
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
pub enum TimestampColumnType {
    #[default]
    #[serde(rename = "timestamp without time zone")]
    WithoutTimeZone,
    #[serde(rename = "timestamp with time zone")]
    WithTimeZone,
}

/// Schema configuration
///
/// # Example
///
/// ```toml
/// [schema]
/// tags_as_foreign_keys = true
/// tag_table_suffix = "_tag"
/// create_templates = ["CREATE TABLE {{ table }} ({{ columns }})"]
/// add_column_templates = []
/// ```
///
/// An empty `add_column_templates` list disables ALTER statements: columns
/// the table lacks are reported missing and dropped from the write.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    /// Namespace (schema) tables live in; empty means the store default
    /// Default: ""
    pub namespace: String,

    /// Store tags in a side table referenced by a surrogate key
    /// Default: false
    pub tags_as_foreign_keys: bool,

    /// Suffix appended to the metric table name to name its tag table
    /// Default: "_tag"
    pub tag_table_suffix: String,

    /// Fold all tags into one json column
    /// Default: false
    pub tags_as_jsonb: bool,

    /// Fold all fields into one json column
    /// Default: false
    pub fields_as_jsonb: bool,

    /// Default: "time"
    pub timestamp_column_name: String,

    /// Default: timestamp without time zone
    pub timestamp_column_type: TimestampColumnType,

    /// Surrogate key column linking metric rows to tag rows
    /// Default: "tag_id"
    pub tag_id_column_name: String,

    /// Default: numeric
    pub uint64_type: Uint64Type,

    /// Longest identifier the store accepts, in bytes
    /// Default: 63
    pub identifier_max_bytes: usize,

    /// Statements run, in order, to create a metric table
    pub create_templates: Vec<String>,

    /// Statements run, in order, to add a column to a metric table
    pub add_column_templates: Vec<String>,

    /// Statements run, in order, to create a tag table
    pub tag_table_create_templates: Vec<String>,

    /// Statements run, in order, to add a column to a tag table
    pub tag_table_add_column_templates: Vec<String>,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            namespace: String::new(),
            tags_as_foreign_keys: false,
            tag_table_suffix: "_tag".into(),
            tags_as_jsonb: false,
            fields_as_jsonb: false,
            timestamp_column_name: "time".into(),
            timestamp_column_type: TimestampColumnType::default(),
            tag_id_column_name: "tag_id".into(),
            uint64_type: Uint64Type::default(),
            identifier_max_bytes: DEFAULT_IDENTIFIER_MAX_BYTES,
            create_templates: vec![DEFAULT_CREATE_TEMPLATE.into()],
            add_column_templates: vec![DEFAULT_ADD_COLUMN_TEMPLATE.into()],
            tag_table_create_templates: vec![DEFAULT_TAG_TABLE_CREATE_TEMPLATE.into()],
            tag_table_add_column_templates: vec![DEFAULT_ADD_COLUMN_TEMPLATE.into()],
        }
    }
}

impl TimestampColumnType {
    /// SQL spelling of the type
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WithoutTimeZone => "timestamp without time zone",
            Self::WithTimeZone => "timestamp with time zone",
        }
    }
}
