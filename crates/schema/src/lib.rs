//! Tabula - Schema
//!
//! Keeps relational tables in step with the shape of incoming metric batches.
//!
//! # Flow
//!
//! ```text
//! Vec<Metric> ──derive_table_sources──▶ TableSource (per table)
//!                                            │
//!                                 TableManager::match_source
//!                                            │
//!              ┌─────────────────────────────┴──────────────────────┐
//!              ▼                                                    ▼
//!     ensure_structure(tag table)                     ensure_structure(metric table)
//!       cache ─▶ live query ─▶ CREATE / ALTER ─▶ cache update
//!              │                                                    │
//!              └──────────── missing columns pruned from source ────┘
//! ```
//!
//! Columns that cannot be persisted (name too long, type conflict, alters
//! disabled, permanent DDL failure) are dropped from the source and reported
//! in the [`MatchOutcome`]; only transport failures and tables that cannot
//! exist at all surface as errors.

mod cache;
mod column;
mod error;
mod identifier;
mod manager;
mod metric;
mod options;
mod reconcile;
mod source;
mod template;
mod types;

pub use cache::{TableCache, TableDefinition, TableState};
pub use column::{Column, ColumnList, ColumnRole};
pub use error::{Result, SchemaError};
pub use identifier::{fits, qualified, quote_identifier};
pub use manager::{MatchOutcome, TableManager};
pub use metric::{FieldValue, Metric};
pub use options::{DEFAULT_STATEMENT_TIMEOUT, FIELDS_JSON_COLUMN, SchemaOptions, TAGS_JSON_COLUMN};
pub use reconcile::TAG_COMMENT;
pub use source::{TableSource, TagTableSource, Value, derive_table_sources, tag_id};
pub use template::{Template, TemplateContext};
pub use types::{SqlType, resolve};
