//! Table sources
//!
//! A [`TableSource`] is one batch's worth of records for one table, with the
//! union of their columns. Matching it against the store may drop columns;
//! the source then yields rows without them, or without the records that
//! carried a dropped tag.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;
use xxhash_rust::xxh3::xxh3_64;

use crate::column::{Column, ColumnList, ColumnRole};
use crate::error::{Result, SchemaError};
use crate::metric::{FieldValue, Metric};
use crate::options::SchemaOptions;
use crate::types::resolve;

/// A cell value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Timestamp(DateTime<Utc>),
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
    Text(String),
    Json(serde_json::Value),
}

impl From<&FieldValue> for Value {
    fn from(v: &FieldValue) -> Self {
        match v {
            FieldValue::Int(v) => Self::Int(*v),
            FieldValue::UInt(v) => Self::UInt(*v),
            FieldValue::Float(v) => Self::Float(*v),
            FieldValue::Bool(v) => Self::Bool(*v),
            FieldValue::String(v) => Self::Text(v.clone()),
        }
    }
}

/// Surrogate key of a tag set
///
/// Hash of `key\0value\0` pairs in key order, so the same tags always map to
/// the same key.
pub fn tag_id(tags: &BTreeMap<String, String>) -> i64 {
    let mut buf = Vec::with_capacity(tags.iter().map(|(k, v)| k.len() + v.len() + 2).sum());
    for (key, value) in tags {
        buf.extend_from_slice(key.as_bytes());
        buf.push(0);
        buf.extend_from_slice(value.as_bytes());
        buf.push(0);
    }
    xxh3_64(&buf) as i64
}

/// Group metrics into one source per table
pub fn derive_table_sources(
    options: &Arc<SchemaOptions>,
    metrics: impl IntoIterator<Item = Metric>,
) -> BTreeMap<String, TableSource> {
    let mut sources: BTreeMap<String, TableSource> = BTreeMap::new();

    for metric in metrics {
        sources
            .entry(metric.name.clone())
            .or_insert_with(|| TableSource::new(metric.name.clone(), Arc::clone(options)))
            .push(metric);
    }

    sources
}

/// Records destined for one table
#[derive(Debug, Clone)]
pub struct TableSource {
    name: String,
    options: Arc<SchemaOptions>,
    tag_columns: ColumnList,
    field_columns: ColumnList,
    records: Vec<(i64, Metric)>,
    tag_sets: BTreeMap<i64, BTreeMap<String, String>>,
    dropped_tag_sets: BTreeSet<i64>,
    dropped_columns: Vec<Column>,
}

impl TableSource {
    pub fn new(name: impl Into<String>, options: Arc<SchemaOptions>) -> Self {
        Self {
            name: name.into(),
            options,
            tag_columns: ColumnList::new(),
            field_columns: ColumnList::new(),
            records: Vec::new(),
            tag_sets: BTreeMap::new(),
            dropped_tag_sets: BTreeSet::new(),
            dropped_columns: Vec::new(),
        }
    }

    /// Add a record, widening the column set
    pub fn push(&mut self, mut metric: Metric) {
        let options = &self.options;

        metric.tags.retain(|key, _| {
            let reserved = options.is_reserved(key);
            if reserved {
                warn!(table = %self.name, tag = %key, "tag name collides with a reserved column, skipping");
            }
            !reserved
        });

        // tags and fields share one namespace unless either is folded into json
        let shared = !options.tags_as_jsonb && !options.fields_as_jsonb;

        let tags = &metric.tags;
        let tag_columns = &self.tag_columns;
        metric.fields.retain(|key, _| {
            let collides = options.is_reserved(key)
                || tags.contains_key(key)
                || (shared && tag_columns.contains(key));
            if collides {
                warn!(table = %self.name, field = %key, "field name collides with a tag or reserved column, skipping");
            }
            !collides
        });

        if !options.tags_as_jsonb {
            for key in metric.tags.keys() {
                // the tag wins, whichever arrived first
                if shared && self.field_columns.remove(key).is_some() {
                    warn!(table = %self.name, tag = %key, "tag shares its name with a field, dropping the field");
                    for (_, record) in &mut self.records {
                        record.fields.remove(key);
                    }
                }
                self.tag_columns.push(Column::tag(key));
            }
        }
        if !options.fields_as_jsonb {
            for (key, value) in &metric.fields {
                self.field_columns
                    .push(Column::field(key, resolve(value, options.uint64_type)));
            }
        }

        let id = tag_id(&metric.tags);
        self.tag_sets
            .entry(id)
            .or_insert_with(|| metric.tags.clone());
        self.records.push((id, metric));
    }

    /// Table name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &Arc<SchemaOptions> {
        &self.options
    }

    /// Tag columns in first-seen order (the json column when folded)
    pub fn tag_columns(&self) -> Vec<Column> {
        if self.options.tags_as_jsonb {
            vec![self.options.tags_json_column.clone()]
        } else {
            self.tag_columns.as_slice().to_vec()
        }
    }

    /// Field columns in first-seen order (the json column when folded)
    pub fn field_columns(&self) -> Vec<Column> {
        if self.options.fields_as_jsonb {
            vec![self.options.fields_json_column.clone()]
        } else {
            self.field_columns.as_slice().to_vec()
        }
    }

    /// Columns of the metric table: time, then tag key or tags, then fields
    pub fn metric_table_columns(&self) -> Vec<Column> {
        let mut columns = vec![self.options.time_column.clone()];
        if self.options.tags_as_foreign_keys {
            columns.push(self.options.tag_id_column.clone());
        } else {
            columns.extend(self.tag_columns());
        }
        columns.extend(self.field_columns());
        columns
    }

    /// Columns of the tag table: tag key, then tags
    pub fn tag_table_columns(&self) -> Vec<Column> {
        let mut columns = vec![self.options.tag_id_column.clone()];
        columns.extend(self.tag_columns());
        columns
    }

    /// Names of [`TableSource::metric_table_columns`]
    pub fn column_names(&self) -> Vec<String> {
        self.metric_table_columns()
            .into_iter()
            .map(|c| c.name)
            .collect()
    }

    /// Columns removed by [`TableSource::drop_column`]
    pub fn dropped_columns(&self) -> &[Column] {
        &self.dropped_columns
    }

    /// Records that will still be written
    pub fn record_count(&self) -> usize {
        self.records
            .iter()
            .filter(|(id, _)| !self.dropped_tag_sets.contains(id))
            .count()
    }

    /// Remove a column the store cannot hold
    ///
    /// A field column is dropped from every row. A tag column takes every
    /// record carrying that tag with it, since those records would otherwise
    /// collapse into another series. The time and tag key columns, and the
    /// json columns, cannot be dropped.
    pub fn drop_column(&mut self, column: &Column) -> Result<()> {
        match column.role {
            ColumnRole::Time | ColumnRole::TagId => {
                Err(SchemaError::critical_column(&column.name))
            }
            ColumnRole::Tag if self.options.tags_as_jsonb => {
                Err(SchemaError::critical_column(&column.name))
            }
            ColumnRole::Field if self.options.fields_as_jsonb => {
                Err(SchemaError::critical_column(&column.name))
            }
            ColumnRole::Tag => {
                if let Some(col) = self.tag_columns.remove(&column.name) {
                    for (id, tags) in &self.tag_sets {
                        if tags.contains_key(&column.name) {
                            self.dropped_tag_sets.insert(*id);
                        }
                    }
                    self.dropped_columns.push(col);
                }
                Ok(())
            }
            ColumnRole::Field => {
                if let Some(col) = self.field_columns.remove(&column.name) {
                    self.dropped_columns.push(col);
                }
                Ok(())
            }
        }
    }

    /// Surviving records as rows ordered like
    /// [`TableSource::metric_table_columns`]
    pub fn rows(&self) -> Vec<Vec<Value>> {
        let columns = self.metric_table_columns();

        self.records
            .iter()
            .filter(|(id, _)| !self.dropped_tag_sets.contains(id))
            .map(|(id, metric)| {
                columns
                    .iter()
                    .map(|col| self.cell(col, *id, metric))
                    .collect()
            })
            .collect()
    }

    fn cell(&self, column: &Column, id: i64, metric: &Metric) -> Value {
        match column.role {
            ColumnRole::Time => Value::Timestamp(metric.timestamp),
            ColumnRole::TagId => Value::Int(id),
            ColumnRole::Tag if self.options.tags_as_jsonb => Value::Json(tags_json(&metric.tags)),
            ColumnRole::Tag => metric
                .tags
                .get(&column.name)
                .map(|v| Value::Text(v.clone()))
                .unwrap_or(Value::Null),
            ColumnRole::Field if self.options.fields_as_jsonb => {
                Value::Json(serde_json::Value::Object(
                    metric
                        .fields
                        .iter()
                        .map(|(k, v)| (k.clone(), v.to_json()))
                        .collect(),
                ))
            }
            ColumnRole::Field => metric
                .fields
                .get(&column.name)
                .map(Value::from)
                .unwrap_or(Value::Null),
        }
    }

    /// View for the companion tag table
    pub fn tag_table(&self) -> TagTableSource<'_> {
        TagTableSource { source: self }
    }
}

fn tags_json(tags: &BTreeMap<String, String>) -> serde_json::Value {
    serde_json::Value::Object(
        tags.iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect(),
    )
}

/// Tag table side of a [`TableSource`]: one row per surviving tag set
#[derive(Debug, Clone, Copy)]
pub struct TagTableSource<'a> {
    source: &'a TableSource,
}

impl TagTableSource<'_> {
    pub fn name(&self) -> String {
        self.source.options.tag_table_name(&self.source.name)
    }

    pub fn columns(&self) -> Vec<Column> {
        self.source.tag_table_columns()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns().into_iter().map(|c| c.name).collect()
    }

    /// `[tag_id, tag values...]` per distinct tag set
    pub fn rows(&self) -> Vec<Vec<Value>> {
        let source = self.source;
        let tag_columns = source.tag_columns();

        source
            .tag_sets
            .iter()
            .filter(|(id, _)| !source.dropped_tag_sets.contains(*id))
            .map(|(id, tags)| {
                let mut row = Vec::with_capacity(tag_columns.len() + 1);
                row.push(Value::Int(*id));
                for col in &tag_columns {
                    row.push(if source.options.tags_as_jsonb {
                        Value::Json(tags_json(tags))
                    } else {
                        tags.get(&col.name)
                            .map(|v| Value::Text(v.clone()))
                            .unwrap_or(Value::Null)
                    });
                }
                row
            })
            .collect()
    }
}

#[cfg(test)]
#[path = "source_test.rs"]
mod tests;
