//! Table manager
//!
//! Owns the [`TableCache`] and matches table sources against the store.

use std::sync::Arc;

use tabula_store::Store;
use tracing::error;

use crate::cache::{TableCache, TableState};
use crate::column::Column;
use crate::error::Result;
use crate::options::SchemaOptions;
use crate::source::TableSource;

/// Columns a source lost while being matched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchOutcome {
    /// Tag table columns the store cannot hold
    pub tag_table_missing: Vec<Column>,
    /// Metric table columns the store cannot hold
    pub metric_table_missing: Vec<Column>,
}

impl MatchOutcome {
    /// Whether every column of the source survived
    pub fn is_complete(&self) -> bool {
        self.tag_table_missing.is_empty() && self.metric_table_missing.is_empty()
    }
}

/// Schema manager for one store
pub struct TableManager {
    pub(crate) options: Arc<SchemaOptions>,
    pub(crate) cache: TableCache,
}

impl TableManager {
    pub fn new(options: SchemaOptions) -> Self {
        Self {
            options: Arc::new(options),
            cache: TableCache::new(),
        }
    }

    /// Options shared with table sources
    pub fn options(&self) -> &Arc<SchemaOptions> {
        &self.options
    }

    pub fn cache(&self) -> &TableCache {
        &self.cache
    }

    /// Cache entry for `name`
    pub async fn table(&self, name: &str) -> Arc<TableState> {
        self.cache.table(name).await
    }

    /// Forget every cached structure.
    ///
    /// Call when the store reports an undefined table or column: someone
    /// changed the schema behind our back.
    pub async fn clear_table_cache(&self) {
        self.cache.clear().await;
    }

    /// Make the store able to hold `source`, dropping what it cannot hold.
    ///
    /// With tags as foreign keys the tag table is matched first, so records
    /// whose tags cannot be stored are gone before the metric table is.
    ///
    /// # Errors
    ///
    /// Temporary store errors, a table name over the identifier limit, and a
    /// missing time or tag key column (e.g. table creation disabled).
    pub async fn match_source(
        &self,
        store: &dyn Store,
        source: &mut TableSource,
    ) -> Result<MatchOutcome> {
        let mut outcome = MatchOutcome::default();

        let tag_table_name = self
            .options
            .tags_as_foreign_keys
            .then(|| self.options.tag_table_name(source.name()));

        if let Some(tag_table_name) = &tag_table_name {
            let tag_table = self.table(tag_table_name).await;
            let missing = self
                .ensure_structure(
                    store,
                    &tag_table,
                    &source.tag_table_columns(),
                    &self.options.tag_table_create_templates,
                    &self.options.tag_table_add_column_templates,
                    source.name(),
                    Some(tag_table_name),
                )
                .await?;

            if !missing.is_empty() {
                for col in &missing {
                    source.drop_column(col)?;
                }
                error!(
                    table = %tag_table_name,
                    columns = %column_names(&missing),
                    "missing tag columns (dropping records)"
                );
            }
            outcome.tag_table_missing = missing;
        }

        let metric_table = self.table(source.name()).await;
        let missing = self
            .ensure_structure(
                store,
                &metric_table,
                &source.metric_table_columns(),
                &self.options.create_templates,
                &self.options.add_column_templates,
                source.name(),
                tag_table_name.as_deref(),
            )
            .await?;

        if !missing.is_empty() {
            for col in &missing {
                source.drop_column(col)?;
            }
            error!(
                table = %source.name(),
                columns = %column_names(&missing),
                "missing columns (omitting fields)"
            );
        }
        outcome.metric_table_missing = missing;

        Ok(outcome)
    }
}

pub(crate) fn column_names(columns: &[Column]) -> String {
    columns
        .iter()
        .map(|c| c.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
#[path = "manager_test.rs"]
mod tests;
