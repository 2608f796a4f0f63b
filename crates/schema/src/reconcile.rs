//! Schema reconciliation
//!
//! Brings one table's structure up to what a source requires: read the
//! cached (or live) columns, create the table or add what is absent, record
//! the result, and report every column the store cannot hold.
//!
//! The cache is written only after the store confirmed a change. Everything
//! except transport trouble degrades to "missing columns" so one bad column
//! never fails a write.

use std::future::Future;

use tabula_store::{Store, StoreError, StoredColumn};
use tracing::{debug, error, info, warn};

use crate::cache::{TableDefinition, TableState};
use crate::column::{Column, ColumnRole};
use crate::error::{Result, SchemaError};
use crate::identifier::fits;
use crate::manager::{TableManager, column_names};
use crate::options::{FIELDS_JSON_COLUMN, TAGS_JSON_COLUMN};
use crate::template::{Template, TemplateContext};
use crate::types::SqlType;

/// Column comment marking a tag column
pub const TAG_COMMENT: &str = "tag";

impl TableManager {
    /// Ensure `table` can hold `required`, returning the columns it cannot.
    ///
    /// `metric_table` and `tag_table` name the pair of tables being matched,
    /// for templates that reference them.
    ///
    /// # Errors
    ///
    /// Temporary store errors, and [`SchemaError::TableNameTooLong`] when the
    /// table does not exist and its name cannot be created.
    #[allow(clippy::too_many_arguments)]
    pub async fn ensure_structure(
        &self,
        store: &dyn Store,
        table: &TableState,
        required: &[Column],
        create_templates: &[Template],
        add_column_templates: &[Template],
        metric_table: &str,
        tag_table: Option<&str>,
    ) -> Result<Vec<Column>> {
        let mut required = required.to_vec();
        Column::sort(&mut required);

        let mut definition = table.lock().await;

        if definition.is_known() {
            let (absent, mut missing) = diff(&definition, &required);
            let (addable, overflow) = self.split_overflow(table.name(), absent);
            missing.extend(overflow);

            // nothing the store could take: no need to ask it
            if addable.is_empty() || add_column_templates.is_empty() {
                missing.extend(addable);
                Column::sort(&mut missing);
                return Ok(missing);
            }
        }

        // Something is absent from what we know; the store may know better.
        self.refresh(store, table.name(), &mut definition).await?;

        let limit = self.options.identifier_max_bytes;

        if !definition.is_known() {
            if create_templates.is_empty() {
                warn!(table = %table.name(), "table does not exist and table creation is disabled");
                return Ok(required);
            }
            if !fits(table.name(), limit) {
                error!(table = %table.name(), bytes = table.name().len(), limit, "table name too long");
                return Err(SchemaError::table_name_too_long(table.name(), limit));
            }
        }

        let (absent, mut missing) = diff(&definition, &required);
        log_conflicts(table.name(), &missing);
        let (mut addable, overflow) = self.split_overflow(table.name(), absent);
        missing.extend(overflow);

        if addable.is_empty() {
            Column::sort(&mut missing);
            return Ok(missing);
        }

        let ctx = DdlContext {
            table: table.name(),
            metric_table,
            tag_table,
        };

        if !definition.is_known() {
            match self
                .create_table(store, &ctx, create_templates, &addable, &mut definition)
                .await
            {
                Ok(()) => {
                    Column::sort(&mut missing);
                    return Ok(missing);
                }
                Err(SchemaError::Store(e)) if e.is_duplicate_object() => {
                    // Either another writer created the table first, or our own
                    // statement is at fault. Only the store can tell.
                    self.refresh(store, table.name(), &mut definition).await?;
                    if !definition.is_known() {
                        error!(table = %table.name(), error = %e, "failed to create table");
                        return Ok(required);
                    }
                    debug!(table = %table.name(), "table created concurrently");

                    let (absent, conflicts) = diff(&definition, &addable);
                    log_conflicts(table.name(), &conflicts);
                    missing.extend(conflicts);
                    addable = absent;
                }
                Err(e) if e.is_temporary() => return Err(e),
                Err(e) => {
                    error!(table = %table.name(), error = %e, "failed to create table");
                    return Ok(required);
                }
            }
        }

        if addable.is_empty() {
            Column::sort(&mut missing);
            return Ok(missing);
        }

        if add_column_templates.is_empty() {
            warn!(
                table = %table.name(),
                columns = %column_names(&addable),
                "table is missing columns and alters are disabled"
            );
            missing.extend(addable);
        } else {
            let mut failed = false;
            for col in addable {
                match self
                    .add_column(store, &ctx, add_column_templates, &col, &mut definition)
                    .await
                {
                    Ok(()) => {}
                    Err(SchemaError::Store(e)) if e.is_duplicate_object() => {
                        self.refresh(store, table.name(), &mut definition).await?;
                        match definition.column(&col.name) {
                            Some(existing) if holds(existing, &col) => {
                                debug!(table = %table.name(), column = %col.name, "column added concurrently");
                            }
                            _ => {
                                error!(table = %table.name(), column = %col.name, error = %e, "failed to add column");
                                missing.push(col);
                                failed = true;
                            }
                        }
                    }
                    Err(e) if e.is_temporary() => return Err(e),
                    Err(e) => {
                        error!(table = %table.name(), column = %col.name, error = %e, "failed to add column");
                        missing.push(col);
                        failed = true;
                    }
                }
            }
            if failed {
                definition.reset();
            }
        }

        Column::sort(&mut missing);
        Ok(missing)
    }

    /// Split off columns whose names the store cannot hold
    fn split_overflow(&self, table: &str, columns: Vec<Column>) -> (Vec<Column>, Vec<Column>) {
        let limit = self.options.identifier_max_bytes;
        columns.into_iter().partition(|col| {
            let ok = fits(&col.name, limit);
            if !ok {
                error!(
                    table,
                    column = %col.name,
                    bytes = col.name.len(),
                    limit,
                    "column name too long"
                );
            }
            ok
        })
    }

    /// Replace the definition with the store's live structure
    async fn refresh(
        &self,
        store: &dyn Store,
        table: &str,
        definition: &mut TableDefinition,
    ) -> Result<()> {
        let stored = self
            .bounded(store.columns(&self.options.namespace, table))
            .await?;

        definition.reset();
        if let Some(stored) = stored {
            for col in &stored {
                definition.insert(self.column_from_stored(col));
            }
        }

        debug!(table, columns = definition.len(), store = store.name(), "read live structure");
        Ok(())
    }

    async fn create_table(
        &self,
        store: &dyn Store,
        ctx: &DdlContext<'_>,
        templates: &[Template],
        columns: &[Column],
        definition: &mut TableDefinition,
    ) -> Result<()> {
        let result: Result<()> = async {
            self.execute_templates(store, ctx, templates, columns, columns)
                .await?;
            for col in columns.iter().filter(|c| c.role == ColumnRole::Tag) {
                self.annotate_tag(store, ctx.table, col).await?;
            }
            Ok(())
        }
        .await;

        match result {
            Ok(()) => {
                for col in columns {
                    definition.insert(col.clone());
                }
                Ok(())
            }
            Err(e) => {
                definition.reset();
                Err(e)
            }
        }
    }

    async fn add_column(
        &self,
        store: &dyn Store,
        ctx: &DdlContext<'_>,
        templates: &[Template],
        column: &Column,
        definition: &mut TableDefinition,
    ) -> Result<()> {
        let mut all_columns = definition.columns();
        all_columns.push(column.clone());
        Column::sort(&mut all_columns);

        self.execute_templates(store, ctx, templates, std::slice::from_ref(column), &all_columns)
            .await?;
        if column.role == ColumnRole::Tag {
            self.annotate_tag(store, ctx.table, column).await?;
        }

        definition.insert(column.clone());
        Ok(())
    }

    /// Render and run templates in order; the first failure stops the rest
    async fn execute_templates(
        &self,
        store: &dyn Store,
        ctx: &DdlContext<'_>,
        templates: &[Template],
        columns: &[Column],
        all_columns: &[Column],
    ) -> Result<()> {
        let template_ctx = TemplateContext {
            namespace: &self.options.namespace,
            table: ctx.table,
            metric_table: ctx.metric_table,
            tag_table: ctx.tag_table,
            columns,
            all_columns,
        };

        for template in templates {
            let sql = template.render(&template_ctx)?;
            info!(table = %ctx.table, statement = %sql, "executing schema statement");
            self.bounded(store.execute(&sql)).await?;
        }

        Ok(())
    }

    async fn annotate_tag(&self, store: &dyn Store, table: &str, column: &Column) -> Result<()> {
        self.bounded(store.comment_column(&self.options.namespace, table, &column.name, TAG_COMMENT))
            .await
    }

    /// Run a store call under the statement timeout
    async fn bounded<T>(
        &self,
        call: impl Future<Output = tabula_store::Result<T>>,
    ) -> Result<T> {
        let timeout = self.options.statement_timeout;
        match tokio::time::timeout(timeout, call).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(StoreError::Timeout(timeout).into()),
        }
    }

    /// Recover a column's role from its name or comment
    fn column_from_stored(&self, stored: &StoredColumn) -> Column {
        let options = &self.options;
        let name = stored.name.as_str();

        let role = if name == options.time_column.name {
            ColumnRole::Time
        } else if name == options.tag_id_column.name {
            ColumnRole::TagId
        } else if options.tags_as_jsonb && name == TAGS_JSON_COLUMN {
            ColumnRole::Tag
        } else if options.fields_as_jsonb && name == FIELDS_JSON_COLUMN {
            ColumnRole::Field
        } else if stored
            .comment
            .as_deref()
            .and_then(|c| c.split_whitespace().next())
            == Some(TAG_COMMENT)
        {
            ColumnRole::Tag
        } else {
            ColumnRole::Field
        };

        Column::new(name, role, SqlType::parse(&stored.data_type))
    }
}

struct DdlContext<'a> {
    table: &'a str,
    metric_table: &'a str,
    tag_table: Option<&'a str>,
}

fn log_conflicts(table: &str, conflicts: &[Column]) {
    for col in conflicts {
        warn!(
            table,
            column = %col.name,
            role = %col.role,
            data_type = %col.data_type,
            "column conflicts with existing structure"
        );
    }
}

/// Whether an existing column can take the values of `wanted`
fn holds(existing: &Column, wanted: &Column) -> bool {
    existing.role == wanted.role && existing.data_type.can_contain(&wanted.data_type)
}

/// Split `required` into columns the definition lacks and columns it has
/// with an incompatible role or type
fn diff(definition: &TableDefinition, required: &[Column]) -> (Vec<Column>, Vec<Column>) {
    let mut absent = Vec::new();
    let mut conflicts = Vec::new();

    for col in required {
        match definition.column(&col.name) {
            None => absent.push(col.clone()),
            Some(existing) if !holds(existing, col) => conflicts.push(col.clone()),
            Some(_) => {}
        }
    }

    (absent, conflicts)
}
