//! In-process store
//!
//! Keeps table structures in memory and applies the two statement shapes the
//! schema manager emits: `CREATE TABLE` and `ALTER TABLE ... ADD COLUMN`.
//! Statements are parsed with the PostgreSQL dialect of `sqlparser`; text it
//! rejects fails with a syntax error, so a malformed template behaves as it
//! would against a live database.
//!
//! Besides structure, it records every statement it applied and can inject
//! failures and latency, so reconciliation paths are testable without a live
//! database.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use sqlparser::ast::{
    AlterTableOperation, ColumnDef, CreateTable, Ident, ObjectName, ObjectNamePart, Statement,
};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

use crate::error::{Result, StoreError, sqlstate};
use crate::{Store, StoredColumn};

type TableKey = (String, String);
type Tables = HashMap<TableKey, Vec<StoredColumn>>;

#[derive(Default)]
struct State {
    tables: Tables,
    executed: Vec<String>,
    structure_queries: usize,
    offline: bool,
    fail_next: VecDeque<StoreError>,
    fail_matching: Vec<(String, StoreError)>,
    concurrent: VecDeque<(TableKey, Vec<StoredColumn>)>,
}

/// In-memory store driver
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    latency: Duration,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `latency` before it touches the state
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Create a table directly, bypassing statement parsing.
    ///
    /// Simulates a table made by someone else.
    pub fn insert_table(&self, namespace: &str, table: &str, columns: &[(&str, &str)]) {
        let columns = columns
            .iter()
            .map(|(name, data_type)| StoredColumn::new(*name, *data_type))
            .collect();
        self.state
            .lock()
            .tables
            .insert((namespace.to_string(), table.to_string()), columns);
    }

    /// Remove a table directly
    pub fn drop_table(&self, namespace: &str, table: &str) {
        self.state
            .lock()
            .tables
            .remove(&(namespace.to_string(), table.to_string()));
    }

    /// Peek at a table's structure without counting a structure query
    pub fn table(&self, namespace: &str, table: &str) -> Option<Vec<StoredColumn>> {
        self.state
            .lock()
            .tables
            .get(&(namespace.to_string(), table.to_string()))
            .cloned()
    }

    /// Make every call fail with a connection error until switched back
    pub fn set_offline(&self, offline: bool) {
        self.state.lock().offline = offline;
    }

    /// Fail the next `execute` call with `err`
    pub fn fail_next(&self, err: StoreError) {
        self.state.lock().fail_next.push_back(err);
    }

    /// Fail every statement containing `pattern` with `err`
    pub fn fail_statements_containing(&self, pattern: impl Into<String>, err: StoreError) {
        self.state.lock().fail_matching.push((pattern.into(), err));
    }

    /// Set a table's structure just before the next `execute` runs, as a
    /// concurrent writer winning the race would
    pub fn concurrent_write(&self, namespace: &str, table: &str, columns: &[(&str, &str)]) {
        let columns = columns
            .iter()
            .map(|(name, data_type)| StoredColumn::new(*name, *data_type))
            .collect();
        self.state
            .lock()
            .concurrent
            .push_back(((namespace.to_string(), table.to_string()), columns));
    }

    /// Statements applied successfully, oldest first
    pub fn executed(&self) -> Vec<String> {
        self.state.lock().executed.clone()
    }

    /// Number of `columns` calls served
    pub fn structure_queries(&self) -> usize {
        self.state.lock().structure_queries
    }

    async fn delay(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn columns(&self, namespace: &str, table: &str) -> Result<Option<Vec<StoredColumn>>> {
        self.delay().await;

        let mut state = self.state.lock();
        if state.offline {
            return Err(StoreError::connection("memory store is offline"));
        }
        state.structure_queries += 1;

        Ok(state
            .tables
            .get(&(namespace.to_string(), table.to_string()))
            .cloned())
    }

    async fn execute(&self, sql: &str) -> Result<()> {
        self.delay().await;

        let mut state = self.state.lock();
        if state.offline {
            return Err(StoreError::connection("memory store is offline"));
        }
        if let Some((table, columns)) = state.concurrent.pop_front() {
            state.tables.insert(table, columns);
        }
        if let Some(err) = state.fail_next.pop_front() {
            return Err(err);
        }
        if let Some((_, err)) = state
            .fail_matching
            .iter()
            .find(|(pattern, _)| sql.contains(pattern.as_str()))
        {
            return Err(err.clone());
        }

        let statements = Parser::parse_sql(&PostgreSqlDialect {}, sql)
            .map_err(|e| StoreError::database(sqlstate::SYNTAX_ERROR, e.to_string()))?;

        // a failing statement leaves every table as it was
        let mut tables = state.tables.clone();
        for statement in statements {
            apply(&mut tables, statement)?;
        }
        state.tables = tables;
        state.executed.push(sql.to_string());
        Ok(())
    }

    async fn comment_column(
        &self,
        namespace: &str,
        table: &str,
        column: &str,
        comment: &str,
    ) -> Result<()> {
        self.delay().await;

        let mut state = self.state.lock();
        if state.offline {
            return Err(StoreError::connection("memory store is offline"));
        }

        let columns = state
            .tables
            .get_mut(&(namespace.to_string(), table.to_string()))
            .ok_or_else(|| {
                StoreError::database(
                    sqlstate::UNDEFINED_TABLE,
                    format!("relation \"{}\" does not exist", table),
                )
            })?;

        let col = columns.iter_mut().find(|c| c.name == column).ok_or_else(|| {
            StoreError::database(
                sqlstate::UNDEFINED_COLUMN,
                format!("column \"{}\" of relation \"{}\" does not exist", column, table),
            )
        })?;
        col.comment = Some(comment.to_string());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

fn apply(tables: &mut Tables, statement: Statement) -> Result<()> {
    match statement {
        Statement::CreateTable(CreateTable {
            name,
            columns,
            if_not_exists,
            ..
        }) => {
            let table = table_key(&name)?;
            if tables.contains_key(&table) {
                if if_not_exists {
                    return Ok(());
                }
                return Err(StoreError::database(
                    sqlstate::DUPLICATE_TABLE,
                    format!("relation \"{}\" already exists", table.1),
                ));
            }
            if columns.is_empty() {
                return Err(StoreError::database(
                    sqlstate::SYNTAX_ERROR,
                    format!("table \"{}\" has no columns", table.1),
                ));
            }

            let mut stored: Vec<StoredColumn> = Vec::with_capacity(columns.len());
            for def in &columns {
                let col = stored_column(def);
                if stored.iter().any(|c| c.name == col.name) {
                    return Err(StoreError::database(
                        sqlstate::DUPLICATE_COLUMN,
                        format!("column \"{}\" specified more than once", col.name),
                    ));
                }
                stored.push(col);
            }

            tables.insert(table, stored);
            Ok(())
        }
        Statement::AlterTable {
            name, operations, ..
        } => {
            let table = table_key(&name)?;
            let existing = tables.get_mut(&table).ok_or_else(|| {
                StoreError::database(
                    sqlstate::UNDEFINED_TABLE,
                    format!("relation \"{}\" does not exist", table.1),
                )
            })?;

            for operation in operations {
                let AlterTableOperation::AddColumn {
                    if_not_exists,
                    column_def,
                    ..
                } = &operation
                else {
                    return Err(unsupported(&operation.to_string()));
                };

                let col = stored_column(column_def);
                if existing.iter().any(|c| c.name == col.name) {
                    if *if_not_exists {
                        continue;
                    }
                    return Err(StoreError::database(
                        sqlstate::DUPLICATE_COLUMN,
                        format!(
                            "column \"{}\" of relation \"{}\" already exists",
                            col.name, table.1
                        ),
                    ));
                }
                existing.push(col);
            }
            Ok(())
        }
        other => Err(unsupported(&other.to_string())),
    }
}

fn unsupported(statement: &str) -> StoreError {
    StoreError::database(
        sqlstate::FEATURE_NOT_SUPPORTED,
        format!("memory store cannot apply: {}", statement),
    )
}

/// Unquoted identifiers fold to lower case
fn identifier(ident: &Ident) -> String {
    if ident.quote_style.is_some() {
        ident.value.clone()
    } else {
        ident.value.to_lowercase()
    }
}

fn table_key(name: &ObjectName) -> Result<TableKey> {
    let parts: Vec<String> = name
        .0
        .iter()
        .filter_map(|part| match part {
            ObjectNamePart::Identifier(ident) => Some(identifier(ident)),
            _ => None,
        })
        .collect();

    match parts.as_slice() {
        [table] => Ok((String::new(), table.clone())),
        [namespace, table] => Ok((namespace.clone(), table.clone())),
        _ => Err(StoreError::database(
            sqlstate::SYNTAX_ERROR,
            format!("improper qualified name: {}", name),
        )),
    }
}

fn stored_column(def: &ColumnDef) -> StoredColumn {
    StoredColumn::new(identifier(&def.name), def.data_type.to_string().to_lowercase())
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;
