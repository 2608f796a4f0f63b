//! Table cache
//!
//! Maps table names to the columns known to exist in the store. Entries are
//! created on first reference and never removed; clearing a table resets its
//! definition so the next reconciliation re-reads the store, while keeping the
//! entry (and its lock) so concurrent reconciliations of the same table stay
//! serialized.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard, RwLock};

use crate::column::Column;

/// Known columns of one table
///
/// An empty definition means the structure is unknown and must be read from
/// the store; a table that exists always has at least one column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableDefinition {
    columns: HashMap<String, Column>,
}

impl TableDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the store has been read (or written) since the last reset
    pub fn is_known(&self) -> bool {
        !self.columns.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    /// Columns in table order
    pub fn columns(&self) -> Vec<Column> {
        let mut columns: Vec<Column> = self.columns.values().cloned().collect();
        Column::sort(&mut columns);
        columns
    }

    pub fn insert(&mut self, column: Column) {
        self.columns.insert(column.name.clone(), column);
    }

    /// Forget everything; the next reconciliation re-reads the store
    pub fn reset(&mut self) {
        self.columns.clear();
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Cache entry for one table
///
/// The definition lock is held across read, decide, DDL and cache write.
#[derive(Debug)]
pub struct TableState {
    name: String,
    definition: Mutex<TableDefinition>,
}

impl TableState {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            definition: Mutex::new(TableDefinition::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lock the definition
    pub async fn lock(&self) -> MutexGuard<'_, TableDefinition> {
        self.definition.lock().await
    }

    /// Copy of the current definition
    pub async fn snapshot(&self) -> TableDefinition {
        self.definition.lock().await.clone()
    }
}

/// Table name to [`TableState`]
#[derive(Debug, Default)]
pub struct TableCache {
    tables: RwLock<HashMap<String, Arc<TableState>>>,
}

impl TableCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry for `name`, created empty if absent
    pub async fn table(&self, name: &str) -> Arc<TableState> {
        // Fast path: read lock
        {
            let tables = self.tables.read().await;
            if let Some(state) = tables.get(name) {
                return Arc::clone(state);
            }
        }

        // Slow path: write lock
        let mut tables = self.tables.write().await;

        // Double-check after acquiring write lock
        if let Some(state) = tables.get(name) {
            return Arc::clone(state);
        }

        let state = Arc::new(TableState::new(name));
        tables.insert(name.to_string(), Arc::clone(&state));
        state
    }

    /// Reset every definition
    ///
    /// Waits for in-flight reconciliations of each table to finish.
    pub async fn clear(&self) {
        let states: Vec<Arc<TableState>> = self.tables.read().await.values().cloned().collect();
        for state in states {
            state.lock().await.reset();
        }
    }

    /// Reset one definition
    pub async fn invalidate(&self, name: &str) {
        let state = self.tables.read().await.get(name).cloned();
        if let Some(state) = state {
            state.lock().await.reset();
        }
    }

    /// Copy of a table's definition, if the table was ever referenced
    pub async fn snapshot(&self, name: &str) -> Option<TableDefinition> {
        let state = self.tables.read().await.get(name).cloned()?;
        Some(state.snapshot().await)
    }

    /// Number of tables referenced so far
    pub async fn len(&self) -> usize {
        self.tables.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tables.read().await.is_empty()
    }
}

#[cfg(test)]
#[path = "cache_test.rs"]
mod tests;
