//! Tabula - Store
//!
//! The seam between the schema manager and the relational store it manages.
//!
//! # Drivers
//!
//! | Driver | Backing | Use |
//! |--------|---------|-----|
//! | [`TursoStore`] | turso (SQLite-compatible, async) | production, file or `:memory:` |
//! | [`MemoryStore`] | process memory | tests, dry runs, failure injection |
//!
//! # Errors
//!
//! Every driver reports failures as [`StoreError`]. [`classify`] maps an error
//! to the closed [`ErrorClass`] enumeration, which alone decides whether a
//! failure may be retried.

mod classify;
mod error;
pub mod memory;
mod turso_store;

use async_trait::async_trait;

pub use classify::{ErrorClass, classify, is_temporary};
pub use error::{Result, StoreError, sqlstate};
pub use memory::MemoryStore;
pub use turso_store::TursoStore;

/// A column as reported by the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredColumn {
    /// Column name
    pub name: String,
    /// Declared type, spelled however the store reports it
    pub data_type: String,
    /// Column comment, if the store kept one
    pub comment: Option<String>,
}

impl StoredColumn {
    /// Create a column without a comment
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            comment: None,
        }
    }

    /// Attach a comment
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

/// Store driver
///
/// Calls may block on the network; callers bound each one with a timeout.
#[async_trait]
pub trait Store: Send + Sync {
    /// Live structure of `table` in `namespace` (empty namespace = store default).
    ///
    /// Returns `None` when the table does not exist.
    async fn columns(&self, namespace: &str, table: &str) -> Result<Option<Vec<StoredColumn>>>;

    /// Execute one DDL/DML statement
    async fn execute(&self, sql: &str) -> Result<()>;

    /// Attach a comment to a column. Comments carry the column role
    /// (`tag`) across restarts.
    async fn comment_column(
        &self,
        namespace: &str,
        table: &str,
        column: &str,
        comment: &str,
    ) -> Result<()>;

    /// Driver name for logging
    fn name(&self) -> &'static str;
}
