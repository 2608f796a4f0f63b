//! Turso-backed store
//!
//! Uses Turso (async SQLite-compatible) as the relational store.
//!
//! SQLite has no column comments, so comments live in a small catalog table
//! created next to the metric tables. Namespaces map to attached databases;
//! the empty namespace is the main database.

use async_trait::async_trait;
use tracing::{debug, info};
use turso::{Builder, Database};

use crate::error::Result;
use crate::{Store, StoredColumn};

/// Catalog table holding column comments
pub const COMMENT_CATALOG_TABLE: &str = "_tabula_column_comments";

const SCHEMA_COMMENT_CATALOG: &str = r#"
CREATE TABLE IF NOT EXISTS _tabula_column_comments (
    namespace TEXT NOT NULL,
    table_name TEXT NOT NULL,
    column_name TEXT NOT NULL,
    comment TEXT NOT NULL
)
"#;

/// Turso store driver
pub struct TursoStore {
    db: Database,
}

impl TursoStore {
    /// Open (or create) a file-backed store
    ///
    /// `":memory:"` opens an in-memory database.
    pub async fn open(path: &str) -> Result<Self> {
        info!(path, "Opening turso store");
        let db = Builder::new_local(path).build().await?;

        let store = Self { db };
        store.init_catalog().await?;
        Ok(store)
    }

    /// Create a store with in-memory storage (for testing)
    pub async fn new_memory() -> Result<Self> {
        Self::open(":memory:").await
    }

    /// Underlying database handle
    pub fn database(&self) -> &Database {
        &self.db
    }

    async fn init_catalog(&self) -> Result<()> {
        let conn = self.db.connect()?;
        conn.execute(SCHEMA_COMMENT_CATALOG, ()).await?;
        debug!("Column comment catalog initialized");
        Ok(())
    }

    async fn comments(&self, namespace: &str, table: &str) -> Result<Vec<(String, String)>> {
        let conn = self.db.connect()?;

        let mut rows = conn
            .query(
                "SELECT column_name, comment FROM _tabula_column_comments WHERE namespace = ?1 AND table_name = ?2",
                [namespace, table],
            )
            .await?;

        let mut comments = Vec::new();
        while let Some(row) = rows.next().await? {
            let column = row.get_value(0)?.as_text().cloned().unwrap_or_default();
            let comment = row.get_value(1)?.as_text().cloned().unwrap_or_default();
            comments.push((column, comment));
        }

        Ok(comments)
    }
}

#[async_trait]
impl Store for TursoStore {
    async fn columns(&self, namespace: &str, table: &str) -> Result<Option<Vec<StoredColumn>>> {
        let conn = self.db.connect()?;

        let pragma = if namespace.is_empty() {
            format!("PRAGMA table_info({})", quote(table))
        } else {
            format!("PRAGMA {}.table_info({})", quote(namespace), quote(table))
        };

        let mut rows = conn.query(&pragma, ()).await?;

        let mut columns = Vec::new();
        while let Some(row) = rows.next().await? {
            // cid, name, type, notnull, dflt_value, pk
            let name = row.get_value(1)?.as_text().cloned().unwrap_or_default();
            let data_type = row.get_value(2)?.as_text().cloned().unwrap_or_default();
            columns.push(StoredColumn::new(name, data_type));
        }

        // a SQLite table always has at least one column
        if columns.is_empty() {
            return Ok(None);
        }

        for (column, comment) in self.comments(namespace, table).await? {
            if let Some(col) = columns.iter_mut().find(|c| c.name == column) {
                col.comment = Some(comment);
            }
        }

        Ok(Some(columns))
    }

    async fn execute(&self, sql: &str) -> Result<()> {
        let conn = self.db.connect()?;
        conn.execute(sql, ()).await?;
        Ok(())
    }

    async fn comment_column(
        &self,
        namespace: &str,
        table: &str,
        column: &str,
        comment: &str,
    ) -> Result<()> {
        let conn = self.db.connect()?;

        conn.execute(
            "DELETE FROM _tabula_column_comments WHERE namespace = ?1 AND table_name = ?2 AND column_name = ?3",
            [namespace, table, column],
        )
        .await?;

        conn.execute(
            r#"
            INSERT INTO _tabula_column_comments (namespace, table_name, column_name, comment)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            [namespace, table, column, comment],
        )
        .await?;

        Ok(())
    }

    fn name(&self) -> &'static str {
        "turso"
    }
}

fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

#[cfg(test)]
#[path = "turso_store_test.rs"]
mod tests;
