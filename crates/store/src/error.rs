//! Store error types
//!
//! Database failures carry a five-character SQLSTATE code so that one
//! classifier serves every driver. Drivers that do not speak SQLSTATE natively
//! (turso) translate their messages into the nearest code.

use std::time::Duration;
use thiserror::Error;

/// SQLSTATE codes the drivers emit or the classifier inspects
pub mod sqlstate {
    /// feature_not_supported
    pub const FEATURE_NOT_SUPPORTED: &str = "0A000";
    /// unique_violation
    pub const UNIQUE_VIOLATION: &str = "23505";
    /// syntax_error
    pub const SYNTAX_ERROR: &str = "42601";
    /// undefined_column
    pub const UNDEFINED_COLUMN: &str = "42703";
    /// undefined_table
    pub const UNDEFINED_TABLE: &str = "42P01";
    /// duplicate_column
    pub const DUPLICATE_COLUMN: &str = "42701";
    /// duplicate_table
    pub const DUPLICATE_TABLE: &str = "42P07";
    /// name_too_long
    pub const NAME_TOO_LONG: &str = "42622";
    /// serialization_failure
    pub const SERIALIZATION_FAILURE: &str = "40001";
    /// deadlock_detected
    pub const DEADLOCK_DETECTED: &str = "40P01";
    /// query_canceled
    pub const QUERY_CANCELED: &str = "57014";
    /// database_dropped
    pub const DATABASE_DROPPED: &str = "57P04";
    /// admin_shutdown
    pub const ADMIN_SHUTDOWN: &str = "57P01";
}

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors reported by store drivers
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Transport lost or never established
    #[error("connection error: {0}")]
    Connection(String),

    /// The statement did not finish in time
    #[error("statement timed out after {0:?}")]
    Timeout(Duration),

    /// The store is locked by another writer
    #[error("store busy: {0}")]
    Busy(String),

    /// The store rejected the statement
    #[error("database error {code}: {message}")]
    Database {
        /// SQLSTATE code
        code: String,
        /// Store message
        message: String,
    },

    /// Failure without a usable code
    #[error("statement failed: {0}")]
    Statement(String),
}

impl StoreError {
    /// Create a connection error
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a coded database error
    pub fn database(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Database {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Create an uncoded statement error
    pub fn statement(msg: impl Into<String>) -> Self {
        Self::Statement(msg.into())
    }

    /// SQLSTATE code, if the error carries one
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Database { code, .. } => Some(code),
            _ => None,
        }
    }

    /// The statement referenced a table or column the store does not have.
    ///
    /// Someone changed the schema behind the cache's back; the caller should
    /// clear the table cache before retrying.
    pub fn is_schema_drift(&self) -> bool {
        matches!(
            self.code(),
            Some(sqlstate::UNDEFINED_COLUMN) | Some(sqlstate::UNDEFINED_TABLE)
        )
    }

    /// The table or column a DDL statement tried to create already exists
    pub fn is_duplicate_object(&self) -> bool {
        matches!(
            self.code(),
            Some(sqlstate::DUPLICATE_TABLE) | Some(sqlstate::DUPLICATE_COLUMN)
        )
    }

    /// Translate a SQLite-dialect message into a coded error
    pub(crate) fn from_sqlite_message(message: String) -> Self {
        let lower = message.to_lowercase();

        if lower.contains("database is locked") || lower.contains("busy") {
            return Self::Busy(message);
        }

        let code = if lower.contains("duplicate column") {
            sqlstate::DUPLICATE_COLUMN
        } else if lower.contains("already exists") {
            sqlstate::DUPLICATE_TABLE
        } else if lower.contains("no such table") {
            sqlstate::UNDEFINED_TABLE
        } else if lower.contains("no such column") {
            sqlstate::UNDEFINED_COLUMN
        } else if lower.contains("unique constraint") {
            sqlstate::UNIQUE_VIOLATION
        } else if lower.contains("syntax error") || lower.contains("parse error") {
            sqlstate::SYNTAX_ERROR
        } else {
            return Self::Statement(message);
        };

        Self::database(code, message)
    }
}

impl From<turso::Error> for StoreError {
    fn from(e: turso::Error) -> Self {
        Self::from_sqlite_message(e.to_string())
    }
}
