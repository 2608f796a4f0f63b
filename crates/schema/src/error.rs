//! Schema error types

use tabula_store::{ErrorClass, StoreError, classify};
use thiserror::Error;

/// Result type for schema operations
pub type Result<T> = std::result::Result<T, SchemaError>;

/// Errors from schema reconciliation
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The store failed
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The table name exceeds the store's identifier limit
    #[error("table name too long: \"{name}\" is {bytes} bytes, limit is {limit}")]
    TableNameTooLong {
        name: String,
        bytes: usize,
        limit: usize,
    },

    /// A DDL template could not be parsed or rendered
    #[error("template \"{template}\": {message}")]
    Template { template: String, message: String },

    /// A column every row needs cannot be persisted
    #[error("critical column \"{0}\"")]
    CriticalColumn(String),

    /// Options are inconsistent
    #[error("invalid schema options: {0}")]
    Config(String),
}

impl SchemaError {
    /// Create a table-name overflow error
    pub fn table_name_too_long(name: impl Into<String>, limit: usize) -> Self {
        let name = name.into();
        Self::TableNameTooLong {
            bytes: name.len(),
            name,
            limit,
        }
    }

    /// Create a template error
    pub fn template(template: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Template {
            template: template.into(),
            message: message.into(),
        }
    }

    /// Create a critical column error
    pub fn critical_column(name: impl Into<String>) -> Self {
        Self::CriticalColumn(name.into())
    }

    /// Retry class of this error
    ///
    /// Only store errors can be temporary; everything raised by the schema
    /// layer itself would fail the same way on retry.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Store(e) => classify(e),
            _ => ErrorClass::Permanent,
        }
    }

    /// Whether retrying the whole operation later may succeed
    pub fn is_temporary(&self) -> bool {
        self.class() == ErrorClass::Temporary
    }
}
