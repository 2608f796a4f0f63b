//! Error classification
//!
//! Decides whether a store failure is worth retrying. Temporary errors are
//! returned to the caller untouched so the whole reconciliation can run
//! again later; permanent errors degrade a single table or column.

use crate::error::{StoreError, sqlstate};

/// Retry class of a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Retrying the same operation later may succeed
    Temporary,
    /// Retrying as-is will fail again
    Permanent,
}

/// Classify a store error
pub fn classify(err: &StoreError) -> ErrorClass {
    match err {
        StoreError::Connection(_) | StoreError::Timeout(_) | StoreError::Busy(_) => {
            ErrorClass::Temporary
        }
        StoreError::Database { code, message } => classify_sqlstate(code, message),
        StoreError::Statement(_) => ErrorClass::Permanent,
    }
}

/// Shorthand for `classify(err) == ErrorClass::Temporary`
pub fn is_temporary(err: &StoreError) -> bool {
    classify(err) == ErrorClass::Temporary
}

fn classify_sqlstate(code: &str, message: &str) -> ErrorClass {
    let class = code.get(..2).unwrap_or_default();

    let temporary = match class {
        // integrity constraint violation: a concurrent writer inserted the
        // same tag row first
        "23" => code == sqlstate::UNIQUE_VIOLATION && message.contains("tag_id"),
        // invalid transaction state
        "25" => true,
        // transaction rollback: serialization failure, deadlock
        "40" => code == sqlstate::SERIALIZATION_FAILURE || code == sqlstate::DEADLOCK_DETECTED,
        // a concurrent writer created the table or column first; the next
        // attempt re-reads the structure and finds it
        "42" => code == sqlstate::DUPLICATE_COLUMN || code == sqlstate::DUPLICATE_TABLE,
        // insufficient resources
        "53" => true,
        // operator intervention
        "57" => code != sqlstate::QUERY_CANCELED && code != sqlstate::DATABASE_DROPPED,
        // connection exception
        "08" => true,
        _ => false,
    };

    if temporary {
        ErrorClass::Temporary
    } else {
        ErrorClass::Permanent
    }
}

#[cfg(test)]
#[path = "classify_test.rs"]
mod tests;
