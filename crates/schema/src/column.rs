//! Column model

use std::fmt;

use crate::identifier::quote_identifier;
use crate::types::SqlType;

/// What a column holds
///
/// The order is the order columns appear in a table: time first, then the
/// tag key, then tags, then fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ColumnRole {
    Time,
    TagId,
    Tag,
    Field,
}

impl ColumnRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Time => "time",
            Self::TagId => "tag_id",
            Self::Tag => "tag",
            Self::Field => "field",
        }
    }
}

impl fmt::Display for ColumnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A table column
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Column {
    pub name: String,
    pub role: ColumnRole,
    pub data_type: SqlType,
}

impl Column {
    pub fn new(name: impl Into<String>, role: ColumnRole, data_type: SqlType) -> Self {
        Self {
            name: name.into(),
            role,
            data_type,
        }
    }

    /// A text tag column
    pub fn tag(name: impl Into<String>) -> Self {
        Self::new(name, ColumnRole::Tag, SqlType::Text)
    }

    pub fn field(name: impl Into<String>, data_type: SqlType) -> Self {
        Self::new(name, ColumnRole::Field, data_type)
    }

    /// `"name" type`, as used in CREATE and ALTER statements
    pub fn definition(&self) -> String {
        format!("{} {}", quote_identifier(&self.name), self.data_type)
    }

    /// Time and tag key columns; rows cannot be written without them
    pub fn is_critical(&self) -> bool {
        matches!(self.role, ColumnRole::Time | ColumnRole::TagId)
    }

    /// Table order: by role, then by name
    pub fn sort(columns: &mut [Column]) {
        columns.sort_by(|a, b| a.role.cmp(&b.role).then_with(|| a.name.cmp(&b.name)));
    }
}

/// Insertion-ordered set of columns keyed by name
///
/// The first column pushed under a name wins.
#[derive(Debug, Clone, Default)]
pub struct ColumnList {
    columns: Vec<Column>,
}

impl ColumnList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `column` unless one with the same name exists.
    ///
    /// Returns whether it was added.
    pub fn push(&mut self, column: Column) -> bool {
        if self.contains(&column.name) {
            return false;
        }
        self.columns.push(column);
        true
    }

    pub fn remove(&mut self, name: &str) -> Option<Column> {
        let idx = self.columns.iter().position(|c| c.name == name)?;
        Some(self.columns.remove(idx))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn get(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn as_slice(&self) -> &[Column] {
        &self.columns
    }
}
