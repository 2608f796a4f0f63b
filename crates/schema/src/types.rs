//! Column types
//!
//! [`resolve`] picks the column type for a field value. [`SqlType::parse`]
//! reads a type back from the store's catalog, and [`SqlType::can_contain`]
//! decides whether an existing column can take values of a required type.

use std::fmt;

use tabula_config::Uint64Type;

use crate::metric::FieldValue;

/// SQL column type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SqlType {
    SmallInt,
    Integer,
    BigInt,
    Numeric,
    Real,
    DoublePrecision,
    Boolean,
    Text,
    /// timestamp without time zone
    Timestamp,
    /// timestamp with time zone
    TimestampTz,
    /// Unsigned 64-bit integer (pguint extension)
    Uint8,
    Jsonb,
    /// A type this crate never emits, kept as the store spelled it
    Other(String),
}

impl SqlType {
    /// SQL spelling
    pub fn as_str(&self) -> &str {
        match self {
            Self::SmallInt => "smallint",
            Self::Integer => "integer",
            Self::BigInt => "bigint",
            Self::Numeric => "numeric",
            Self::Real => "real",
            Self::DoublePrecision => "double precision",
            Self::Boolean => "boolean",
            Self::Text => "text",
            Self::Timestamp => "timestamp without time zone",
            Self::TimestampTz => "timestamp with time zone",
            Self::Uint8 => "uint8",
            Self::Jsonb => "jsonb",
            Self::Other(name) => name,
        }
    }

    /// Parse a declared type as reported by the store
    ///
    /// Case-insensitive. Length and precision modifiers are ignored, so
    /// `numeric(20,0)` is [`SqlType::Numeric`].
    pub fn parse(declared: &str) -> Self {
        let mut base = String::with_capacity(declared.len());
        let mut depth = 0usize;
        for c in declared.chars() {
            match c {
                '(' => depth += 1,
                ')' => depth = depth.saturating_sub(1),
                _ if depth == 0 => base.push(c.to_ascii_lowercase()),
                _ => {}
            }
        }
        let base = base.split_whitespace().collect::<Vec<_>>().join(" ");

        match base.as_str() {
            "smallint" | "int2" => Self::SmallInt,
            "integer" | "int" | "int4" => Self::Integer,
            "bigint" | "int8" => Self::BigInt,
            "numeric" | "decimal" => Self::Numeric,
            "real" | "float4" => Self::Real,
            "double precision" | "double" | "float8" | "float" => Self::DoublePrecision,
            "boolean" | "bool" => Self::Boolean,
            "text" | "varchar" | "character varying" => Self::Text,
            "timestamp" | "timestamp without time zone" => Self::Timestamp,
            "timestamptz" | "timestamp with time zone" => Self::TimestampTz,
            "uint8" => Self::Uint8,
            "jsonb" | "json" => Self::Jsonb,
            _ => Self::Other(declared.trim().to_string()),
        }
    }

    /// Whether a column of this type can hold values of `required`
    pub fn can_contain(&self, required: &SqlType) -> bool {
        use SqlType::*;

        if self == required {
            return true;
        }

        match (self, required) {
            // we cannot reason about it; let the store decide at insert time
            (Other(_), _) => true,
            (BigInt, SmallInt | Integer) => true,
            (Integer, SmallInt) => true,
            (Numeric, SmallInt | Integer | BigInt | Uint8 | Real | DoublePrecision) => true,
            (DoublePrecision, SmallInt | Integer | BigInt | Real) => true,
            (Real, SmallInt | Integer) => true,
            (Timestamp, TimestampTz) | (TimestampTz, Timestamp) => true,
            _ => false,
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Column type for a field value
pub fn resolve(value: &FieldValue, uint64: Uint64Type) -> SqlType {
    match value {
        FieldValue::Int(_) => SqlType::BigInt,
        FieldValue::UInt(_) => match uint64 {
            Uint64Type::Numeric => SqlType::Numeric,
            Uint64Type::Uint8 => SqlType::Uint8,
        },
        FieldValue::Float(_) => SqlType::DoublePrecision,
        FieldValue::Bool(_) => SqlType::Boolean,
        FieldValue::String(_) => SqlType::Text,
    }
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
