//! DDL templates
//!
//! A template is SQL text with `{{ variable[.modifier...] }}` placeholders,
//! parsed once when options are built and rendered per statement.
//!
//! | Variable | Modifiers | Renders |
//! |----------|-----------|---------|
//! | `table`, `metric_table`, `tag_table` | none | qualified, quoted name |
//! | | `name` | quoted name without namespace |
//! | | `raw` | name as-is |
//! | `columns`, `all_columns` | `tags`, `fields`, `time`, `tag_id` | only columns of those roles |
//! | | `definitions` (default), `names` | `"a" bigint, ...` or `"a", ...` |
//!
//! `columns` are the columns being created or added; `all_columns` is the
//! whole table once the statement succeeds.
//!
//! ```
//! use tabula_schema::{Column, SqlType, Template, TemplateContext};
//!
//! let template: Template = "ALTER TABLE {{ table }} ADD COLUMN {{ columns }}".parse().unwrap();
//! let columns = [Column::field("usage", SqlType::DoublePrecision)];
//! let sql = template
//!     .render(&TemplateContext {
//!         namespace: "public",
//!         table: "cpu",
//!         metric_table: "cpu",
//!         tag_table: None,
//!         columns: &columns,
//!         all_columns: &columns,
//!     })
//!     .unwrap();
//! assert_eq!(sql, r#"ALTER TABLE "public"."cpu" ADD COLUMN "usage" double precision"#);
//! ```

use std::str::FromStr;

use crate::column::{Column, ColumnRole};
use crate::error::{Result, SchemaError};
use crate::identifier::{qualified, quote_identifier};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TableVar {
    Table,
    MetricTable,
    TagTable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TableFormat {
    Qualified,
    Name,
    Raw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnsVar {
    Columns,
    AllColumns,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnFormat {
    Definitions,
    Names,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Text(String),
    Table(TableVar, TableFormat),
    Columns {
        var: ColumnsVar,
        roles: Vec<ColumnRole>,
        format: ColumnFormat,
    },
}

/// A parsed DDL template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    parts: Vec<Part>,
}

/// Values a template renders against
#[derive(Debug, Clone, Copy)]
pub struct TemplateContext<'a> {
    /// Namespace qualifying table names; empty for the store default
    pub namespace: &'a str,
    /// Table the statement targets
    pub table: &'a str,
    /// Metric table of the source being matched
    pub metric_table: &'a str,
    /// Tag table of the source, when tags are normalized
    pub tag_table: Option<&'a str>,
    /// Columns being created or added
    pub columns: &'a [Column],
    /// Every column of the table after the statement
    pub all_columns: &'a [Column],
}

impl Template {
    /// Parse template text
    pub fn parse(source: &str) -> Result<Self> {
        let mut parts = Vec::new();
        let mut rest = source;

        while let Some(start) = rest.find("{{") {
            if start > 0 {
                parts.push(Part::Text(rest[..start].to_string()));
            }

            let after = &rest[start + 2..];
            let end = after
                .find("}}")
                .ok_or_else(|| SchemaError::template(source, "unterminated placeholder"))?;

            parts.push(parse_placeholder(source, after[..end].trim())?);
            rest = &after[end + 2..];
        }

        if !rest.is_empty() {
            parts.push(Part::Text(rest.to_string()));
        }

        Ok(Self {
            source: source.to_string(),
            parts,
        })
    }

    /// Template text as written
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Render into a statement
    pub fn render(&self, ctx: &TemplateContext<'_>) -> Result<String> {
        let mut out = String::with_capacity(self.source.len() + 64);

        for part in &self.parts {
            match part {
                Part::Text(text) => out.push_str(text),
                Part::Table(var, format) => {
                    let name = match var {
                        TableVar::Table => ctx.table,
                        TableVar::MetricTable => ctx.metric_table,
                        TableVar::TagTable => ctx.tag_table.ok_or_else(|| {
                            SchemaError::template(
                                &self.source,
                                "tag_table is only available when tags are stored as foreign keys",
                            )
                        })?,
                    };
                    match format {
                        TableFormat::Qualified => out.push_str(&qualified(ctx.namespace, name)),
                        TableFormat::Name => out.push_str(&quote_identifier(name)),
                        TableFormat::Raw => out.push_str(name),
                    }
                }
                Part::Columns { var, roles, format } => {
                    let columns = match var {
                        ColumnsVar::Columns => ctx.columns,
                        ColumnsVar::AllColumns => ctx.all_columns,
                    };
                    let rendered: Vec<String> = columns
                        .iter()
                        .filter(|c| roles.is_empty() || roles.contains(&c.role))
                        .map(|c| match format {
                            ColumnFormat::Definitions => c.definition(),
                            ColumnFormat::Names => quote_identifier(&c.name),
                        })
                        .collect();
                    out.push_str(&rendered.join(", "));
                }
            }
        }

        Ok(out)
    }
}

impl FromStr for Template {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn parse_placeholder(source: &str, placeholder: &str) -> Result<Part> {
    let mut segments = placeholder.split('.').map(str::trim);
    let var = segments.next().unwrap_or_default();
    let modifiers: Vec<&str> = segments.collect();

    let table_var = match var {
        "table" => Some(TableVar::Table),
        "metric_table" => Some(TableVar::MetricTable),
        "tag_table" => Some(TableVar::TagTable),
        _ => None,
    };

    if let Some(table_var) = table_var {
        let format = match modifiers.as_slice() {
            [] => TableFormat::Qualified,
            ["name"] => TableFormat::Name,
            ["raw"] => TableFormat::Raw,
            _ => {
                return Err(SchemaError::template(
                    source,
                    format!("invalid modifiers for {}: {}", var, modifiers.join(".")),
                ));
            }
        };
        return Ok(Part::Table(table_var, format));
    }

    let columns_var = match var {
        "columns" => ColumnsVar::Columns,
        "all_columns" => ColumnsVar::AllColumns,
        "" => return Err(SchemaError::template(source, "empty placeholder")),
        other => {
            return Err(SchemaError::template(
                source,
                format!("unknown variable: {}", other),
            ));
        }
    };

    let mut roles = Vec::new();
    let mut format = None;
    for modifier in modifiers {
        let role = match modifier {
            "tags" => ColumnRole::Tag,
            "fields" => ColumnRole::Field,
            "time" => ColumnRole::Time,
            "tag_id" => ColumnRole::TagId,
            "names" | "definitions" if format.is_some() => {
                return Err(SchemaError::template(
                    source,
                    format!("{} takes a single format", var),
                ));
            }
            "names" => {
                format = Some(ColumnFormat::Names);
                continue;
            }
            "definitions" => {
                format = Some(ColumnFormat::Definitions);
                continue;
            }
            other => {
                return Err(SchemaError::template(
                    source,
                    format!("unknown modifier for {}: {}", var, other),
                ));
            }
        };
        if format.is_some() {
            return Err(SchemaError::template(
                source,
                format!("role filter {} must come before the format", modifier),
            ));
        }
        if !roles.contains(&role) {
            roles.push(role);
        }
    }

    Ok(Part::Columns {
        var: columns_var,
        roles,
        format: format.unwrap_or(ColumnFormat::Definitions),
    })
}

#[cfg(test)]
#[path = "template_test.rs"]
mod tests;
