//! SQL rendering for the statements the engine issues.
//!
//! Identifiers come from the database catalog, but they are still validated
//! and quoted before being interpolated into statement text.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::core::{DateShiftError, Result};
use crate::schema::TableIdentifier;

const FULL_NAME_EXPR: &str = "CONCAT(TABLE_CATALOG, '.', TABLE_SCHEMA, '.', TABLE_NAME)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlDialect {
    #[default]
    Postgres,
    SqlServer,
}

impl SqlDialect {
    /// Schema skipped by introspection unless configured otherwise.
    pub fn default_excluded_schema(self) -> &'static str {
        match self {
            Self::Postgres => "public",
            Self::SqlServer => "dbo",
        }
    }

    /// `DATA_TYPE` values treated as temporal columns.
    pub fn temporal_types(self) -> &'static [&'static str] {
        match self {
            Self::Postgres => &[
                "date",
                "timestamp without time zone",
                "timestamp with time zone",
            ],
            Self::SqlServer => &["date", "datetime"],
        }
    }

    /// `TABLE_CATALOG`, `TABLE_SCHEMA`, `TABLE_NAME` as text cells.
    fn name_columns(self) -> &'static str {
        match self {
            Self::Postgres => {
                "TABLE_CATALOG::text AS table_catalog, \
                 TABLE_SCHEMA::text AS table_schema, \
                 TABLE_NAME::text AS table_name"
            }
            Self::SqlServer => "TABLE_CATALOG, TABLE_SCHEMA, TABLE_NAME",
        }
    }

    fn system_schemas(self) -> &'static [&'static str] {
        match self {
            Self::Postgres => &["pg_catalog", "information_schema"],
            Self::SqlServer => &[],
        }
    }

    pub fn quote_ident(self, ident: &str) -> Result<String> {
        validate_identifier(ident)?;
        Ok(match self {
            Self::Postgres => format!("\"{}\"", ident.replace('"', "\"\"")),
            Self::SqlServer => format!("[{}]", ident.replace(']', "]]")),
        })
    }

    /// Quote the catalog, schema and table parts of a qualified name.
    pub fn quote_table(self, table: &TableIdentifier) -> Result<String> {
        let parts = table
            .parts()?
            .into_iter()
            .map(|part| {
                self.quote_ident(part)
                    .map_err(|_| DateShiftError::InvalidIdentifier(table.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(parts.join("."))
    }

    /// Base tables outside `excluded_schema`, one `(catalog, schema, table)` row each.
    pub fn list_tables_sql(self, excluded_schema: &str) -> String {
        let mut excluded = vec![string_literal(excluded_schema)];
        excluded.extend(self.system_schemas().iter().map(|s| string_literal(s)));

        format!(
            "SELECT {} \
             FROM INFORMATION_SCHEMA.TABLES \
             WHERE TABLE_TYPE = 'BASE TABLE' \
             AND TABLE_SCHEMA NOT IN ({})",
            self.name_columns(),
            excluded.join(", ")
        )
    }

    /// Temporal columns of `tables`: the three name cells plus a comma-joined column list.
    pub fn temporal_columns_sql(self, tables: &[TableIdentifier]) -> String {
        let types = self
            .temporal_types()
            .iter()
            .map(|t| string_literal(t))
            .collect::<Vec<_>>()
            .join(", ");
        let names = tables
            .iter()
            .map(|t| string_literal(t.as_str()))
            .collect::<Vec<_>>()
            .join(", ");
        let aggregate = match self {
            Self::Postgres => "STRING_AGG(COLUMN_NAME::text, ',' ORDER BY ORDINAL_POSITION)",
            Self::SqlServer => {
                "STRING_AGG(COLUMN_NAME, ',') WITHIN GROUP (ORDER BY ORDINAL_POSITION)"
            }
        };

        let name_columns = self.name_columns();
        format!(
            "SELECT {name_columns}, {aggregate} AS columns \
             FROM INFORMATION_SCHEMA.COLUMNS \
             WHERE DATA_TYPE IN ({types}) \
             AND {FULL_NAME_EXPR} IN ({names}) \
             GROUP BY TABLE_CATALOG, TABLE_SCHEMA, TABLE_NAME"
        )
    }

    pub fn max_value_sql(self, table: &TableIdentifier, column: &str) -> Result<String> {
        Ok(format!(
            "SELECT MAX({}) FROM {}",
            self.quote_ident(column)?,
            self.quote_table(table)?
        ))
    }

    /// One `UPDATE` adding `days` to every listed column.
    pub fn shift_columns_sql(
        self,
        table: &TableIdentifier,
        columns: &[String],
        days: i64,
    ) -> Result<String> {
        if columns.is_empty() {
            return Err(DateShiftError::EmptyColumnSet(table.to_string()));
        }

        let assignments = columns
            .iter()
            .map(|column| {
                let quoted = self.quote_ident(column)?;
                Ok(match self {
                    Self::Postgres => format!("{quoted} = {quoted} + INTERVAL '1 day' * {days}"),
                    Self::SqlServer => format!("{quoted} = DATEADD(DAY, {days}, {quoted})"),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(format!(
            "UPDATE {} SET {}",
            self.quote_table(table)?,
            assignments.join(", ")
        ))
    }
}

impl fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Postgres => write!(f, "postgres"),
            Self::SqlServer => write!(f, "sqlserver"),
        }
    }
}

impl FromStr for SqlDialect {
    type Err = DateShiftError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            "sqlserver" | "mssql" | "tsql" => Ok(Self::SqlServer),
            other => Err(DateShiftError::Config(format!("Unknown SQL dialect '{}'", other))),
        }
    }
}

fn validate_identifier(ident: &str) -> Result<()> {
    if ident.trim().is_empty() || ident.chars().any(char::is_control) {
        return Err(DateShiftError::InvalidIdentifier(ident.to_string()));
    }
    Ok(())
}

fn string_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
