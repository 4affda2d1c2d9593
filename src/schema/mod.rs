//! Catalog introspection: which tables carry which date/datetime columns.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Serialize, Serializer};
use tracing::{info, warn};

use crate::connection::QueryExecutor;
use crate::core::{DateShiftError, Result, Value};
use crate::dialect::SqlDialect;
use crate::result::QueryResult;

/// Fully qualified `catalog.schema.table` name.
///
/// The full name is an opaque key: equality, ordering and hashing only look
/// at it. The catalog, schema and table parts travel alongside it and are
/// the only thing ever quoted into a statement.
#[derive(Debug, Clone)]
pub struct TableIdentifier {
    full_name: String,
    parts: Option<[String; 3]>,
}

impl TableIdentifier {
    /// From a dotted name. Only a name of exactly three dot-separated parts
    /// can later be rendered; use [`TableIdentifier::from_parts`] when a part
    /// contains a dot itself.
    pub fn new(name: impl Into<String>) -> Self {
        let full_name = name.into();
        let parts = match full_name.split('.').collect::<Vec<_>>().as_slice() {
            [catalog, schema, table] => {
                Some([catalog.to_string(), schema.to_string(), table.to_string()])
            }
            _ => None,
        };
        Self { full_name, parts }
    }

    pub fn from_parts(catalog: &str, schema: &str, table: &str) -> Self {
        Self {
            full_name: format!("{catalog}.{schema}.{table}"),
            parts: Some([catalog.to_string(), schema.to_string(), table.to_string()]),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.full_name
    }

    /// `[catalog, schema, table]`
    pub fn parts(&self) -> Result<[&str; 3]> {
        match &self.parts {
            Some([catalog, schema, table]) => Ok([catalog.as_str(), schema.as_str(), table.as_str()]),
            None => Err(DateShiftError::InvalidIdentifier(self.full_name.clone())),
        }
    }
}

impl PartialEq for TableIdentifier {
    fn eq(&self, other: &Self) -> bool {
        self.full_name == other.full_name
    }
}

impl Eq for TableIdentifier {}

impl Hash for TableIdentifier {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.full_name.hash(state);
    }
}

impl PartialOrd for TableIdentifier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TableIdentifier {
    fn cmp(&self, other: &Self) -> Ordering {
        self.full_name.cmp(&other.full_name)
    }
}

impl Serialize for TableIdentifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.full_name)
    }
}

impl fmt::Display for TableIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name)
    }
}

impl From<&str> for TableIdentifier {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for TableIdentifier {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

/// `TABLE_CATALOG`, `TABLE_SCHEMA`, `TABLE_NAME` cells at the start of a catalog row.
fn table_from_row(row: &[Value]) -> Result<TableIdentifier> {
    match row {
        [Value::Text(catalog), Value::Text(schema), Value::Text(table), ..] => {
            Ok(TableIdentifier::from_parts(catalog, schema, table))
        }
        _ => Err(DateShiftError::TypeMismatch(format!(
            "expected (TEXT, TEXT, TEXT) table name, got ({})",
            row.iter().map(Value::type_name).collect::<Vec<_>>().join(", ")
        ))),
    }
}

/// Table -> temporal column names.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ColumnConfig {
    tables: BTreeMap<TableIdentifier, Vec<String>>,
}

impl ColumnConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(catalog, schema, table, "col1,col2,...")` rows.
    ///
    /// Tables whose aggregated list holds no names are left out.
    pub fn from_rows(result: &QueryResult) -> Result<Self> {
        let mut config = Self::new();

        for row in &result.rows {
            let table = table_from_row(row)?;
            let columns = match row.get(3) {
                Some(Value::Text(columns)) => columns,
                other => {
                    return Err(DateShiftError::TypeMismatch(format!(
                        "expected TEXT column list for {}, got {}",
                        table,
                        other.map_or("nothing", Value::type_name)
                    )));
                }
            };

            let columns: Vec<String> = columns
                .split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(String::from)
                .collect();

            if columns.is_empty() {
                warn!(%table, "catalog returned no temporal column names");
                continue;
            }
            config.insert(table, columns);
        }

        Ok(config)
    }

    pub fn insert(&mut self, table: TableIdentifier, columns: Vec<String>) {
        self.tables.insert(table, columns);
    }

    pub fn get(&self, table: &TableIdentifier) -> Option<&[String]> {
        self.tables.get(table).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TableIdentifier, &[String])> {
        self.tables.iter().map(|(t, c)| (t, c.as_slice()))
    }

    pub fn tables(&self) -> impl Iterator<Item = &TableIdentifier> {
        self.tables.keys()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn column_count(&self) -> usize {
        self.tables.values().map(Vec::len).sum()
    }
}

pub struct SchemaIntrospector {
    dialect: SqlDialect,
    excluded_schema: String,
}

impl SchemaIntrospector {
    pub fn new(dialect: SqlDialect, excluded_schema: impl Into<String>) -> Self {
        Self {
            dialect,
            excluded_schema: excluded_schema.into(),
        }
    }

    pub fn list_tables(&self, executor: &mut dyn QueryExecutor) -> Result<Vec<TableIdentifier>> {
        let result = executor.execute(&self.dialect.list_tables_sql(&self.excluded_schema))?;

        let tables = result
            .rows
            .iter()
            .map(|row| table_from_row(row))
            .collect::<Result<Vec<_>>>()?;

        info!(count = tables.len(), excluded_schema = %self.excluded_schema, "retrieved all tables");
        Ok(tables)
    }

    pub fn list_temporal_columns(&self, executor: &mut dyn QueryExecutor) -> Result<ColumnConfig> {
        let tables = self.list_tables(executor)?;
        if tables.is_empty() {
            warn!("no base tables found, nothing to shift");
            return Ok(ColumnConfig::new());
        }

        let result = executor.execute(&self.dialect.temporal_columns_sql(&tables))?;
        let config = ColumnConfig::from_rows(&result)?;

        info!(
            tables = config.len(),
            columns = config.column_count(),
            "read temporal columns"
        );
        Ok(config)
    }
}
