use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::core::{DateShiftError, Result};
use crate::dialect::SqlDialect;
use crate::schema::TableIdentifier;

pub const SQLSERVER_ANCHOR_TABLE: &str = "AdventureWorks.Production.TransactionHistory";
pub const SQLSERVER_ANCHOR_COLUMN: &str = "TransactionDate";

/// AdventureWorks as ported to PostgreSQL, with folded lowercase identifiers.
pub const POSTGRES_ANCHOR_TABLE: &str = "adventureworks.production.transactionhistory";
pub const POSTGRES_ANCHOR_COLUMN: &str = "transactiondate";

/// Default `(table, column)` anchor for `dialect`.
pub fn default_anchor(dialect: SqlDialect) -> (&'static str, &'static str) {
    match dialect {
        SqlDialect::Postgres => (POSTGRES_ANCHOR_TABLE, POSTGRES_ANCHOR_COLUMN),
        SqlDialect::SqlServer => (SQLSERVER_ANCHOR_TABLE, SQLSERVER_ANCHOR_COLUMN),
    }
}

/// What a run does when one table's update fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Log the failure, record it in the report and move on to the next table.
    #[default]
    Continue,
    /// Stop the run and return the error.
    Abort,
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Continue => write!(f, "continue"),
            Self::Abort => write!(f, "abort"),
        }
    }
}

impl FromStr for FailurePolicy {
    type Err = DateShiftError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "continue" | "skip" => Ok(Self::Continue),
            "abort" | "fail" => Ok(Self::Abort),
            other => Err(DateShiftError::Config(format!("Unknown failure policy '{}'", other))),
        }
    }
}

/// Settings of one refresh run.
#[derive(Debug, Clone)]
pub struct ShiftConfig {
    /// Table holding the dataset's primary transactional timeline
    pub anchor_table: TableIdentifier,

    pub anchor_column: String,

    /// `None` falls back to the dialect's default schema
    pub excluded_schema: Option<String>,

    pub dialect: SqlDialect,

    pub failure_policy: FailurePolicy,
}

impl ShiftConfig {
    pub fn new(dialect: SqlDialect) -> Self {
        let (table, column) = default_anchor(dialect);
        Self {
            anchor_table: TableIdentifier::new(table),
            anchor_column: column.to_string(),
            excluded_schema: None,
            dialect,
            failure_policy: FailurePolicy::default(),
        }
    }

    pub fn anchor(mut self, table: impl Into<TableIdentifier>, column: &str) -> Self {
        self.anchor_table = table.into();
        self.anchor_column = column.to_string();
        self
    }

    pub fn excluded_schema(mut self, schema: &str) -> Self {
        self.excluded_schema = Some(schema.to_string());
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Move a default anchor into `database`, the catalog the connection is
    /// bound to. An explicitly configured anchor is left as is.
    pub fn for_database(mut self, database: &str) -> Self {
        let (default_table, _) = default_anchor(self.dialect);
        if self.anchor_table.as_str() != default_table {
            return self;
        }
        let moved = self
            .anchor_table
            .parts()
            .ok()
            .map(|[_, schema, table]| TableIdentifier::from_parts(database, schema, table));
        if let Some(moved) = moved {
            self.anchor_table = moved;
        }
        self
    }

    pub fn effective_excluded_schema(&self) -> &str {
        self.excluded_schema
            .as_deref()
            .unwrap_or_else(|| self.dialect.default_excluded_schema())
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads `DATESHIFT_DIALECT`, `DATESHIFT_ANCHOR_TABLE`,
    /// `DATESHIFT_ANCHOR_COLUMN`, `DATESHIFT_EXCLUDED_SCHEMA` and
    /// `DATESHIFT_FAILURE_POLICY`; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let dialect = match lookup("DATESHIFT_DIALECT") {
            Some(raw) => raw.parse()?,
            None => SqlDialect::default(),
        };
        let mut config = Self::new(dialect);

        if let Some(table) = lookup("DATESHIFT_ANCHOR_TABLE") {
            config.anchor_table = TableIdentifier::new(table);
        }
        if let Some(column) = lookup("DATESHIFT_ANCHOR_COLUMN") {
            config.anchor_column = column;
        }
        if let Some(schema) = lookup("DATESHIFT_EXCLUDED_SCHEMA") {
            config.excluded_schema = Some(schema);
        }
        if let Some(policy) = lookup("DATESHIFT_FAILURE_POLICY") {
            config.failure_policy = policy.parse()?;
        }

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.anchor_table.as_str().trim().is_empty() {
            return Err(DateShiftError::Config("Anchor table cannot be empty".to_string()));
        }
        if self.anchor_column.trim().is_empty() {
            return Err(DateShiftError::Config("Anchor column cannot be empty".to_string()));
        }
        if self.anchor_table.parts().is_err() {
            return Err(DateShiftError::Config(format!(
                "Anchor table '{}' must be catalog.schema.table",
                self.anchor_table
            )));
        }
        Ok(())
    }
}

impl Default for ShiftConfig {
    fn default() -> Self {
        Self::new(SqlDialect::default())
    }
}
