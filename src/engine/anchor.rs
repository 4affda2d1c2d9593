use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::connection::QueryExecutor;
use crate::core::{DateShiftError, Result, Value};
use crate::dialect::SqlDialect;
use crate::schema::TableIdentifier;

/// Latest date of the designated anchor column, the dataset's notion of "now".
///
/// Fails when the column has no values or holds something other than a
/// date/datetime: there is no fallback anchor.
pub fn resolve_anchor_date(
    executor: &mut dyn QueryExecutor,
    dialect: SqlDialect,
    table: &TableIdentifier,
    column: &str,
) -> Result<NaiveDate> {
    let unavailable = |reason: String| DateShiftError::AnchorUnavailable {
        table: table.to_string(),
        column: column.to_string(),
        reason,
    };

    let value = fetch_max(executor, dialect, table, column)?;
    let anchor = match value {
        Some(v) => v.as_date().ok_or_else(|| {
            unavailable(format!("max value is of type {}, not a date or datetime", v.type_name()))
        })?,
        None => return Err(unavailable("column has no values".to_string())),
    };

    info!(%table, column, %anchor, "latest transaction date found");
    Ok(anchor)
}

/// Latest date stored in one column, or `None` when it is empty or not temporal.
pub fn column_max_date(
    executor: &mut dyn QueryExecutor,
    dialect: SqlDialect,
    table: &TableIdentifier,
    column: &str,
) -> Result<Option<NaiveDate>> {
    match fetch_max(executor, dialect, table, column)? {
        None => {
            debug!(%table, column, "column has no values");
            Ok(None)
        }
        Some(value) => match value.as_date() {
            Some(date) => Ok(Some(date)),
            None => {
                warn!(
                    %table,
                    column,
                    value_type = value.type_name(),
                    "max value is not a date or datetime"
                );
                Ok(None)
            }
        },
    }
}

fn fetch_max(
    executor: &mut dyn QueryExecutor,
    dialect: SqlDialect,
    table: &TableIdentifier,
    column: &str,
) -> Result<Option<Value>> {
    let result = executor.execute(&dialect.max_value_sql(table, column)?)?;
    Ok(result.scalar().filter(|v| !v.is_null()).cloned())
}
