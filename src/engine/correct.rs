use chrono::NaiveDate;
use tracing::debug;

use super::anchor::column_max_date;
use super::offset::days_between;
use super::shift::shift_table;
use crate::connection::QueryExecutor;
use crate::core::{DateShiftError, Result};
use crate::dialect::SqlDialect;
use crate::schema::TableIdentifier;

/// What the corrector did to one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Correction {
    /// The table's latest date was already on or before today.
    WithinBounds { max_date: NaiveDate },
    /// The table overshot and was moved back by `days` (negative).
    Shifted { max_date: NaiveDate, days: i64 },
}

/// Latest date across all temporal columns of `table`.
///
/// Columns without a usable max count as `today`, so an all-null table
/// never looks like it overshoots.
pub fn table_max_date(
    executor: &mut dyn QueryExecutor,
    dialect: SqlDialect,
    table: &TableIdentifier,
    columns: &[String],
    today: NaiveDate,
) -> Result<NaiveDate> {
    let mut latest: Option<NaiveDate> = None;
    for column in columns {
        let column_max = column_max_date(executor, dialect, table, column)?.unwrap_or(today);
        latest = Some(latest.map_or(column_max, |current| current.max(column_max)));
    }
    latest.ok_or_else(|| DateShiftError::EmptyColumnSet(table.to_string()))
}

/// Pull `table` back to `today` when any of its dates lies in the future.
pub fn correct_table(
    executor: &mut dyn QueryExecutor,
    dialect: SqlDialect,
    table: &TableIdentifier,
    columns: &[String],
    today: NaiveDate,
) -> Result<Correction> {
    let max_date = table_max_date(executor, dialect, table, columns, today)?;
    if max_date <= today {
        return Ok(Correction::WithinBounds { max_date });
    }

    let days = days_between(max_date, today);
    debug!(%table, %max_date, days, "table overshoots today");
    shift_table(executor, dialect, table, columns, days)?;
    Ok(Correction::Shifted { max_date, days })
}
