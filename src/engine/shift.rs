use tracing::debug;

use crate::connection::QueryExecutor;
use crate::core::Result;
use crate::dialect::SqlDialect;
use crate::schema::TableIdentifier;

/// Add `days` to every listed column of `table` in a single `UPDATE`.
///
/// All temporal columns of a row move together, so intra-row ordering
/// (order date before ship date) is preserved. Nothing is read back.
pub fn shift_table(
    executor: &mut dyn QueryExecutor,
    dialect: SqlDialect,
    table: &TableIdentifier,
    columns: &[String],
    days: i64,
) -> Result<()> {
    let statement = dialect.shift_columns_sql(table, columns, days)?;
    debug!(%table, days, statement = %statement, "updating table");
    executor.execute(&statement)?;
    Ok(())
}
