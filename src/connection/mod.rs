pub mod config;
pub mod postgres;

use crate::core::Result;
use crate::result::QueryResult;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref READ_STATEMENT: Regex = Regex::new(r"^\s*(?i:select|with)\b").expect("valid regex");
}

/// Executes raw SQL text against a live database session.
///
/// Reads return column names and rows. Writes are committed before
/// returning [`QueryResult::empty`]. Every failure is reported as
/// [`DateShiftError::Query`](crate::core::DateShiftError::Query) carrying the
/// offending statement; implementations never retry.
pub trait QueryExecutor {
    fn execute(&mut self, sql: &str) -> Result<QueryResult>;
}

impl<E: QueryExecutor + ?Sized> QueryExecutor for &mut E {
    fn execute(&mut self, sql: &str) -> Result<QueryResult> {
        (**self).execute(sql)
    }
}

impl<E: QueryExecutor + ?Sized> QueryExecutor for Box<E> {
    fn execute(&mut self, sql: &str) -> Result<QueryResult> {
        (**self).execute(sql)
    }
}

/// Whether a statement returns rows (`SELECT` or a CTE) rather than mutating data.
pub fn is_read_statement(sql: &str) -> bool {
    READ_STATEMENT.is_match(sql)
}
