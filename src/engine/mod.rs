//! The two-pass refresh.
//!
//! Pass 1 shifts every temporal column by one global offset sized on the
//! anchor table. Pass 2 re-reads each table's latest date and pulls back the
//! ones that now lie in the future.

pub mod anchor;
pub mod correct;
pub mod offset;
pub mod report;
pub mod shift;


use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::{FailurePolicy, ShiftConfig};
use crate::connection::QueryExecutor;
use crate::core::{DateShiftError, Result};
use crate::schema::{ColumnConfig, SchemaIntrospector, TableIdentifier};

use self::anchor::resolve_anchor_date;
use self::correct::{Correction, correct_table};
use self::offset::days_between;
use self::report::{RunReport, StepOutcome, TableReport};
use self::shift::shift_table;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum RunState {
    Uninitialized,
    SchemaLoaded,
    AnchorResolved,
    OffsetComputed,
    Pass1Complete,
    Pass2Complete,
}

/// Read-only view of what a run would start from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Inspection {
    pub column_config: ColumnConfig,
    pub anchor_date: NaiveDate,
    pub today: NaiveDate,
    pub global_offset: i64,
}

pub struct DateShifter<'a, C = SystemClock> {
    executor: &'a mut dyn QueryExecutor,
    config: ShiftConfig,
    clock: C,
    state: RunState,
}

impl<'a> DateShifter<'a, SystemClock> {
    pub fn new(executor: &'a mut dyn QueryExecutor, config: ShiftConfig) -> Self {
        Self::with_clock(executor, config, SystemClock)
    }
}

impl<'a, C: Clock> DateShifter<'a, C> {
    pub fn with_clock(executor: &'a mut dyn QueryExecutor, config: ShiftConfig, clock: C) -> Self {
        Self {
            executor,
            config,
            clock,
            state: RunState::Uninitialized,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn config(&self) -> &ShiftConfig {
        &self.config
    }

    /// Load the schema, resolve the anchor and compute the global offset
    /// without writing anything.
    pub fn inspect(&mut self) -> Result<Inspection> {
        let today = self.clock.today();
        let (column_config, anchor_date, global_offset) = self.prepare(today)?;
        Ok(Inspection {
            column_config,
            anchor_date,
            today,
            global_offset,
        })
    }

    /// Run both passes.
    ///
    /// Setup failures (schema, anchor) abort before any write. Per-table
    /// failures follow the configured [`FailurePolicy`].
    pub fn run(&mut self) -> Result<RunReport> {
        // Captured once so both passes agree on "today" across midnight.
        let today = self.clock.today();
        let (column_config, anchor_date, global_offset) = self.prepare(today)?;

        info!(global_offset, "updating dates based on the anchor date");
        let mut shifted = Vec::with_capacity(column_config.len());
        for (table, columns) in column_config.iter() {
            let pass1 = self.shift_pass(table, columns, global_offset)?;
            shifted.push((table.clone(), columns.to_vec(), pass1));
        }
        self.advance(RunState::Pass1Complete);

        info!("updating dates later than today");
        let mut tables = Vec::with_capacity(shifted.len());
        for (table, columns, pass1) in shifted {
            let (pass2, max_date_after_pass1) = self.correct_pass(&table, &columns, today)?;
            tables.push(TableReport {
                table,
                columns,
                pass1,
                pass2,
                max_date_after_pass1,
            });
        }
        self.advance(RunState::Pass2Complete);

        let report = RunReport {
            anchor_date,
            today,
            global_offset,
            tables,
        };
        info!(
            tables = report.tables.len(),
            corrected = report.corrected_tables().count(),
            failed = report.failed_tables().count(),
            "date refresh finished"
        );
        Ok(report)
    }

    fn prepare(&mut self, today: NaiveDate) -> Result<(ColumnConfig, NaiveDate, i64)> {
        self.state = RunState::Uninitialized;
        self.config.validate()?;

        let introspector = SchemaIntrospector::new(
            self.config.dialect,
            self.config.effective_excluded_schema(),
        );
        let column_config = introspector.list_temporal_columns(&mut *self.executor)?;
        self.advance(RunState::SchemaLoaded);

        let anchor_date = resolve_anchor_date(
            &mut *self.executor,
            self.config.dialect,
            &self.config.anchor_table,
            &self.config.anchor_column,
        )?;
        self.advance(RunState::AnchorResolved);

        let global_offset = days_between(anchor_date, today);
        if global_offset < 0 {
            warn!(%anchor_date, %today, global_offset, "anchor date lies in the future");
        }
        self.advance(RunState::OffsetComputed);

        Ok((column_config, anchor_date, global_offset))
    }

    fn shift_pass(
        &mut self,
        table: &TableIdentifier,
        columns: &[String],
        days: i64,
    ) -> Result<StepOutcome> {
        if columns.is_empty() {
            return self.settle(table, Err(DateShiftError::EmptyColumnSet(table.to_string())));
        }
        if days == 0 {
            debug!(%table, "global offset is zero, nothing to shift");
            return Ok(StepOutcome::Unchanged);
        }

        let result = shift_table(&mut *self.executor, self.config.dialect, table, columns, days)
            .map(|()| StepOutcome::Shifted { days });
        self.settle(table, result)
    }

    fn correct_pass(
        &mut self,
        table: &TableIdentifier,
        columns: &[String],
        today: NaiveDate,
    ) -> Result<(StepOutcome, Option<NaiveDate>)> {
        let result = correct_table(&mut *self.executor, self.config.dialect, table, columns, today);
        let max_date = match &result {
            Ok(Correction::WithinBounds { max_date } | Correction::Shifted { max_date, .. }) => {
                Some(*max_date)
            }
            Err(_) => None,
        };
        let outcome = result.map(|correction| match correction {
            Correction::WithinBounds { .. } => StepOutcome::Unchanged,
            Correction::Shifted { days, .. } => StepOutcome::Shifted { days },
        });
        Ok((self.settle(table, outcome)?, max_date))
    }

    /// Apply the failure policy to one table's result.
    fn settle(&self, table: &TableIdentifier, result: Result<StepOutcome>) -> Result<StepOutcome> {
        match result {
            Ok(outcome) => Ok(outcome),
            Err(DateShiftError::EmptyColumnSet(_)) => {
                error!(%table, "no columns provided for table");
                Ok(StepOutcome::Skipped {
                    reason: "no temporal columns".to_string(),
                })
            }
            Err(err) if self.config.failure_policy == FailurePolicy::Continue => {
                error!(
                    %table,
                    statement = err.statement().unwrap_or_default(),
                    error = %err,
                    "table update failed, skipping table"
                );
                Ok(StepOutcome::Failed {
                    error: err.to_string(),
                })
            }
            Err(err) => Err(err),
        }
    }

    fn advance(&mut self, next: RunState) {
        debug!(from = ?self.state, to = ?next, "run state");
        self.state = next;
    }
}
