use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

use crate::schema::TableIdentifier;

/// Result of one pass over one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    Shifted { days: i64 },
    Unchanged,
    Skipped { reason: String },
    Failed { error: String },
}

impl StepOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shifted { days } => write!(f, "shifted {:+} day(s)", days),
            Self::Unchanged => write!(f, "unchanged"),
            Self::Skipped { reason } => write!(f, "skipped ({})", reason),
            Self::Failed { error } => write!(f, "failed ({})", error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableReport {
    pub table: TableIdentifier,
    pub columns: Vec<String>,
    pub pass1: StepOutcome,
    pub pass2: StepOutcome,
    /// Latest date seen by the corrector, before any correction
    pub max_date_after_pass1: Option<NaiveDate>,
}

impl TableReport {
    pub fn was_corrected(&self) -> bool {
        matches!(self.pass2, StepOutcome::Shifted { .. })
    }
}

/// Everything a completed run did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub anchor_date: NaiveDate,
    pub today: NaiveDate,
    pub global_offset: i64,
    pub tables: Vec<TableReport>,
}

impl RunReport {
    pub fn table(&self, table: &TableIdentifier) -> Option<&TableReport> {
        self.tables.iter().find(|t| &t.table == table)
    }

    pub fn failed_tables(&self) -> impl Iterator<Item = &TableReport> {
        self.tables
            .iter()
            .filter(|t| t.pass1.is_failure() || t.pass2.is_failure())
    }

    pub fn corrected_tables(&self) -> impl Iterator<Item = &TableReport> {
        self.tables.iter().filter(|t| t.was_corrected())
    }

    pub fn has_failures(&self) -> bool {
        self.failed_tables().next().is_some()
    }

    pub fn summary(&self) -> String {
        let mut out = format!(
            "anchor date {}, today {}, global offset {:+} day(s)\n",
            self.anchor_date, self.today, self.global_offset
        );
        out.push_str(&format!(
            "{} table(s): {} corrected, {} failed\n",
            self.tables.len(),
            self.corrected_tables().count(),
            self.failed_tables().count()
        ));
        for table in &self.tables {
            out.push_str(&format!(
                "  {}: pass 1 {}, pass 2 {}\n",
                table.table, table.pass1, table.pass2
            ));
        }
        out
    }
}
