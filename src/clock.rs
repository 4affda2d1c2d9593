use chrono::{Local, NaiveDate};

/// Source of "today" for a run.
pub trait Clock {
    fn today(&self) -> NaiveDate;
}

/// Local calendar date of the machine running the refresh.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}
