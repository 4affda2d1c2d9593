use chrono::NaiveDate;

/// Signed number of days from `reference` to `today`.
///
/// Positive when `reference` lies in the past.
pub fn days_between(reference: NaiveDate, today: NaiveDate) -> i64 {
    today.signed_duration_since(reference).num_days()
}
