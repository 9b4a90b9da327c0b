//! Retention window expressions.

use chrono::{Months, NaiveDate};
use serde::Serialize;

pub const CURRENT_DATE: &str = "CURRENT_DATE()";

/// A `[start, end]` window of `months_back` months ending today.
///
/// The SQL bounds are opaque text handed to the template; the warehouse
/// evaluates them at query time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub months_back: u32,
    pub start_expr: String,
    pub end_expr: String,
}

impl DateRange {
    pub fn months_back(months: u32) -> Self {
        let start_expr = if months == 0 {
            CURRENT_DATE.to_string()
        } else {
            format!("DATE_SUB({}, INTERVAL {} MONTH)", CURRENT_DATE, months)
        };
        Self {
            months_back: months,
            start_expr,
            end_expr: CURRENT_DATE.to_string(),
        }
    }

    /// Evaluate the window against a reference day.
    ///
    /// Month arithmetic clamps to the last day of the target month, the same
    /// way the warehouse does (`2024-03-31` minus one month is `2024-02-29`).
    pub fn evaluate(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        let start = today
            .checked_sub_months(Months::new(self.months_back))
            .unwrap_or(NaiveDate::MIN);
        (start, today)
    }
}
