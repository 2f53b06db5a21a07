use chrono::{Days, Months, NaiveDate};

use crate::errors::ScheduleError;
use crate::models::{RecurrencePattern, RecurrenceUnit};

pub const MAX_OCCURRENCES: usize = 1000;

/// Concrete occurrence dates for a booking anchored at `anchor`, ascending.
///
/// Each occurrence is stepped from the anchor itself rather than from the
/// previous occurrence, so a monthly series on the 31st lands on the 31st
/// whenever the month has one and on the month's last day otherwise.
pub fn generate_occurrences(
    anchor: NaiveDate,
    pattern: Option<&RecurrencePattern>,
) -> Result<Vec<NaiveDate>, ScheduleError> {
    let Some(pattern) = pattern else {
        return Ok(vec![anchor]);
    };
    if pattern.interval == 0 {
        return Err(ScheduleError::InvalidRecurrenceInterval);
    }

    let too_large = ScheduleError::RecurrenceTooLarge(MAX_OCCURRENCES);
    let last = pattern.total_span.end_from(anchor).ok_or(too_large.clone())?;

    let mut dates = Vec::new();
    for step in 0u32.. {
        // Steps only move forward and `last` is a real date, so running off
        // the calendar means this step is already past the end.
        let Some(date) = nth_occurrence(anchor, pattern, step) else {
            break;
        };
        if date > last {
            break;
        }
        if dates.len() == MAX_OCCURRENCES {
            return Err(too_large);
        }
        debug_assert!(dates.last().map_or(true, |prev| *prev < date));
        dates.push(date);
    }

    tracing::debug!(
        anchor = %anchor,
        unit = ?pattern.unit,
        interval = pattern.interval,
        span = %pattern.total_span,
        count = dates.len(),
        "generated occurrences"
    );
    Ok(dates)
}

fn nth_occurrence(anchor: NaiveDate, pattern: &RecurrencePattern, step: u32) -> Option<NaiveDate> {
    let units = step.checked_mul(pattern.interval)?;
    match pattern.unit {
        RecurrenceUnit::Day => anchor.checked_add_days(Days::new(u64::from(units))),
        RecurrenceUnit::Week => anchor.checked_add_days(Days::new(u64::from(units) * 7)),
        RecurrenceUnit::Month => anchor.checked_add_months(Months::new(units)),
    }
}
