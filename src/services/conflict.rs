use chrono::NaiveDate;

use crate::errors::ScheduleError;
use crate::models::{Appointment, ConflictReport, RecurrencePattern, Staff};
use crate::services::availability::{is_within_working_hours, is_working_day};
use crate::services::recurrence::generate_occurrences;
use crate::services::time::{intervals_overlap, parse_end_time, parse_time};

/// A slot being considered for one staff member on one date.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Set when re-checking an existing appointment so it never collides with itself.
    pub id: Option<String>,
    pub date: NaiveDate,
    pub start: String,
    pub end: String,
    pub staff_id: String,
}

impl Candidate {
    pub fn new(date: NaiveDate, start: &str, end: &str, staff_id: &str) -> Self {
        Self {
            id: None,
            date,
            start: start.to_string(),
            end: end.to_string(),
            staff_id: staff_id.to_string(),
        }
    }
}

/// Outcome of checking a whole series, with the dates that were checked.
#[derive(Debug, Clone)]
pub struct SeriesPlan {
    pub occurrences: Vec<NaiveDate>,
    pub conflict: Option<ConflictReport>,
}

/// Checks, in order: working day, working hours, overlap with a live appointment.
/// The first failing check decides the reason.
pub fn check_single_slot(
    candidate: &Candidate,
    existing: &[Appointment],
    staff: &Staff,
) -> Result<Option<ConflictReport>, ScheduleError> {
    let start = parse_time(&candidate.start)?;
    let end = parse_end_time(&candidate.end)?;

    if !is_working_day(staff, candidate.date) {
        return Ok(Some(ConflictReport::non_working_day(candidate.date)));
    }
    if !is_within_working_hours(staff, candidate.date, &candidate.start, &candidate.end)? {
        return Ok(Some(ConflictReport::outside_hours(candidate.date)));
    }

    let same_day = existing.iter().filter(|a| {
        a.staff_id == candidate.staff_id
            && a.date == candidate.date
            && a.blocks_calendar()
            && candidate.id.as_deref() != Some(a.id.as_str())
    });

    for appointment in same_day {
        let (Ok(other_start), Ok(other_end)) =
            (parse_time(&appointment.start), parse_end_time(&appointment.end))
        else {
            tracing::warn!(
                appointment_id = %appointment.id,
                start = %appointment.start,
                end = %appointment.end,
                "skipping appointment with unreadable times"
            );
            continue;
        };
        if intervals_overlap(start, end, other_start, other_end) {
            return Ok(Some(ConflictReport::overlap(candidate.date, appointment.clone())));
        }
    }

    Ok(None)
}

/// Checks every occurrence of the series and returns the first conflict.
pub fn check_series(
    anchor: NaiveDate,
    pattern: Option<&RecurrencePattern>,
    existing: &[Appointment],
    start: &str,
    end: &str,
    staff: &Staff,
) -> Result<Option<ConflictReport>, ScheduleError> {
    Ok(plan_series(anchor, pattern, existing, start, end, staff)?.conflict)
}

pub fn plan_series(
    anchor: NaiveDate,
    pattern: Option<&RecurrencePattern>,
    existing: &[Appointment],
    start: &str,
    end: &str,
    staff: &Staff,
) -> Result<SeriesPlan, ScheduleError> {
    let occurrences = generate_occurrences(anchor, pattern)?;

    // Labels are validated up front so a bad time fails the whole series,
    // not just the first occurrence that reaches the overlap scan.
    parse_time(start)?;
    parse_end_time(end)?;

    for (index, date) in occurrences.iter().enumerate() {
        let candidate = Candidate::new(*date, start, end, &staff.id);
        if let Some(report) = check_single_slot(&candidate, existing, staff)? {
            tracing::info!(
                staff_id = %staff.id,
                occurrence = index + 1,
                of = occurrences.len(),
                date = %date,
                reason = report.reason.as_str(),
                "series blocked"
            );
            return Ok(SeriesPlan {
                occurrences,
                conflict: Some(report),
            });
        }
    }

    Ok(SeriesPlan {
        occurrences,
        conflict: None,
    })
}
