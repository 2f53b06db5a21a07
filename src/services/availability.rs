use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use serde::Serialize;

use crate::errors::ScheduleError;
use crate::models::Staff;
use crate::services::time::{parse_end_time, parse_time};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LiveStatus {
    Available,
    Offline,
}

/// Staff with no entry for the weekday are treated as working so an
/// unconfigured schedule never hides them.
pub fn is_working_day(staff: &Staff, date: NaiveDate) -> bool {
    staff
        .schedule_for(date.weekday())
        .map(|s| s.active)
        .unwrap_or(true)
}

/// `[start, end)` must sit inside the day's `[start_time, end_time)` window.
pub fn is_within_working_hours(
    staff: &Staff,
    date: NaiveDate,
    start: &str,
    end: &str,
) -> Result<bool, ScheduleError> {
    if !is_working_day(staff, date) {
        return Ok(false);
    }

    let start = parse_time(start)?;
    let end = parse_end_time(end)?;

    let Some(schedule) = staff.schedule_for(date.weekday()) else {
        return Ok(true);
    };
    let open = parse_time(&schedule.start_time)?;
    let close = parse_end_time(&schedule.end_time)?;

    Ok(start >= open && end <= close && start < end)
}

/// Clock-based status for calendar display. Booking decisions never use this.
pub fn current_live_status(staff: &Staff, now: NaiveDateTime) -> LiveStatus {
    let date = now.date();
    if !is_working_day(staff, date) {
        return LiveStatus::Offline;
    }

    let Some(schedule) = staff.schedule_for(date.weekday()) else {
        return LiveStatus::Available;
    };
    let minute = now.hour() * 60 + now.minute();
    match (parse_time(&schedule.start_time), parse_end_time(&schedule.end_time)) {
        (Ok(open), Ok(close)) if minute >= open && minute < close => LiveStatus::Available,
        _ => LiveStatus::Offline,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn dana() -> Staff {
        let mut staff = Staff::new("dana", "Dana");
        for day in [Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri] {
            staff = staff.with_day(day, "09:00", "17:00");
        }
        staff.with_day_off(Weekday::Sat).with_day_off(Weekday::Sun)
    }

    #[test]
    fn test_working_day_follows_active_flag() {
        // 2024-03-04 is a Monday, 2024-03-10 a Sunday
        assert!(is_working_day(&dana(), date("2024-03-04")));
        assert!(!is_working_day(&dana(), date("2024-03-10")));
    }

    #[test]
    fn test_missing_entry_counts_as_working() {
        let staff = Staff::new("new", "New Hire");
        assert!(is_working_day(&staff, date("2024-03-10")));
        assert!(is_within_working_hours(&staff, date("2024-03-10"), "22:00", "23:00").unwrap());
    }

    #[test]
    fn test_within_hours_inclusive_bounds() {
        let monday = date("2024-03-04");
        assert!(is_within_working_hours(&dana(), monday, "09:00", "10:00").unwrap());
        assert!(is_within_working_hours(&dana(), monday, "16:00", "17:00").unwrap());
    }

    #[test]
    fn test_outside_hours() {
        let monday = date("2024-03-04");
        assert!(!is_within_working_hours(&dana(), monday, "08:30", "09:30").unwrap());
        assert!(!is_within_working_hours(&dana(), monday, "16:30", "17:30").unwrap());
        assert!(!is_within_working_hours(&dana(), monday, "23:30", "24:30").unwrap());
    }

    #[test]
    fn test_midnight_close_is_honoured() {
        let staff = Staff::new("late", "Late").with_day(Weekday::Fri, "18:00", "24:00");
        staff.validate().unwrap();
        // 2024-03-08 is a Friday
        assert!(is_within_working_hours(&staff, date("2024-03-08"), "23:30", "24:00").unwrap());
        assert!(!is_within_working_hours(&staff, date("2024-03-08"), "23:30", "24:30").unwrap());
    }

    #[test]
    fn test_non_working_day_is_outside_hours() {
        assert!(!is_within_working_hours(&dana(), date("2024-03-10"), "10:00", "11:00").unwrap());
    }

    #[test]
    fn test_bad_label_is_an_error() {
        assert!(is_within_working_hours(&dana(), date("2024-03-04"), "10am", "11:00").is_err());
    }

    #[test]
    fn test_live_status() {
        assert_eq!(current_live_status(&dana(), dt("2024-03-04 10:00")), LiveStatus::Available);
        assert_eq!(current_live_status(&dana(), dt("2024-03-04 17:00")), LiveStatus::Offline);
        assert_eq!(current_live_status(&dana(), dt("2024-03-04 08:59")), LiveStatus::Offline);
        assert_eq!(current_live_status(&dana(), dt("2024-03-10 10:00")), LiveStatus::Offline);
    }
}
