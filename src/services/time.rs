use crate::errors::ScheduleError;

const MINUTES_PER_DAY: u32 = 24 * 60;

/// Parses "HH:MM" (or "H:MM") into minutes since midnight, within [00:00, 24:00).
pub fn parse_time(label: &str) -> Result<u32, ScheduleError> {
    let minutes = parse_clock_label(label)?;
    if minutes >= MINUTES_PER_DAY {
        return Err(ScheduleError::InvalidTimeFormat(label.to_string()));
    }
    Ok(minutes)
}

/// Like [`parse_time`] but also accepts the overflow labels `compute_end_time`
/// produces for services running past midnight ("24:30").
pub fn parse_end_time(label: &str) -> Result<u32, ScheduleError> {
    let minutes = parse_clock_label(label)?;
    if minutes >= 2 * MINUTES_PER_DAY {
        return Err(ScheduleError::InvalidTimeFormat(label.to_string()));
    }
    Ok(minutes)
}

fn parse_clock_label(label: &str) -> Result<u32, ScheduleError> {
    let invalid = || ScheduleError::InvalidTimeFormat(label.to_string());

    let (hours, minutes) = label.trim().split_once(':').ok_or_else(invalid)?;
    if hours.is_empty() || hours.len() > 2 || minutes.len() != 2 {
        return Err(invalid());
    }
    if !hours.bytes().chain(minutes.bytes()).all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    let hours: u32 = hours.parse().map_err(|_| invalid())?;
    let minutes: u32 = minutes.parse().map_err(|_| invalid())?;
    if minutes > 59 {
        return Err(invalid());
    }
    Ok(hours * 60 + minutes)
}

pub fn format_time(minutes: u32) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

/// End label for a service of `duration_minutes` starting at `start`.
/// Does not forbid running past midnight; callers validate against working hours.
pub fn compute_end_time(start: &str, duration_minutes: i64) -> Result<String, ScheduleError> {
    if duration_minutes <= 0 {
        return Err(ScheduleError::InvalidDuration(duration_minutes));
    }
    let start = parse_time(start)?;
    let duration = u32::try_from(duration_minutes)
        .ok()
        .filter(|d| *d < MINUTES_PER_DAY)
        .ok_or(ScheduleError::InvalidDuration(duration_minutes))?;
    Ok(format_time(start + duration))
}

/// Half-open `[start_a, end_a)` vs `[start_b, end_b)`. Back-to-back ranges do not overlap.
pub fn intervals_overlap(start_a: u32, end_a: u32, start_b: u32, end_b: u32) -> bool {
    start_a < end_b && start_b < end_a
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(label: &str) -> u32 {
        parse_time(label).unwrap()
    }

    #[test]
    fn test_parse_valid_times() {
        assert_eq!(t("00:00"), 0);
        assert_eq!(t("09:05"), 545);
        assert_eq!(t("9:05"), 545);
        assert_eq!(t("23:59"), 1439);
    }

    #[test]
    fn test_parse_invalid_times() {
        for label in ["24:00", "12:60", "1230", "ab:cd", "", "12:5", "-1:00", "12:00:00", "123:00"] {
            assert_eq!(
                parse_time(label),
                Err(ScheduleError::InvalidTimeFormat(label.to_string())),
                "{label}"
            );
        }
    }

    #[test]
    fn test_parse_end_time_accepts_overflow() {
        assert_eq!(parse_end_time("24:30").unwrap(), 1470);
        assert!(parse_end_time("48:00").is_err());
    }

    #[test]
    fn test_format_zero_pads() {
        assert_eq!(format_time(0), "00:00");
        assert_eq!(format_time(545), "09:05");
        assert_eq!(format_time(t("17:30")), "17:30");
    }

    #[test]
    fn test_compute_end_time() {
        assert_eq!(compute_end_time("10:15", 30).unwrap(), "10:45");
        assert_eq!(compute_end_time("09:00", 90).unwrap(), "10:30");
        assert_eq!(compute_end_time("23:30", 60).unwrap(), "24:30");
    }

    #[test]
    fn test_compute_end_time_rejects_non_positive() {
        assert_eq!(compute_end_time("10:00", 0), Err(ScheduleError::InvalidDuration(0)));
        assert_eq!(compute_end_time("10:00", -15), Err(ScheduleError::InvalidDuration(-15)));
    }

    #[test]
    fn test_compute_end_time_rejects_bad_start() {
        assert!(matches!(
            compute_end_time("25:00", 30),
            Err(ScheduleError::InvalidTimeFormat(_))
        ));
    }

    #[test]
    fn test_adjacent_intervals_do_not_overlap() {
        assert!(!intervals_overlap(t("10:00"), t("11:00"), t("11:00"), t("12:00")));
        assert!(!intervals_overlap(t("11:00"), t("12:00"), t("10:00"), t("11:00")));
    }

    #[test]
    fn test_containment_overlaps() {
        assert!(intervals_overlap(t("09:00"), t("17:00"), t("10:00"), t("10:30")));
        assert!(intervals_overlap(t("10:00"), t("10:30"), t("09:00"), t("17:00")));
    }

    #[test]
    fn test_partial_overlap() {
        assert!(intervals_overlap(t("10:00"), t("10:30"), t("10:15"), t("10:45")));
    }

    #[test]
    fn test_overlap_is_symmetric() {
        let points = [0, 30, 60, 90, 120];
        for &a in &points {
            for &b in &points {
                for &c in &points {
                    for &d in &points {
                        assert_eq!(intervals_overlap(a, b, c, d), intervals_overlap(c, d, a, b));
                    }
                }
            }
        }
    }
}
