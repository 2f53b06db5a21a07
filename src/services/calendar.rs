use chrono::NaiveDateTime;

use crate::models::Appointment;
use crate::services::time::parse_end_time;

const ICS_FMT: &str = "%Y%m%dT%H%M%S";

/// Single-event iCalendar export for an appointment, in business-local time.
pub fn generate_ics(appointment: &Appointment, business_name: &str, service_name: &str) -> String {
    let start = local_datetime(appointment, &appointment.start);
    let end = local_datetime(appointment, &appointment.end);
    let dtstart = start.format(ICS_FMT).to_string();
    let dtend = end.format(ICS_FMT).to_string();
    let dtstamp = appointment.created_at.format(ICS_FMT).to_string();
    let uid = format!("{}@salonbook", appointment.id);
    let summary = escape_text(&format!("{service_name} at {business_name}"));
    let description = escape_text(appointment.notes.as_deref().unwrap_or("No additional notes"));

    format!(
        "BEGIN:VCALENDAR\r\n\
         VERSION:2.0\r\n\
         PRODID:-//Salonbook//Appointments//EN\r\n\
         BEGIN:VEVENT\r\n\
         UID:{uid}\r\n\
         DTSTAMP:{dtstamp}\r\n\
         DTSTART:{dtstart}\r\n\
         DTEND:{dtend}\r\n\
         SUMMARY:{summary}\r\n\
         DESCRIPTION:{description}\r\n\
         END:VEVENT\r\n\
         END:VCALENDAR\r\n"
    )
}

/// TEXT value escaping from RFC 5545 section 3.3.11.
fn escape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.replace("\r\n", "\n").chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            ';' => out.push_str("\\;"),
            ',' => out.push_str("\\,"),
            '\n' | '\r' => out.push_str("\\n"),
            other => out.push(other),
        }
    }
    out
}

/// Overflow labels ("24:30") roll onto the next day.
fn local_datetime(appointment: &Appointment, label: &str) -> NaiveDateTime {
    let minutes = parse_end_time(label).unwrap_or(0);
    appointment.date.and_hms_opt(0, 0, 0).unwrap_or_default()
        + chrono::Duration::minutes(i64::from(minutes))
}
