use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: String,
    pub date: NaiveDate,
    /// "HH:MM"
    pub start: String,
    /// "HH:MM", may overflow past "24:00" for late services.
    pub end: String,
    pub staff_id: String,
    pub client_id: String,
    pub service_id: String,
    pub status: AppointmentStatus,
    pub price_cents: i64,
    pub duration_minutes: u32,
    pub series_id: Option<String>,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Appointment {
    /// Same booking as `other`: date, start, staff, client and service all match.
    pub fn is_duplicate_of(&self, other: &Appointment) -> bool {
        self.date == other.date
            && self.start == other.start
            && self.staff_id == other.staff_id
            && self.client_id == other.client_id
            && self.service_id == other.service_id
    }

    pub fn blocks_calendar(&self) -> bool {
        self.status != AppointmentStatus::Cancelled
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Cancelled,
    Completed,
    NoShow,
    Lost,
    Recovered,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::NoShow => "no_show",
            AppointmentStatus::Lost => "lost",
            AppointmentStatus::Recovered => "recovered",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "cancelled" => AppointmentStatus::Cancelled,
            "completed" => AppointmentStatus::Completed,
            "no_show" => AppointmentStatus::NoShow,
            "lost" => AppointmentStatus::Lost,
            "recovered" => AppointmentStatus::Recovered,
            _ => AppointmentStatus::Scheduled,
        }
    }
}
