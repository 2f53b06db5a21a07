use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::Appointment;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConflictReason {
    NonWorkingDay,
    StaffNotWorkingHours,
    AppointmentOverlap,
}

impl ConflictReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictReason::NonWorkingDay => "non_working_day",
            ConflictReason::StaffNotWorkingHours => "staff_not_working_hours",
            ConflictReason::AppointmentOverlap => "appointment_overlap",
        }
    }
}

/// Why an occurrence cannot be placed. Only overlaps carry the blocking appointment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConflictReport {
    pub occurrence_date: NaiveDate,
    pub reason: ConflictReason,
    pub conflicting_appointment: Option<Appointment>,
}

impl ConflictReport {
    pub fn non_working_day(date: NaiveDate) -> Self {
        Self {
            occurrence_date: date,
            reason: ConflictReason::NonWorkingDay,
            conflicting_appointment: None,
        }
    }

    pub fn outside_hours(date: NaiveDate) -> Self {
        Self {
            occurrence_date: date,
            reason: ConflictReason::StaffNotWorkingHours,
            conflicting_appointment: None,
        }
    }

    pub fn overlap(date: NaiveDate, with: Appointment) -> Self {
        Self {
            occurrence_date: date,
            reason: ConflictReason::AppointmentOverlap,
            conflicting_appointment: Some(with),
        }
    }
}
