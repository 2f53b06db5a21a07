pub mod appointment;
pub mod client;
pub mod conflict;
pub mod recurrence;
pub mod service;
pub mod staff;

pub use appointment::{Appointment, AppointmentStatus};
pub use client::Client;
pub use conflict::{ConflictReason, ConflictReport};
pub use recurrence::{RecurrencePattern, RecurrenceUnit, TotalSpan};
pub use service::{Service, ServiceDuration};
pub use staff::{DaySchedule, Staff};
