pub mod availability;
pub mod booking_flow;
pub mod calendar;
pub mod conflict;
pub mod duration;
pub mod recurrence;
pub mod repository;
pub mod snapshot;
pub mod time;
