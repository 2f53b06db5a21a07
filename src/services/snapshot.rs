use std::sync::atomic::{AtomicU64, Ordering};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::models::Appointment;

/// Inclusive range of calendar days.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Self {
        Self { from, to }
    }

    pub fn day(date: NaiveDate) -> Self {
        Self { from: date, to: date }
    }

    /// Smallest range covering every date, or `None` for an empty list.
    pub fn spanning(dates: &[NaiveDate]) -> Option<Self> {
        let from = dates.iter().min()?;
        let to = dates.iter().max()?;
        Some(Self::new(*from, *to))
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.from && date <= self.to
    }

    pub fn covers(&self, other: &DateRange) -> bool {
        self.contains(other.from) && self.contains(other.to)
    }
}

/// In-memory copy of appointments used for optimistic conflict checks.
/// `version` is the store version the copy was read at.
#[derive(Debug, Clone, Serialize)]
pub struct AppointmentSnapshot {
    pub version: u64,
    pub range: DateRange,
    pub appointments: Vec<Appointment>,
}

impl AppointmentSnapshot {
    pub fn empty(range: DateRange) -> Self {
        Self {
            version: 0,
            range,
            appointments: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

#[derive(Debug, Clone, Serialize)]
pub struct SnapshotEvent {
    pub version: u64,
    pub kind: ChangeKind,
    pub appointment_id: String,
    pub staff_id: String,
    pub date: NaiveDate,
}

/// Version counter plus broadcast of every write, so holders of a snapshot
/// can tell it went stale.
pub struct SnapshotNotifier {
    version: AtomicU64,
    tx: broadcast::Sender<SnapshotEvent>,
}

impl SnapshotNotifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(256);
        Self {
            version: AtomicU64::new(0),
            tx,
        }
    }

    pub fn current(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SnapshotEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, kind: ChangeKind, appointment: &Appointment) -> u64 {
        let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        let event = SnapshotEvent {
            version,
            kind,
            appointment_id: appointment.id.clone(),
            staff_id: appointment.staff_id.clone(),
            date: appointment.date,
        };
        // No subscribers is fine.
        let _ = self.tx.send(event);
        version
    }
}

impl Default for SnapshotNotifier {
    fn default() -> Self {
        Self::new()
    }
}
