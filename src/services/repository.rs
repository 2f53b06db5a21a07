use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::Connection;

use crate::db::{self, queries};
use crate::errors::RepositoryError;
use crate::models::Appointment;
use crate::services::snapshot::{
    AppointmentSnapshot, ChangeKind, DateRange, SnapshotEvent, SnapshotNotifier,
};
use crate::services::time::{intervals_overlap, parse_end_time, parse_time};

/// Persistence collaborator for appointments. `create` and `update` are the
/// authoritative conflict arbiter: they reject a write that would overlap a
/// live appointment even if the caller's snapshot said the slot was free.
#[async_trait]
pub trait AppointmentRepository: Send + Sync {
    async fn load(
        &self,
        range: DateRange,
        staff_id: Option<&str>,
    ) -> Result<AppointmentSnapshot, RepositoryError>;

    async fn create(&self, appointment: Appointment) -> Result<Appointment, RepositoryError>;

    async fn update(&self, appointment: Appointment) -> Result<Appointment, RepositoryError>;

    async fn delete(&self, id: &str) -> Result<bool, RepositoryError>;

    /// Current store version; a snapshot with a lower version is stale.
    fn version(&self) -> u64;

    fn subscribe(&self) -> tokio::sync::broadcast::Receiver<SnapshotEvent>;
}

pub struct SqliteAppointmentRepository {
    db: Arc<Mutex<Connection>>,
    notifier: SnapshotNotifier,
}

impl SqliteAppointmentRepository {
    pub fn new(db: Arc<Mutex<Connection>>) -> Self {
        Self {
            db,
            notifier: SnapshotNotifier::new(),
        }
    }
}

/// First live appointment for the same staff and day overlapping `candidate`.
fn find_overlap(conn: &Connection, candidate: &Appointment) -> anyhow::Result<Option<Appointment>> {
    if !candidate.blocks_calendar() {
        return Ok(None);
    }
    let start = parse_time(&candidate.start)?;
    let end = parse_end_time(&candidate.end)?;

    let same_day = queries::get_live_appointments_for_day(conn, &candidate.staff_id, candidate.date)?;
    Ok(same_day.into_iter().find(|other| {
        other.id != candidate.id
            && match (parse_time(&other.start), parse_end_time(&other.end)) {
                (Ok(s), Ok(e)) => intervals_overlap(start, end, s, e),
                _ => false,
            }
    }))
}

#[async_trait]
impl AppointmentRepository for SqliteAppointmentRepository {
    async fn load(
        &self,
        range: DateRange,
        staff_id: Option<&str>,
    ) -> Result<AppointmentSnapshot, RepositoryError> {
        let conn = db::lock(&self.db)?;
        // Read the version under the lock so it matches the rows returned.
        let version = self.notifier.current();
        let appointments = queries::get_appointments_in_range(&conn, range.from, range.to, staff_id)?;
        Ok(AppointmentSnapshot {
            version,
            range,
            appointments,
        })
    }

    async fn create(&self, appointment: Appointment) -> Result<Appointment, RepositoryError> {
        {
            let conn = db::lock(&self.db)?;
            if let Some(conflicting) = find_overlap(&conn, &appointment)? {
                tracing::warn!(
                    appointment_id = %appointment.id,
                    conflicting_id = %conflicting.id,
                    staff_id = %appointment.staff_id,
                    date = %appointment.date,
                    "rejected create: slot taken"
                );
                return Err(RepositoryError::SlotTaken {
                    conflicting: Box::new(conflicting),
                });
            }
            queries::create_appointment(&conn, &appointment)?;
            self.notifier.publish(ChangeKind::Created, &appointment);
        }
        tracing::info!(
            appointment_id = %appointment.id,
            staff_id = %appointment.staff_id,
            date = %appointment.date,
            start = %appointment.start,
            "appointment created"
        );
        Ok(appointment)
    }

    async fn update(&self, mut appointment: Appointment) -> Result<Appointment, RepositoryError> {
        appointment.updated_at = chrono::Utc::now().naive_utc();
        let conn = db::lock(&self.db)?;
        if let Some(conflicting) = find_overlap(&conn, &appointment)? {
            return Err(RepositoryError::SlotTaken {
                conflicting: Box::new(conflicting),
            });
        }
        if !queries::update_appointment(&conn, &appointment)? {
            return Err(RepositoryError::NotFound(appointment.id));
        }
        self.notifier.publish(ChangeKind::Updated, &appointment);
        Ok(appointment)
    }

    async fn delete(&self, id: &str) -> Result<bool, RepositoryError> {
        let conn = db::lock(&self.db)?;
        let Some(existing) = queries::get_appointment_by_id(&conn, id)? else {
            return Ok(false);
        };
        let deleted = queries::delete_appointment(&conn, id)?;
        if deleted {
            self.notifier.publish(ChangeKind::Deleted, &existing);
        }
        Ok(deleted)
    }

    fn version(&self) -> u64 {
        self.notifier.current()
    }

    fn subscribe(&self) -> tokio::sync::broadcast::Receiver<SnapshotEvent> {
        self.notifier.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AppointmentStatus;
    use chrono::NaiveDate;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn repo() -> SqliteAppointmentRepository {
        let conn = db::init_db(":memory:").unwrap();
        SqliteAppointmentRepository::new(Arc::new(Mutex::new(conn)))
    }

    fn appointment(id: &str, start: &str, end: &str) -> Appointment {
        let now = chrono::Utc::now().naive_utc();
        Appointment {
            id: id.to_string(),
            date: date("2024-03-04"),
            start: start.to_string(),
            end: end.to_string(),
            staff_id: "dana".to_string(),
            client_id: "c1".to_string(),
            service_id: "cut".to_string(),
            status: AppointmentStatus::Scheduled,
            price_cents: 2500,
            duration_minutes: 30,
            series_id: None,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_create_bumps_version_and_notifies() {
        let repo = repo();
        let mut rx = repo.subscribe();
        assert_eq!(repo.version(), 0);

        repo.create(appointment("a1", "10:00", "10:30")).await.unwrap();
        assert_eq!(repo.version(), 1);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.version, 1);
        assert_eq!(event.kind, ChangeKind::Created);
        assert_eq!(event.appointment_id, "a1");
    }

    #[tokio::test]
    async fn test_create_rejects_overlap() {
        let repo = repo();
        repo.create(appointment("a1", "10:00", "10:30")).await.unwrap();

        let err = repo.create(appointment("a2", "10:15", "10:45")).await.unwrap_err();
        match err {
            RepositoryError::SlotTaken { conflicting } => assert_eq!(conflicting.id, "a1"),
            other => panic!("expected SlotTaken, got {other:?}"),
        }
        assert_eq!(repo.version(), 1);

        repo.create(appointment("a3", "10:30", "11:00")).await.unwrap();
    }

    #[tokio::test]
    async fn test_cancelled_appointment_frees_slot() {
        let repo = repo();
        let created = repo.create(appointment("a1", "10:00", "10:30")).await.unwrap();

        let mut cancelled = created;
        cancelled.status = AppointmentStatus::Cancelled;
        repo.update(cancelled).await.unwrap();

        repo.create(appointment("a2", "10:00", "10:30")).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let repo = repo();
        let err = repo.update(appointment("ghost", "10:00", "10:30")).await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound(id) if id == "ghost"));
    }

    #[tokio::test]
    async fn test_load_and_delete() {
        let repo = repo();
        repo.create(appointment("a1", "10:00", "10:30")).await.unwrap();

        let snapshot = repo.load(DateRange::day(date("2024-03-04")), Some("dana")).await.unwrap();
        assert_eq!(snapshot.version, 1);
        assert_eq!(snapshot.appointments.len(), 1);

        assert!(repo.delete("a1").await.unwrap());
        assert!(!repo.delete("a1").await.unwrap());
        assert_eq!(repo.version(), 2);

        let snapshot = repo.load(DateRange::day(date("2024-03-04")), None).await.unwrap();
        assert!(snapshot.appointments.is_empty());
    }
}
