use chrono::{NaiveDate, Utc};
use serde::Serialize;

use crate::errors::{FlowError, RepositoryError, ScheduleError};
use crate::models::{
    Appointment, AppointmentStatus, ConflictReport, RecurrencePattern, Service, Staff,
};
use crate::services::conflict::plan_series;
use crate::services::duration::parse_service_duration;
use crate::services::recurrence::generate_occurrences;
use crate::services::repository::AppointmentRepository;
use crate::services::snapshot::{AppointmentSnapshot, DateRange};
use crate::services::time::compute_end_time;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum FlowState {
    Idle,
    SelectingClient,
    SelectingService,
    SelectingSlot,
    SelectingRecurrence,
    ReviewingConflict(ConflictReport),
    Confirmed(Vec<Appointment>),
}

impl FlowState {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowState::Idle => "idle",
            FlowState::SelectingClient => "selecting_client",
            FlowState::SelectingService => "selecting_service",
            FlowState::SelectingSlot => "selecting_slot",
            FlowState::SelectingRecurrence => "selecting_recurrence",
            FlowState::ReviewingConflict(_) => "reviewing_conflict",
            FlowState::Confirmed(_) => "confirmed",
        }
    }

    fn is_selecting(&self) -> bool {
        !matches!(self, FlowState::Idle | FlowState::Confirmed(_))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SelectedService {
    pub service: Service,
    pub duration_minutes: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SlotSelection {
    pub date: NaiveDate,
    pub start: String,
    pub end: String,
    pub staff: Staff,
}

/// Choices made so far. Survives conflicts; cleared only by `cancel`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BookingDraft {
    pub client_id: Option<String>,
    pub service: Option<SelectedService>,
    pub slot: Option<SlotSelection>,
    pub recurrence: Option<RecurrencePattern>,
    pub notes: Option<String>,
}

impl BookingDraft {
    /// Whether `existing` is this draft's own booking (same staff, client,
    /// service and start) on some date, e.g. left behind by an earlier attempt.
    fn is_own_booking(&self, existing: &Appointment) -> bool {
        match (&self.client_id, &self.service, &self.slot) {
            (Some(client_id), Some(selected), Some(slot)) => {
                existing.blocks_calendar()
                    && existing.client_id == *client_id
                    && existing.service_id == selected.service.id
                    && existing.staff_id == slot.staff.id
                    && existing.start == slot.start
            }
            _ => false,
        }
    }
}

/// Result of writing a fully-checked series.
#[derive(Debug)]
pub enum CommitOutcome {
    /// Every occurrence is on the calendar; `created` of them were written now,
    /// the rest were already present.
    Committed {
        appointments: Vec<Appointment>,
        created: usize,
    },
    /// The store refused an occurrence. Nothing from this attempt remains.
    Rejected(ConflictReport),
}

/// Client → service → slot → recurrence → confirm.
#[derive(Debug, Clone, Serialize)]
pub struct BookingFlow {
    state: FlowState,
    draft: BookingDraft,
}

impl Default for BookingFlow {
    fn default() -> Self {
        Self::new()
    }
}

impl BookingFlow {
    pub fn new() -> Self {
        Self {
            state: FlowState::Idle,
            draft: BookingDraft::default(),
        }
    }

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    pub fn draft(&self) -> &BookingDraft {
        &self.draft
    }

    pub fn start(&mut self) -> Result<(), FlowError> {
        self.require_state("start", |s| matches!(s, FlowState::Idle))?;
        self.state = FlowState::SelectingClient;
        Ok(())
    }

    pub fn select_client(&mut self, client_id: &str) -> Result<(), FlowError> {
        self.require_state("select a client", FlowState::is_selecting)?;
        self.draft.client_id = Some(client_id.to_string());
        self.advance();
        Ok(())
    }

    /// Normalizes the service duration; a changed service re-times the chosen slot.
    pub fn select_service(&mut self, service: Service) -> Result<(), FlowError> {
        self.require_state("select a service", FlowState::is_selecting)?;
        if self.draft.client_id.is_none() {
            return Err(FlowError::MissingSelection("client"));
        }

        let duration_minutes = parse_service_duration(&service.duration)?;
        if let Some(slot) = self.draft.slot.as_mut() {
            slot.end = compute_end_time(&slot.start, i64::from(duration_minutes))?;
        }
        self.draft.service = Some(SelectedService {
            service,
            duration_minutes,
        });
        self.advance();
        Ok(())
    }

    pub fn select_slot(&mut self, date: NaiveDate, start: &str, staff: Staff) -> Result<(), FlowError> {
        self.require_state("select a slot", FlowState::is_selecting)?;
        if self.draft.client_id.is_none() {
            return Err(FlowError::MissingSelection("client"));
        }
        let Some(selected) = &self.draft.service else {
            return Err(FlowError::MissingSelection("service"));
        };

        let end = compute_end_time(start, i64::from(selected.duration_minutes))?;
        self.draft.slot = Some(SlotSelection {
            date,
            start: start.to_string(),
            end,
            staff,
        });
        self.advance();
        Ok(())
    }

    /// `None` books a single appointment.
    pub fn select_recurrence(&mut self, pattern: Option<RecurrencePattern>) -> Result<(), FlowError> {
        self.require_state("choose a recurrence", FlowState::is_selecting)?;
        if self.draft.slot.is_none() {
            return Err(FlowError::MissingSelection("slot"));
        }
        if pattern.as_ref().is_some_and(|p| p.interval == 0) {
            return Err(ScheduleError::InvalidRecurrenceInterval.into());
        }
        self.draft.recurrence = pattern;
        self.advance();
        Ok(())
    }

    pub fn set_notes(&mut self, notes: Option<String>) {
        self.draft.notes = notes;
    }

    /// Drops every selection and returns to idle.
    pub fn cancel(&mut self) {
        tracing::debug!(state = self.state.as_str(), "booking flow cancelled");
        self.state = FlowState::Idle;
        self.draft = BookingDraft::default();
    }

    /// Checks the whole series and, when clear, writes it through `repo`.
    ///
    /// A conflict, whether found locally or reported by the store, moves the
    /// flow to `ReviewingConflict` with all selections kept.
    pub async fn confirm(
        &mut self,
        snapshot: &AppointmentSnapshot,
        repo: &dyn AppointmentRepository,
    ) -> Result<&FlowState, FlowError> {
        self.require_state("confirm", |s| {
            matches!(s, FlowState::SelectingRecurrence | FlowState::ReviewingConflict(_))
        })?;
        let (Some(_), Some(_), Some(slot)) =
            (&self.draft.client_id, &self.draft.service, &self.draft.slot)
        else {
            return Err(FlowError::MissingSelection("slot"));
        };
        let recurrence = self.draft.recurrence.as_ref();

        let occurrences = generate_occurrences(slot.date, recurrence)?;
        let range = DateRange::spanning(&occurrences).unwrap_or(DateRange::day(slot.date));

        let fresh;
        let existing: &[Appointment] =
            if repo.version() != snapshot.version || !snapshot.range.covers(&range) {
                tracing::debug!(
                    snapshot_version = snapshot.version,
                    store_version = repo.version(),
                    "snapshot stale, reloading before commit"
                );
                fresh = repo.load(range, Some(slot.staff.id.as_str())).await?;
                &fresh.appointments
            } else {
                &snapshot.appointments
            };

        let blocking: Vec<Appointment> = existing
            .iter()
            .filter(|a| !self.draft.is_own_booking(a))
            .cloned()
            .collect();

        let plan = plan_series(slot.date, recurrence, &blocking, &slot.start, &slot.end, &slot.staff)?;
        if let Some(report) = plan.conflict {
            self.state = FlowState::ReviewingConflict(report);
            return Ok(&self.state);
        }

        let planned = self.materialize(&plan.occurrences);
        match commit_occurrences(repo, existing, planned).await? {
            CommitOutcome::Committed {
                appointments,
                created,
            } => {
                tracing::info!(
                    staff_id = %slot.staff.id,
                    occurrences = appointments.len(),
                    created,
                    "booking confirmed"
                );
                self.state = FlowState::Confirmed(appointments);
            }
            CommitOutcome::Rejected(report) => {
                self.state = FlowState::ReviewingConflict(report);
            }
        }
        Ok(&self.state)
    }

    fn materialize(&self, occurrences: &[NaiveDate]) -> Vec<Appointment> {
        let (Some(client_id), Some(selected), Some(slot)) =
            (&self.draft.client_id, &self.draft.service, &self.draft.slot)
        else {
            return Vec::new();
        };
        let series_id = self
            .draft
            .recurrence
            .as_ref()
            .map(|_| uuid::Uuid::new_v4().to_string());
        let now = Utc::now().naive_utc();

        occurrences
            .iter()
            .map(|date| Appointment {
                id: uuid::Uuid::new_v4().to_string(),
                date: *date,
                start: slot.start.clone(),
                end: slot.end.clone(),
                staff_id: slot.staff.id.clone(),
                client_id: client_id.clone(),
                service_id: selected.service.id.clone(),
                status: AppointmentStatus::Scheduled,
                price_cents: selected.service.price_cents,
                duration_minutes: selected.duration_minutes,
                series_id: series_id.clone(),
                notes: self.draft.notes.clone(),
                created_at: now,
                updated_at: now,
            })
            .collect()
    }

    /// Moves to the first step still missing a selection.
    fn advance(&mut self) {
        self.state = if self.draft.client_id.is_none() {
            FlowState::SelectingClient
        } else if self.draft.service.is_none() {
            FlowState::SelectingService
        } else if self.draft.slot.is_none() {
            FlowState::SelectingSlot
        } else {
            FlowState::SelectingRecurrence
        };
    }

    fn require_state(
        &self,
        action: &'static str,
        allowed: impl Fn(&FlowState) -> bool,
    ) -> Result<(), FlowError> {
        if allowed(&self.state) {
            Ok(())
        } else {
            Err(FlowError::InvalidTransition {
                action,
                state: self.state.as_str(),
            })
        }
    }
}

/// Writes each planned occurrence unless the same booking is already on the
/// calendar, so repeating a commit never creates it twice. If the store
/// refuses one occurrence, the ones written by this call are removed again.
pub async fn commit_occurrences(
    repo: &dyn AppointmentRepository,
    existing: &[Appointment],
    planned: Vec<Appointment>,
) -> Result<CommitOutcome, RepositoryError> {
    let mut appointments = Vec::with_capacity(planned.len());
    let mut created: Vec<String> = Vec::new();

    for appointment in planned {
        if let Some(duplicate) = existing
            .iter()
            .find(|e| e.blocks_calendar() && e.is_duplicate_of(&appointment))
        {
            tracing::debug!(date = %appointment.date, existing_id = %duplicate.id, "occurrence already booked");
            appointments.push(duplicate.clone());
            continue;
        }

        let date = appointment.date;
        match repo.create(appointment.clone()).await {
            Ok(stored) => {
                created.push(stored.id.clone());
                appointments.push(stored);
            }
            Err(RepositoryError::SlotTaken { conflicting }) if conflicting.is_duplicate_of(&appointment) => {
                tracing::debug!(date = %date, existing_id = %conflicting.id, "occurrence already booked");
                appointments.push(*conflicting);
            }
            Err(RepositoryError::SlotTaken { conflicting }) => {
                tracing::warn!(
                    date = %date,
                    conflicting_id = %conflicting.id,
                    rolled_back = created.len(),
                    "store rejected occurrence"
                );
                roll_back(repo, &created).await;
                return Ok(CommitOutcome::Rejected(ConflictReport::overlap(date, *conflicting)));
            }
            Err(e) => {
                roll_back(repo, &created).await;
                return Err(e);
            }
        }
    }

    Ok(CommitOutcome::Committed {
        created: created.len(),
        appointments,
    })
}

async fn roll_back(repo: &dyn AppointmentRepository, ids: &[String]) {
    for id in ids {
        if let Err(e) = repo.delete(id).await {
            tracing::error!(appointment_id = %id, error = %e, "failed to roll back occurrence");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::Weekday;

    use super::*;
    use crate::db;
    use crate::models::{ConflictReason, RecurrenceUnit, ServiceDuration, TotalSpan};
    use crate::services::repository::SqliteAppointmentRepository;
    use crate::services::snapshot::{ChangeKind, SnapshotEvent, SnapshotNotifier};

    /// Store without its own overlap arbitration, with an optional forced
    /// rejection to stand in for a booking made elsewhere.
    #[derive(Default)]
    struct MemoryRepository {
        appointments: Mutex<Vec<Appointment>>,
        notifier: SnapshotNotifier,
        loads: AtomicUsize,
        reject_on: Option<NaiveDate>,
    }

    #[async_trait]
    impl AppointmentRepository for MemoryRepository {
        async fn load(
            &self,
            range: DateRange,
            staff_id: Option<&str>,
        ) -> Result<AppointmentSnapshot, RepositoryError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            let appointments = self
                .appointments
                .lock()
                .unwrap()
                .iter()
                .filter(|a| range.contains(a.date) && staff_id.map_or(true, |s| a.staff_id == s))
                .cloned()
                .collect();
            Ok(AppointmentSnapshot {
                version: self.notifier.current(),
                range,
                appointments,
            })
        }

        async fn create(&self, appointment: Appointment) -> Result<Appointment, RepositoryError> {
            if self.reject_on == Some(appointment.date) {
                let mut other = appointment.clone();
                other.id = "booked-elsewhere".to_string();
                other.client_id = "someone-else".to_string();
                return Err(RepositoryError::SlotTaken {
                    conflicting: Box::new(other),
                });
            }
            self.appointments.lock().unwrap().push(appointment.clone());
            self.notifier.publish(ChangeKind::Created, &appointment);
            Ok(appointment)
        }

        async fn update(&self, appointment: Appointment) -> Result<Appointment, RepositoryError> {
            Ok(appointment)
        }

        async fn delete(&self, id: &str) -> Result<bool, RepositoryError> {
            let mut appointments = self.appointments.lock().unwrap();
            let before = appointments.len();
            appointments.retain(|a| a.id != id);
            Ok(appointments.len() != before)
        }

        fn version(&self) -> u64 {
            self.notifier.current()
        }

        fn subscribe(&self) -> tokio::sync::broadcast::Receiver<SnapshotEvent> {
            self.notifier.subscribe()
        }
    }

    impl MemoryRepository {
        fn count(&self) -> usize {
            self.appointments.lock().unwrap().len()
        }
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn dana() -> Staff {
        let mut staff = Staff::new("dana", "Dana");
        for day in [Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri] {
            staff = staff.with_day(day, "09:00", "17:00");
        }
        staff.with_day_off(Weekday::Sat).with_day_off(Weekday::Sun)
    }

    fn haircut() -> Service {
        Service {
            id: "cut".to_string(),
            name: "Haircut".to_string(),
            duration: ServiceDuration::Text("30 min".to_string()),
            price_cents: 2500,
        }
    }

    fn existing(id: &str, day: &str, start: &str, end: &str) -> Appointment {
        let now = Utc::now().naive_utc();
        Appointment {
            id: id.to_string(),
            date: date(day),
            start: start.to_string(),
            end: end.to_string(),
            staff_id: "dana".to_string(),
            client_id: "other-client".to_string(),
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

    fn flow_at_slot(day: &str, start: &str, staff: Staff) -> BookingFlow {
        let mut flow = BookingFlow::new();
        flow.start().unwrap();
        flow.select_client("client-1").unwrap();
        flow.select_service(haircut()).unwrap();
        flow.select_slot(date(day), start, staff).unwrap();
        flow
    }

    fn empty_snapshot(day: &str) -> AppointmentSnapshot {
        AppointmentSnapshot::empty(DateRange::day(date(day)))
    }

    #[test]
    fn test_steps_advance_in_order() {
        let mut flow = BookingFlow::new();
        assert_eq!(flow.state().as_str(), "idle");
        flow.start().unwrap();
        assert_eq!(flow.state().as_str(), "selecting_client");
        flow.select_client("client-1").unwrap();
        assert_eq!(flow.state().as_str(), "selecting_service");
        flow.select_service(haircut()).unwrap();
        assert_eq!(flow.state().as_str(), "selecting_slot");
        flow.select_slot(date("2024-03-04"), "10:15", dana()).unwrap();
        assert_eq!(flow.state().as_str(), "selecting_recurrence");

        let slot = flow.draft().slot.as_ref().unwrap();
        assert_eq!(slot.end, "10:45");
    }

    #[test]
    fn test_slot_requires_client_and_service() {
        let mut flow = BookingFlow::new();
        flow.start().unwrap();
        assert!(matches!(
            flow.select_slot(date("2024-03-04"), "10:00", dana()),
            Err(FlowError::MissingSelection("client"))
        ));
        flow.select_client("client-1").unwrap();
        assert!(matches!(
            flow.select_slot(date("2024-03-04"), "10:00", dana()),
            Err(FlowError::MissingSelection("service"))
        ));
    }

    #[test]
    fn test_selection_before_start_is_rejected() {
        let mut flow = BookingFlow::new();
        assert!(matches!(
            flow.select_client("client-1"),
            Err(FlowError::InvalidTransition { state: "idle", .. })
        ));
        flow.start().unwrap();
        assert!(matches!(flow.start(), Err(FlowError::InvalidTransition { .. })));
    }

    #[test]
    fn test_unparseable_service_duration() {
        let mut flow = BookingFlow::new();
        flow.start().unwrap();
        flow.select_client("client-1").unwrap();
        let mut service = haircut();
        service.duration = ServiceDuration::Text("a while".to_string());
        assert!(matches!(
            flow.select_service(service),
            Err(FlowError::Schedule(ScheduleError::UnparseableDuration(_)))
        ));
        assert_eq!(flow.state().as_str(), "selecting_service");
    }

    #[test]
    fn test_changing_service_retimes_slot() {
        let mut flow = flow_at_slot("2024-03-04", "10:00", dana());
        let mut longer = haircut();
        longer.duration = ServiceDuration::Minutes(90);
        flow.select_service(longer).unwrap();
        assert_eq!(flow.draft().slot.as_ref().unwrap().end, "11:30");
        assert_eq!(flow.state().as_str(), "selecting_recurrence");
    }

    #[test]
    fn test_zero_interval_rejected_at_selection() {
        let mut flow = flow_at_slot("2024-03-04", "10:00", dana());
        let pattern = RecurrencePattern::new(RecurrenceUnit::Day, 0, TotalSpan::Months(1));
        assert!(matches!(
            flow.select_recurrence(Some(pattern)),
            Err(FlowError::Schedule(ScheduleError::InvalidRecurrenceInterval))
        ));
    }

    #[test]
    fn test_cancel_discards_everything() {
        let mut flow = flow_at_slot("2024-03-04", "10:00", dana());
        flow.cancel();
        assert_eq!(flow.state().as_str(), "idle");
        assert!(flow.draft().client_id.is_none());
        assert!(flow.draft().slot.is_none());
    }

    #[tokio::test]
    async fn test_confirm_single_appointment() {
        let repo = MemoryRepository::default();
        let mut flow = flow_at_slot("2024-03-04", "10:30", dana());
        flow.select_recurrence(None).unwrap();

        let state = flow.confirm(&empty_snapshot("2024-03-04"), &repo).await.unwrap();
        let FlowState::Confirmed(appointments) = state else {
            panic!("expected confirmed, got {}", state.as_str());
        };
        assert_eq!(appointments.len(), 1);
        assert_eq!(appointments[0].end, "11:00");
        assert_eq!(appointments[0].duration_minutes, 30);
        assert!(appointments[0].series_id.is_none());
        assert_eq!(repo.count(), 1);
    }

    #[tokio::test]
    async fn test_conflict_keeps_selections_and_allows_retry() {
        let repo = MemoryRepository::default();
        let snapshot = AppointmentSnapshot {
            version: 0,
            range: DateRange::day(date("2024-03-04")),
            appointments: vec![existing("a1", "2024-03-04", "10:00", "10:30")],
        };

        let mut flow = flow_at_slot("2024-03-04", "10:15", dana());
        flow.select_recurrence(None).unwrap();
        let state = flow.confirm(&snapshot, &repo).await.unwrap();
        let FlowState::ReviewingConflict(report) = state else {
            panic!("expected conflict, got {}", state.as_str());
        };
        assert_eq!(report.reason, ConflictReason::AppointmentOverlap);
        assert_eq!(report.conflicting_appointment.as_ref().unwrap().id, "a1");
        assert_eq!(repo.count(), 0);
        assert_eq!(flow.draft().client_id.as_deref(), Some("client-1"));
        assert!(flow.draft().service.is_some());

        flow.select_slot(date("2024-03-04"), "10:30", dana()).unwrap();
        let state = flow.confirm(&snapshot, &repo).await.unwrap();
        assert_eq!(state.as_str(), "confirmed");
        assert_eq!(repo.count(), 1);
    }

    #[tokio::test]
    async fn test_series_on_sunday_off_creates_nothing() {
        let repo = MemoryRepository::default();
        let mut flow = flow_at_slot("2024-03-03", "10:00", dana());
        flow.select_recurrence(Some(RecurrencePattern::new(
            RecurrenceUnit::Day,
            7,
            TotalSpan::Months(2),
        )))
        .unwrap();

        let state = flow.confirm(&empty_snapshot("2024-03-03"), &repo).await.unwrap();
        let FlowState::ReviewingConflict(report) = state else {
            panic!("expected conflict, got {}", state.as_str());
        };
        assert_eq!(report.reason, ConflictReason::NonWorkingDay);
        assert_eq!(report.occurrence_date, date("2024-03-03"));
        assert_eq!(repo.count(), 0);
    }

    #[tokio::test]
    async fn test_third_occurrence_blocked_creates_nothing() {
        let repo = MemoryRepository::default();
        let staff = Staff::new("dana", "Dana").with_day_off(Weekday::Fri);
        let mut flow = flow_at_slot("2024-03-06", "10:00", staff);
        flow.select_recurrence(Some(RecurrencePattern::new(
            RecurrenceUnit::Day,
            1,
            TotalSpan::Days(9),
        )))
        .unwrap();

        let state = flow.confirm(&empty_snapshot("2024-03-06"), &repo).await.unwrap();
        let FlowState::ReviewingConflict(report) = state else {
            panic!("expected conflict, got {}", state.as_str());
        };
        assert_eq!(report.occurrence_date, date("2024-03-08"));
        assert_eq!(report.reason, ConflictReason::NonWorkingDay);
        assert_eq!(repo.count(), 0);
    }

    #[tokio::test]
    async fn test_weekly_series_shares_series_id() {
        let repo = MemoryRepository::default();
        let mut flow = flow_at_slot("2024-01-01", "10:00", dana());
        flow.select_recurrence(Some(RecurrencePattern::new(
            RecurrenceUnit::Week,
            1,
            TotalSpan::Months(1),
        )))
        .unwrap();

        let snapshot = AppointmentSnapshot::empty(DateRange::new(date("2024-01-01"), date("2024-02-01")));
        let state = flow.confirm(&snapshot, &repo).await.unwrap();
        let FlowState::Confirmed(appointments) = state else {
            panic!("expected confirmed, got {}", state.as_str());
        };
        assert_eq!(appointments.len(), 5);
        let series = appointments[0].series_id.clone();
        assert!(series.is_some());
        assert!(appointments.iter().all(|a| a.series_id == series));
        assert_eq!(appointments[4].date, date("2024-01-29"));
    }

    #[tokio::test]
    async fn test_late_rejection_becomes_overlap_and_rolls_back() {
        let repo = MemoryRepository {
            reject_on: Some(date("2024-03-11")),
            ..Default::default()
        };
        let mut flow = flow_at_slot("2024-03-04", "10:00", dana());
        flow.select_recurrence(Some(RecurrencePattern::new(
            RecurrenceUnit::Week,
            1,
            TotalSpan::Weeks(2),
        )))
        .unwrap();

        let snapshot = AppointmentSnapshot::empty(DateRange::new(date("2024-03-04"), date("2024-03-18")));
        let state = flow.confirm(&snapshot, &repo).await.unwrap();
        let FlowState::ReviewingConflict(report) = state else {
            panic!("expected conflict, got {}", state.as_str());
        };
        assert_eq!(report.reason, ConflictReason::AppointmentOverlap);
        assert_eq!(report.occurrence_date, date("2024-03-11"));
        assert_eq!(report.conflicting_appointment.as_ref().unwrap().id, "booked-elsewhere");
        assert_eq!(repo.count(), 0);
    }

    #[tokio::test]
    async fn test_stale_snapshot_is_reloaded() {
        let repo = MemoryRepository::default();
        repo.create(existing("a1", "2024-03-04", "10:00", "10:30")).await.unwrap();

        let mut flow = flow_at_slot("2024-03-04", "10:15", dana());
        flow.select_recurrence(None).unwrap();

        // Snapshot taken before a1 was written.
        let state = flow.confirm(&empty_snapshot("2024-03-04"), &repo).await.unwrap();
        assert_eq!(state.as_str(), "reviewing_conflict");
        assert_eq!(repo.loads.load(Ordering::SeqCst), 1);
        assert_eq!(repo.count(), 1);
    }

    #[tokio::test]
    async fn test_current_snapshot_is_not_reloaded() {
        let repo = MemoryRepository::default();
        let mut flow = flow_at_slot("2024-03-04", "10:00", dana());
        flow.select_recurrence(None).unwrap();

        flow.confirm(&empty_snapshot("2024-03-04"), &repo).await.unwrap();
        assert_eq!(repo.loads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_retrying_confirm_is_idempotent() {
        let repo = MemoryRepository::default();
        let mut flow = flow_at_slot("2024-03-04", "10:00", dana());
        flow.select_recurrence(None).unwrap();
        flow.confirm(&empty_snapshot("2024-03-04"), &repo).await.unwrap();

        // Same selections confirmed again from a fresh session.
        let mut again = flow_at_slot("2024-03-04", "10:00", dana());
        again.select_recurrence(None).unwrap();
        let snapshot = repo.load(DateRange::day(date("2024-03-04")), None).await.unwrap();
        let state = again.confirm(&snapshot, &repo).await.unwrap();
        assert_eq!(state.as_str(), "confirmed");
        assert_eq!(repo.count(), 1);
    }

    #[tokio::test]
    async fn test_commit_step_twice_creates_once() {
        let conn = db::init_db(":memory:").unwrap();
        let repo = SqliteAppointmentRepository::new(Arc::new(Mutex::new(conn)));
        let mut flow = flow_at_slot("2024-03-04", "10:00", dana());
        flow.select_recurrence(Some(RecurrencePattern::new(
            RecurrenceUnit::Week,
            1,
            TotalSpan::Weeks(1),
        )))
        .unwrap();
        let planned = flow.materialize(&[date("2024-03-04"), date("2024-03-11")]);

        let first = commit_occurrences(&repo, &[], planned.clone()).await.unwrap();
        assert!(matches!(first, CommitOutcome::Committed { created: 2, .. }));

        // Stale (empty) view of the calendar: the store's own check spots the duplicates.
        let second = commit_occurrences(&repo, &[], planned.clone()).await.unwrap();
        assert!(matches!(second, CommitOutcome::Committed { created: 0, .. }));

        let snapshot = repo
            .load(DateRange::new(date("2024-03-04"), date("2024-03-11")), None)
            .await
            .unwrap();
        assert_eq!(snapshot.appointments.len(), 2);

        let third = commit_occurrences(&repo, &snapshot.appointments, planned).await.unwrap();
        let CommitOutcome::Committed { appointments, created } = third else {
            panic!("expected committed");
        };
        assert_eq!(created, 0);
        assert_eq!(appointments.len(), 2);
    }
}
