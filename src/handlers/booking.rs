use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::db::{self, queries};
use crate::errors::AppError;
use crate::handlers::check_auth;
use crate::models::RecurrencePattern;
use crate::services::booking_flow::{BookingFlow, FlowState};
use crate::services::recurrence::generate_occurrences;
use crate::services::snapshot::{AppointmentSnapshot, DateRange};
use crate::state::{evict_idle_sessions, AppState, BookingSession};

#[derive(Serialize)]
pub struct SessionResponse {
    pub id: String,
    pub flow: BookingFlow,
}

/// Runs `step` against the stored session and returns the updated flow.
/// The session is left untouched when the step fails.
fn with_session<F>(state: &AppState, id: &str, step: F) -> Result<Json<SessionResponse>, AppError>
where
    F: FnOnce(&mut BookingFlow) -> Result<(), AppError>,
{
    let mut sessions = state.sessions()?;
    let session = sessions
        .get_mut(id)
        .ok_or_else(|| AppError::NotFound(format!("booking session {id}")))?;

    let mut next = session.flow.clone();
    step(&mut next)?;
    session.flow = next.clone();
    session.last_touched = std::time::Instant::now();

    Ok(Json(SessionResponse {
        id: id.to_string(),
        flow: next,
    }))
}

// POST /api/bookings
pub async fn open_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<(StatusCode, Json<SessionResponse>), AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let mut flow = BookingFlow::new();
    flow.start()?;
    let id = uuid::Uuid::new_v4().to_string();

    {
        let mut sessions = state.sessions()?;
        let evicted = evict_idle_sessions(&mut sessions, state.session_ttl());
        if evicted > 0 {
            tracing::info!(evicted, "dropped idle booking sessions");
        }
        sessions.insert(id.clone(), BookingSession::new(flow.clone()));
    }

    tracing::debug!(session_id = %id, "booking session opened");
    Ok((StatusCode::CREATED, Json(SessionResponse { id, flow })))
}

// GET /api/bookings/:id
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    with_session(&state, &id, |_| Ok(()))
}

// DELETE /api/bookings/:id
pub async fn cancel_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let removed = state.sessions()?.remove(&id);
    let Some(mut session) = removed else {
        return Err(AppError::NotFound(format!("booking session {id}")));
    };
    session.flow.cancel();
    Ok(Json(serde_json::json!({ "ok": true })))
}

// POST /api/bookings/:id/client
#[derive(Deserialize)]
pub struct ClientSelection {
    pub client_id: String,
}

pub async fn select_client(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<ClientSelection>,
) -> Result<Json<SessionResponse>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let client = {
        let db = db::lock(&state.db)?;
        queries::get_client(&db, &body.client_id)?
    }
    .ok_or_else(|| AppError::NotFound(format!("client {}", body.client_id)))?;

    with_session(&state, &id, |flow| Ok(flow.select_client(&client.id)?))
}

// POST /api/bookings/:id/service
#[derive(Deserialize)]
pub struct ServiceSelection {
    pub service_id: String,
}

pub async fn select_service(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<ServiceSelection>,
) -> Result<Json<SessionResponse>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let service = {
        let db = db::lock(&state.db)?;
        queries::get_service(&db, &body.service_id)?
    }
    .ok_or_else(|| AppError::NotFound(format!("service {}", body.service_id)))?;

    with_session(&state, &id, |flow| Ok(flow.select_service(service)?))
}

// POST /api/bookings/:id/slot
#[derive(Deserialize)]
pub struct SlotRequest {
    pub date: NaiveDate,
    pub start: String,
    pub staff_id: String,
}

pub async fn select_slot(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<SlotRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let staff = {
        let db = db::lock(&state.db)?;
        queries::get_staff(&db, &body.staff_id)?
    }
    .ok_or_else(|| AppError::NotFound(format!("staff {}", body.staff_id)))?;

    with_session(&state, &id, |flow| {
        Ok(flow.select_slot(body.date, &body.start, staff)?)
    })
}

// POST /api/bookings/:id/recurrence
#[derive(Deserialize)]
pub struct RecurrenceRequest {
    #[serde(default)]
    pub recurrence: Option<RecurrencePattern>,
    pub notes: Option<String>,
}

pub async fn select_recurrence(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<RecurrenceRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    with_session(&state, &id, |flow| {
        flow.select_recurrence(body.recurrence)?;
        flow.set_notes(body.notes);
        Ok(())
    })
}

// POST /api/bookings/:id/confirm
pub async fn confirm(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    // Taken out of the map for the duration of the commit so a second
    // confirm on the same session sees it as missing instead of racing.
    let mut flow = state
        .sessions()?
        .remove(&id)
        .ok_or_else(|| AppError::NotFound(format!("booking session {id}")))?
        .flow;

    let result = confirm_flow(&state, &mut flow).await;

    // A confirmed session is finished; anything else stays open for a retry.
    if !matches!(flow.state(), FlowState::Confirmed(_)) {
        state
            .sessions()?
            .insert(id.clone(), BookingSession::new(flow.clone()));
    }

    result?;
    tracing::debug!(session_id = %id, state = flow.state().as_str(), "booking session confirmed");
    Ok(Json(SessionResponse { id, flow }))
}

async fn confirm_flow(state: &AppState, flow: &mut BookingFlow) -> Result<(), AppError> {
    let snapshot = match &flow.draft().slot {
        Some(slot) => {
            let occurrences = generate_occurrences(slot.date, flow.draft().recurrence.as_ref())?;
            let range = DateRange::spanning(&occurrences).unwrap_or(DateRange::day(slot.date));
            state
                .appointments
                .load(range, Some(slot.staff.id.as_str()))
                .await?
        }
        // Nothing to check yet; confirm reports the missing selection.
        None => AppointmentSnapshot::empty(DateRange::day(state.config.business_now().date())),
    };

    flow.confirm(&snapshot, state.appointments.as_ref()).await?;
    Ok(())
}
