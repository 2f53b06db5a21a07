use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use crate::db::{self, queries};
use crate::errors::{AppError, RepositoryError};
use crate::handlers::check_auth;
use crate::models::{AppointmentStatus, ConflictReport};
use crate::services::snapshot::{AppointmentSnapshot, DateRange};
use crate::state::AppState;

// GET /api/appointments?from=&to=&staff_id=
#[derive(Deserialize)]
pub struct RangeQuery {
    pub from: NaiveDate,
    pub to: Option<NaiveDate>,
    pub staff_id: Option<String>,
}

pub async fn list_appointments(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<RangeQuery>,
) -> Result<Json<AppointmentSnapshot>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let to = query.to.unwrap_or(query.from);
    if to < query.from {
        return Err(AppError::BadRequest("`to` is before `from`".to_string()));
    }
    let snapshot = state
        .appointments
        .load(DateRange::new(query.from, to), query.staff_id.as_deref())
        .await?;
    Ok(Json(snapshot))
}

// POST /api/appointments/:id/status
#[derive(Deserialize)]
pub struct StatusBody {
    pub status: AppointmentStatus,
}

pub async fn update_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<StatusBody>,
) -> Result<Response, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let mut appointment = {
        let db = db::lock(&state.db)?;
        queries::get_appointment_by_id(&db, &id)?
    }
    .ok_or_else(|| AppError::NotFound(format!("appointment {id}")))?;

    appointment.status = body.status;
    match state.appointments.update(appointment).await {
        Ok(updated) => Ok(Json(updated).into_response()),
        // Reinstating a cancelled appointment whose slot has since been taken.
        Err(RepositoryError::SlotTaken { conflicting }) => {
            let report = ConflictReport::overlap(conflicting.date, *conflicting);
            Ok((StatusCode::CONFLICT, Json(serde_json::json!({ "conflict": report }))).into_response())
        }
        Err(e) => Err(e.into()),
    }
}

// DELETE /api/appointments/:id
pub async fn delete_appointment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    if !state.appointments.delete(&id).await? {
        return Err(AppError::NotFound(format!("appointment {id}")));
    }
    Ok(Json(serde_json::json!({ "ok": true })))
}

// GET /api/appointments/events (SSE stream of calendar changes)
#[derive(Deserialize)]
pub struct SseQuery {
    pub token: Option<String>,
}

pub async fn events_stream(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SseQuery>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>>, AppError> {
    // EventSource can't set headers, so the token rides in the query string.
    if query.token.as_deref() != Some(state.config.admin_token.as_str()) {
        return Err(AppError::Unauthorized);
    }

    let rx = state.appointments.subscribe();
    let live_stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(event) => {
            let data = serde_json::to_string(&event).unwrap_or_default();
            Some(Ok(Event::default().data(data).event("snapshot_changed")))
        }
        // Subscriber fell behind; it should reload rather than replay.
        Err(tokio_stream::wrappers::errors::BroadcastStreamRecvError::Lagged(_)) => {
            Some(Ok(Event::default().event("snapshot_stale").data("reload")))
        }
    });

    let keepalive_stream = tokio_stream::StreamExt::map(
        tokio_stream::wrappers::IntervalStream::new(tokio::time::interval(Duration::from_secs(30))),
        |_| Ok(Event::default().comment("keepalive")),
    );

    Ok(Sse::new(StreamExt::merge(live_stream, keepalive_stream)))
}
