use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::Weekday;
use serde::{Deserialize, Serialize};

use crate::db::{self, queries};
use crate::errors::AppError;
use crate::handlers::check_auth;
use crate::models::{DaySchedule, Staff};
use crate::services::availability::{current_live_status, LiveStatus};
use crate::state::AppState;

// GET /api/staff
pub async fn list_staff(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Staff>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let staff = {
        let db = db::lock(&state.db)?;
        queries::list_staff(&db)?
    };
    Ok(Json(staff))
}

// PUT /api/staff/:id
#[derive(Deserialize)]
pub struct StaffBody {
    pub name: String,
    #[serde(default)]
    pub working_hours: HashMap<Weekday, DaySchedule>,
}

pub async fn put_staff(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<StaffBody>,
) -> Result<Json<Staff>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let staff = Staff {
        id,
        name: body.name,
        working_hours: body.working_hours,
    };
    staff
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    {
        let db = db::lock(&state.db)?;
        queries::upsert_staff(&db, &staff)?;
    }
    tracing::info!(staff_id = %staff.id, hours = %staff.describe_hours(), "staff saved");
    Ok(Json(staff))
}

// GET /api/staff/:id/status
#[derive(Serialize)]
pub struct StatusResponse {
    staff_id: String,
    status: LiveStatus,
    hours: String,
    checked_at: String,
}

pub async fn staff_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<StatusResponse>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let staff = {
        let db = db::lock(&state.db)?;
        queries::get_staff(&db, &id)?
    }
    .ok_or_else(|| AppError::NotFound(format!("staff {id}")))?;

    let now = state.config.business_now();
    Ok(Json(StatusResponse {
        status: current_live_status(&staff, now),
        hours: staff.describe_hours(),
        staff_id: staff.id,
        checked_at: now.format("%Y-%m-%d %H:%M").to_string(),
    }))
}
