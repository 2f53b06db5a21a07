use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::db::{self, queries};
use crate::errors::AppError;
use crate::handlers::check_auth;
use crate::models::{ConflictReport, RecurrencePattern};
use crate::services::conflict::plan_series;
use crate::services::duration::parse_service_duration;
use crate::services::recurrence::generate_occurrences;
use crate::services::snapshot::DateRange;
use crate::services::time::compute_end_time;
use crate::state::AppState;

/// Either `end` or `service_id` must be given; `end` wins when both are.
#[derive(Deserialize)]
pub struct CheckRequest {
    pub staff_id: String,
    pub date: NaiveDate,
    pub start: String,
    pub end: Option<String>,
    pub service_id: Option<String>,
    pub recurrence: Option<RecurrencePattern>,
    /// Appointment being moved; it never conflicts with itself.
    pub exclude_appointment_id: Option<String>,
}

#[derive(Serialize)]
pub struct CheckResponse {
    pub occurrences: Vec<NaiveDate>,
    pub end: String,
    pub conflict: Option<ConflictReport>,
}

// POST /api/conflicts/check
pub async fn check(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CheckRequest>,
) -> Result<Json<CheckResponse>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let (staff, service) = {
        let db = db::lock(&state.db)?;
        let staff = queries::get_staff(&db, &req.staff_id)?;
        let service = match &req.service_id {
            Some(id) => Some(
                queries::get_service(&db, id)?
                    .ok_or_else(|| AppError::NotFound(format!("service {id}")))?,
            ),
            None => None,
        };
        (staff, service)
    };
    let staff = staff.ok_or_else(|| AppError::NotFound(format!("staff {}", req.staff_id)))?;

    let end = match (req.end, service) {
        (Some(end), _) => end,
        (None, Some(service)) => {
            let minutes = parse_service_duration(&service.duration)?;
            compute_end_time(&req.start, i64::from(minutes))?
        }
        (None, None) => {
            return Err(AppError::BadRequest(
                "either end or service_id is required".to_string(),
            ))
        }
    };

    let occurrences = generate_occurrences(req.date, req.recurrence.as_ref())?;
    let range = DateRange::spanning(&occurrences).unwrap_or(DateRange::day(req.date));
    let snapshot = state.appointments.load(range, Some(staff.id.as_str())).await?;

    let existing: Vec<_> = snapshot
        .appointments
        .into_iter()
        .filter(|a| req.exclude_appointment_id.as_deref() != Some(a.id.as_str()))
        .collect();

    let plan = plan_series(
        req.date,
        req.recurrence.as_ref(),
        &existing,
        &req.start,
        &end,
        &staff,
    )?;

    Ok(Json(CheckResponse {
        occurrences: plan.occurrences,
        end,
        conflict: plan.conflict,
    }))
}
