use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::db::{self, queries};
use crate::services::calendar::generate_ics;
use crate::state::AppState;

pub async fn download_ics(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Response {
    // Strip .ics suffix if present
    let appointment_id = raw_id.strip_suffix(".ics").unwrap_or(&raw_id);

    let loaded = db::lock(&state.db).and_then(|db| {
        let appointment = queries::get_appointment_by_id(&db, appointment_id)?;
        let service_name = match &appointment {
            Some(a) => queries::get_service(&db, &a.service_id)?.map(|s| s.name),
            None => None,
        };
        Ok((appointment, service_name))
    });

    let (appointment, service_name) = match loaded {
        Ok((Some(a), name)) => (a, name.unwrap_or_else(|| "Appointment".to_string())),
        Ok((None, _)) => {
            return (StatusCode::NOT_FOUND, "Appointment not found").into_response();
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to load appointment for .ics");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response();
        }
    };

    let ics = generate_ics(&appointment, &state.config.business_name, &service_name);
    let filename = format!("appointment-{appointment_id}.ics");

    (
        [
            (header::CONTENT_TYPE, "text/calendar; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                &format!("attachment; filename=\"{filename}\""),
            ),
        ],
        ics,
    )
        .into_response()
}
