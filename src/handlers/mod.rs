pub mod appointments;
pub mod booking;
pub mod calendar;
pub mod catalog;
pub mod conflicts;
pub mod health;
pub mod staff;

use std::sync::Arc;

use axum::http::HeaderMap;
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::errors::AppError;
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/api/staff", get(staff::list_staff))
        .route("/api/staff/:id", put(staff::put_staff))
        .route("/api/staff/:id/status", get(staff::staff_status))
        .route("/api/services", get(catalog::list_services))
        .route("/api/services/:id", put(catalog::put_service))
        .route(
            "/api/clients",
            get(catalog::list_clients).post(catalog::create_client),
        )
        .route("/api/appointments", get(appointments::list_appointments))
        .route("/api/appointments/events", get(appointments::events_stream))
        .route(
            "/api/appointments/:id",
            axum::routing::delete(appointments::delete_appointment),
        )
        .route(
            "/api/appointments/:id/status",
            post(appointments::update_status),
        )
        .route("/api/conflicts/check", post(conflicts::check))
        .route("/api/bookings", post(booking::open_session))
        .route(
            "/api/bookings/:id",
            get(booking::get_session).delete(booking::cancel_session),
        )
        .route("/api/bookings/:id/client", post(booking::select_client))
        .route("/api/bookings/:id/service", post(booking::select_service))
        .route("/api/bookings/:id/slot", post(booking::select_slot))
        .route(
            "/api/bookings/:id/recurrence",
            post(booking::select_recurrence),
        )
        .route("/api/bookings/:id/confirm", post(booking::confirm))
        .route("/calendar/:appointment_id", get(calendar::download_ics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub(crate) fn check_auth(headers: &HeaderMap, expected_token: &str) -> Result<(), AppError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or("");
    if token != expected_token {
        return Err(AppError::Unauthorized);
    }
    Ok(())
}
