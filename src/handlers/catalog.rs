use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;

use crate::db::{self, queries};
use crate::errors::AppError;
use crate::handlers::check_auth;
use crate::models::{Client, Service, ServiceDuration};
use crate::services::duration::parse_service_duration;
use crate::state::AppState;

// GET /api/services
pub async fn list_services(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Service>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let services = {
        let db = db::lock(&state.db)?;
        queries::list_services(&db)?
    };
    Ok(Json(services))
}

// PUT /api/services/:id
#[derive(Deserialize)]
pub struct ServiceBody {
    pub name: String,
    pub duration: ServiceDuration,
    #[serde(default)]
    pub price_cents: i64,
}

pub async fn put_service(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<ServiceBody>,
) -> Result<Json<Service>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    // Reject durations the scheduler could never use.
    parse_service_duration(&body.duration)?;

    let service = Service {
        id,
        name: body.name,
        duration: body.duration,
        price_cents: body.price_cents,
    };
    {
        let db = db::lock(&state.db)?;
        queries::upsert_service(&db, &service)?;
    }
    Ok(Json(service))
}

// GET /api/clients
pub async fn list_clients(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Client>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let clients = {
        let db = db::lock(&state.db)?;
        queries::list_clients(&db)?
    };
    Ok(Json(clients))
}

// POST /api/clients
#[derive(Deserialize)]
pub struct ClientBody {
    pub id: Option<String>,
    pub name: String,
    pub phone: Option<String>,
}

pub async fn create_client(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<ClientBody>,
) -> Result<(StatusCode, Json<Client>), AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    if body.name.trim().is_empty() {
        return Err(AppError::BadRequest("client name is required".to_string()));
    }
    let client = Client {
        id: body.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        name: body.name,
        phone: body.phone,
    };
    {
        let db = db::lock(&state.db)?;
        queries::create_client(&db, &client)?;
    }
    Ok((StatusCode::CREATED, Json(client)))
}
