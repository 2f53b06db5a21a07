use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::models::Appointment;

/// Input validation failures raised by the scheduling core.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScheduleError {
    #[error("invalid time format: {0}")]
    InvalidTimeFormat(String),

    #[error("invalid duration: {0} minutes")]
    InvalidDuration(i64),

    #[error("unparseable service duration: {0}")]
    UnparseableDuration(String),

    #[error("recurrence interval must be at least 1")]
    InvalidRecurrenceInterval,

    #[error("recurrence would generate more than {0} occurrences")]
    RecurrenceTooLarge(usize),
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("slot already taken by appointment {}", conflicting.id)]
    SlotTaken { conflicting: Box<Appointment> },

    #[error("appointment not found: {0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error("cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },

    #[error("missing selection: {0}")]
    MissingSelection(&'static str),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),

    #[error("cannot schedule: {0}")]
    Schedule(#[from] ScheduleError),

    #[error("{0}")]
    Flow(FlowError),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized")]
    Unauthorized,
}

impl From<FlowError> for AppError {
    fn from(err: FlowError) -> Self {
        match err {
            FlowError::Schedule(e) => AppError::Schedule(e),
            FlowError::Repository(RepositoryError::NotFound(id)) => AppError::NotFound(id),
            FlowError::Repository(RepositoryError::Storage(e)) => AppError::Storage(e),
            other => AppError::Flow(other),
        }
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        AppError::from(FlowError::Repository(err))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Schedule(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Flow(_) => StatusCode::CONFLICT,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
        }

        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}
