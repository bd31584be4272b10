use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use ridepool_domain::DomainError;

#[derive(Debug)]
pub enum AppError {
    AuthenticationError(String),
    Domain(DomainError),
    Anyhow(anyhow::Error),
}

impl From<DomainError> for AppError {
    fn from(e: DomainError) -> Self {
        AppError::Domain(e)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        AppError::Anyhow(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            AppError::Domain(e) => match &e {
                DomainError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error", e.to_string()),
                DomainError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden", e.to_string()),
                DomainError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found", e.to_string()),
                DomainError::InvalidState { .. } => (StatusCode::CONFLICT, "invalid_state", e.to_string()),
                DomainError::CapacityExceeded { .. } => {
                    (StatusCode::CONFLICT, "capacity_exceeded", e.to_string())
                }
                // Concurrency conflicts ask the caller to re-fetch and
                // re-decide; no automatic retry.
                DomainError::Conflict(_) => (StatusCode::CONFLICT, "conflict", e.to_string()),
                DomainError::Storage(msg) => {
                    tracing::error!("Storage error: {}", msg);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "internal",
                        "Internal Server Error".to_string(),
                    )
                }
            },
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal",
                    "Internal Server Error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": message,
            "code": code,
        }));

        (status, body).into_response()
    }
}
