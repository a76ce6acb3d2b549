use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use featctl_infra::jobs::{CoordinatorError, JobServiceError};

pub fn job_error_to_response(err: JobServiceError) -> axum::response::Response {
    let message = err.to_string();
    match err {
        JobServiceError::NotFound(_) => json_error(StatusCode::NOT_FOUND, "not_found", message),
        JobServiceError::InvalidState { .. } => json_error(StatusCode::CONFLICT, "invalid_state", message),
        JobServiceError::Backend(_) => json_error(StatusCode::BAD_GATEWAY, "backend_error", message),
        JobServiceError::Repository(_) => json_error(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", message),
        JobServiceError::Config(_) => json_error(StatusCode::INTERNAL_SERVER_ERROR, "config_error", message),
        JobServiceError::LockPoisoned => json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message),
    }
}

pub fn coordinator_error_to_response(err: CoordinatorError) -> axum::response::Response {
    let message = err.to_string();
    match err {
        CoordinatorError::Spec(_) => json_error(StatusCode::SERVICE_UNAVAILABLE, "spec_unavailable", message),
        CoordinatorError::InvalidSubscription { .. } => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invalid_subscription", message)
        }
        CoordinatorError::Repository(_) => json_error(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", message),
        CoordinatorError::Config(_) => json_error(StatusCode::INTERNAL_SERVER_ERROR, "config_error", message),
        CoordinatorError::WorkerPanicked { .. } | CoordinatorError::LockPoisoned => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
