use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::app::errors;
use crate::app::routes::blocking;
use crate::app::services::AppServices;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// Run one reconciliation pass now instead of waiting for the worker.
pub async fn poll(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match blocking(move || services.coordinator.poll()).await {
        Ok(Ok(report)) => Json(report).into_response(),
        Ok(Err(e)) => errors::coordinator_error_to_response(e),
        Err(resp) => resp,
    }
}
