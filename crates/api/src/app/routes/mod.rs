use axum::{
    http::StatusCode,
    routing::{get, post},
    Router,
};

use crate::app::errors;

pub mod jobs;
pub mod system;

/// Router for the job endpoints and the manual reconciliation trigger.
pub fn router() -> Router {
    Router::new()
        .route("/poll", post(system::poll))
        .nest("/jobs", jobs::router())
}

/// Run backend-bound work off the async executor.
///
/// Backends use a blocking HTTP client, so every service call goes through here.
pub(crate) async fn blocking<F, T>(f: F) -> Result<T, axum::response::Response>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        tracing::error!(error = %e, "blocking task failed");
        errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", e.to_string())
    })
}
