use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use featctl_core::{Job, JobId};
use featctl_infra::jobs::JobServiceError;

use crate::app::routes::blocking;
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_jobs))
        .route("/:id", get(get_job))
        .route("/:id/restart", post(restart_job))
        .route("/:id/abort", post(abort_job))
}

pub async fn list_jobs(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::ListJobsQuery>,
) -> axum::response::Response {
    let filter = match query.into_filter() {
        Ok(filter) => filter,
        Err(resp) => return resp,
    };

    match blocking(move || services.jobs.list_jobs(&filter)).await {
        Ok(Ok(jobs)) => Json(jobs.iter().map(dto::JobView::from).collect::<Vec<_>>()).into_response(),
        Ok(Err(e)) => errors::job_error_to_response(e),
        Err(resp) => resp,
    }
}

pub async fn get_job(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    with_job(id, move |id| services.jobs.get_job(&id)).await
}

pub async fn restart_job(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    with_job(id, move |id| services.jobs.restart_job(&id)).await
}

pub async fn abort_job(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    with_job(id, move |id| services.jobs.abort_job(&id)).await
}

async fn with_job<F>(id: String, op: F) -> axum::response::Response
where
    F: FnOnce(JobId) -> Result<Job, JobServiceError> + Send + 'static,
{
    let id = match id.parse::<JobId>() {
        Ok(id) => id,
        Err(e) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", e.to_string()),
    };

    match blocking(move || op(id)).await {
        Ok(Ok(job)) => Json(dto::JobView::from(&job)).into_response(),
        Ok(Err(e)) => errors::job_error_to_response(e),
        Err(resp) => resp,
    }
}
