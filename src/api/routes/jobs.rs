//! Read-only job registry.

use crate::api::AppState;
use crate::error::ApiError;
use crate::types::JobId;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// GET /jobs - List all jobs submitted since startup
#[utoipa::path(
    get,
    path = "/api/jobs",
    tag = "jobs",
    responses(
        (status = 200, description = "All jobs, oldest first", body = Vec<crate::types::JobRecord>)
    )
)]
pub async fn list_jobs(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.downloader.jobs().await))
}

/// GET /jobs/:id - Get a single job
#[utoipa::path(
    get,
    path = "/api/jobs/{id}",
    tag = "jobs",
    params(
        ("id" = u64, Path, description = "Job ID")
    ),
    responses(
        (status = 200, description = "Job record", body = crate::types::JobRecord),
        (status = 404, description = "Job not found", body = ApiError)
    )
)]
pub async fn get_job(State(state): State<AppState>, Path(id): Path<u64>) -> Response {
    match state.downloader.job(JobId(id)).await {
        Some(record) => (StatusCode::OK, Json(record)).into_response(),
        None => ApiError::not_found(format!("job {id}")).into_response(),
    }
}
