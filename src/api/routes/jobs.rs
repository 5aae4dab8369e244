//! Job handlers: submit, list, status, cancel, clear.

use super::{ClearedJobsResponse, SubmitJobResponse};
use crate::api::AppState;
use crate::error::{Error, JobError};
use crate::types::{ImageJobRequest, JobId, JobSnapshot, RecordJobRequest};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

/// GET /jobs - List every job the registry knows about
#[utoipa::path(
    get,
    path = "/api/v1/jobs",
    tag = "jobs",
    responses(
        (status = 200, description = "All jobs, oldest first", body = Vec<JobSnapshot>)
    )
)]
pub async fn list_jobs(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.registry.list())
}

/// POST /jobs - Submit a record (tabular or nested) job
#[utoipa::path(
    post,
    path = "/api/v1/jobs",
    tag = "jobs",
    request_body = RecordJobRequest,
    responses(
        (status = 202, description = "Job accepted", body = SubmitJobResponse),
        (status = 422, description = "No usable identifiers", body = crate::error::ApiError),
        (status = 503, description = "Registry is shutting down", body = crate::error::ApiError)
    )
)]
pub async fn submit_record_job(
    State(state): State<AppState>,
    Json(request): Json<RecordJobRequest>,
) -> Result<impl IntoResponse, Error> {
    let id = state.registry.submit(request)?;
    Ok((StatusCode::ACCEPTED, Json(SubmitJobResponse::new(id))))
}

/// POST /jobs/images - Submit an image download job
#[utoipa::path(
    post,
    path = "/api/v1/jobs/images",
    tag = "jobs",
    request_body = ImageJobRequest,
    responses(
        (status = 202, description = "Job accepted", body = SubmitJobResponse),
        (status = 422, description = "No usable part ids", body = crate::error::ApiError),
        (status = 503, description = "Registry is shutting down", body = crate::error::ApiError)
    )
)]
pub async fn submit_image_job(
    State(state): State<AppState>,
    Json(request): Json<ImageJobRequest>,
) -> Result<impl IntoResponse, Error> {
    let id = state.registry.submit_images(request)?;
    Ok((StatusCode::ACCEPTED, Json(SubmitJobResponse::new(id))))
}

/// GET /jobs/:id - Current snapshot of one job
#[utoipa::path(
    get,
    path = "/api/v1/jobs/{id}",
    tag = "jobs",
    params(
        ("id" = String, Path, description = "Job id")
    ),
    responses(
        (status = 200, description = "Job snapshot", body = JobSnapshot),
        (status = 404, description = "Unknown job id", body = crate::error::ApiError)
    )
)]
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<JobSnapshot>, Error> {
    let id = JobId::from(id);
    match state.registry.status(&id) {
        Some(snapshot) => Ok(Json(snapshot)),
        None => Err(Error::Job(JobError::NotFound { id })),
    }
}

/// POST /jobs/:id/cancel - Request cancellation of a running job
#[utoipa::path(
    post,
    path = "/api/v1/jobs/{id}/cancel",
    tag = "jobs",
    params(
        ("id" = String, Path, description = "Job id")
    ),
    responses(
        (status = 202, description = "Cancellation requested"),
        (status = 404, description = "Unknown job id", body = crate::error::ApiError),
        (status = 409, description = "Job already finished", body = crate::error::ApiError)
    )
)]
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, Error> {
    state.registry.cancel(&JobId::from(id))?;
    Ok(StatusCode::ACCEPTED)
}

/// DELETE /jobs/:id - Remove a finished job from the registry
#[utoipa::path(
    delete,
    path = "/api/v1/jobs/{id}",
    tag = "jobs",
    params(
        ("id" = String, Path, description = "Job id")
    ),
    responses(
        (status = 200, description = "Final snapshot of the cleared job", body = JobSnapshot),
        (status = 404, description = "Unknown job id", body = crate::error::ApiError),
        (status = 409, description = "Job still running", body = crate::error::ApiError)
    )
)]
pub async fn clear_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<JobSnapshot>, Error> {
    let snapshot = state.registry.clear(&JobId::from(id))?;
    Ok(Json(snapshot))
}

/// DELETE /jobs - Remove every finished job
#[utoipa::path(
    delete,
    path = "/api/v1/jobs",
    tag = "jobs",
    responses(
        (status = 200, description = "Number of jobs cleared", body = ClearedJobsResponse)
    )
)]
pub async fn clear_finished_jobs(State(state): State<AppState>) -> impl IntoResponse {
    let cleared = state.registry.clear_finished();
    Json(ClearedJobsResponse { cleared })
}
