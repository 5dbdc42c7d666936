use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::applications::ledger::{applications_for_agency, applications_for_job};
use crate::errors::AppError;
use crate::jobs::{
    create_job, delete_job_cascade, get_job, jobs_for_agency, update_job, update_job_status,
    CascadeReport, JobUpdate, NewJob,
};
use crate::models::{Application, Job, JobStatus};
use crate::state::AppState;

/// POST /api/v1/jobs
pub async fn handle_create_job(
    State(state): State<AppState>,
    Json(req): Json<NewJob>,
) -> Result<(StatusCode, Json<Job>), AppError> {
    let job = create_job(state.store.as_ref(), state.resumes.as_ref(), req).await?;
    Ok((StatusCode::CREATED, Json(job)))
}

/// GET /api/v1/jobs/:id
pub async fn handle_get_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Job>, AppError> {
    Ok(Json(get_job(state.store.as_ref(), id).await?))
}

/// PATCH /api/v1/jobs/:id
pub async fn handle_update_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<JobUpdate>,
) -> Result<Json<Job>, AppError> {
    Ok(Json(update_job(state.store.as_ref(), id, req).await?))
}

#[derive(Deserialize)]
pub struct JobStatusUpdate {
    pub status: JobStatus,
}

/// PATCH /api/v1/jobs/:id/status
pub async fn handle_update_job_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<JobStatusUpdate>,
) -> Result<Json<Job>, AppError> {
    Ok(Json(update_job_status(state.store.as_ref(), id, req.status).await?))
}

/// DELETE /api/v1/jobs/:id
pub async fn handle_delete_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CascadeReport>, AppError> {
    Ok(Json(delete_job_cascade(state.store.as_ref(), id).await?))
}

/// GET /api/v1/jobs/:id/applications
pub async fn handle_list_applications(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Application>>, AppError> {
    get_job(state.store.as_ref(), id).await?;
    Ok(Json(applications_for_job(state.store.as_ref(), id).await?))
}

/// GET /api/v1/agencies/:id/jobs
pub async fn handle_agency_jobs(
    State(state): State<AppState>,
    Path(agency_id): Path<Uuid>,
) -> Result<Json<Vec<Job>>, AppError> {
    Ok(Json(jobs_for_agency(state.store.as_ref(), agency_id).await?))
}

/// GET /api/v1/agencies/:id/applications
pub async fn handle_agency_applications(
    State(state): State<AppState>,
    Path(agency_id): Path<Uuid>,
) -> Result<Json<Vec<Application>>, AppError> {
    Ok(Json(applications_for_agency(state.store.as_ref(), agency_id).await?))
}
