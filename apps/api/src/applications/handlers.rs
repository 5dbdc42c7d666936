use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::applications::ledger::{applications_for_candidate, get_application, update_status};
use crate::applications::registry::get_candidate;
use crate::applications::submission::{
    normalize_email, snapshot_answers, RawAnswer, Submission, SubmissionReceipt,
};
use crate::errors::AppError;
use crate::jobs::get_job;
use crate::models::{AdditionalData, Application, ApplicationStatus, Candidate, JobStatus};
use crate::resume_storage::{job_folder, sanitize_identifier};
use crate::state::AppState;

struct ResumeUpload {
    file_name: String,
    content_type: String,
    bytes: Bytes,
}

/// Body of a successful submit. The candidate's stored profile stays
/// server-side; only its id is returned.
#[derive(Debug, Serialize)]
pub struct SubmissionResponse {
    pub application: Application,
    pub candidate_id: Uuid,
}

impl From<&SubmissionReceipt> for SubmissionResponse {
    fn from(receipt: &SubmissionReceipt) -> Self {
        Self {
            application: receipt.application.clone(),
            candidate_id: receipt.candidate.id,
        }
    }
}

/// Text fields and the resume file from the application form.
#[derive(Default)]
struct ApplicationForm {
    email: String,
    full_name: String,
    phone_number: String,
    linkedin_profile: Option<String>,
    cover_letter: Option<String>,
    answers: Vec<RawAnswer>,
    additional_data: AdditionalData,
    resume: Option<ResumeUpload>,
}

fn bad_form(err: impl std::fmt::Display) -> AppError {
    AppError::Validation(format!("malformed form data: {err}"))
}

async fn read_form(mut multipart: Multipart, max_resume_bytes: usize) -> Result<ApplicationForm, AppError> {
    let mut form = ApplicationForm::default();

    while let Some(field) = multipart.next_field().await.map_err(bad_form)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "resume" => {
                let file_name = field.file_name().unwrap_or("resume.pdf").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await.map_err(bad_form)?;
                if bytes.len() > max_resume_bytes {
                    return Err(AppError::Validation(format!(
                        "resume exceeds the {max_resume_bytes} byte limit"
                    )));
                }
                form.resume = Some(ResumeUpload {
                    file_name,
                    content_type,
                    bytes,
                });
            }
            "email" => form.email = field.text().await.map_err(bad_form)?,
            "full_name" => form.full_name = field.text().await.map_err(bad_form)?,
            "phone_number" => form.phone_number = field.text().await.map_err(bad_form)?,
            "linkedin_profile" => {
                form.linkedin_profile = Some(field.text().await.map_err(bad_form)?)
            }
            "cover_letter" => form.cover_letter = Some(field.text().await.map_err(bad_form)?),
            "answers" => {
                let raw = field.text().await.map_err(bad_form)?;
                form.answers = serde_json::from_str(&raw)
                    .map_err(|e| AppError::Validation(format!("answers: {e}")))?;
            }
            "additional_data" => {
                let raw = field.text().await.map_err(bad_form)?;
                form.additional_data = serde_json::from_str(&raw)
                    .map_err(|e| AppError::Validation(format!("additional_data: {e}")))?;
            }
            other => debug!("Ignoring unknown form field '{other}'"),
        }
    }

    Ok(form)
}

/// POST /api/v1/jobs/:id/applications
///
/// Turns away known duplicates, uploads the resume, commits the submission,
/// then hands the confirmation email and analysis dispatch to a background task.
pub async fn handle_submit_application(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<SubmissionResponse>), AppError> {
    let job = get_job(state.store.as_ref(), job_id).await?;
    if job.status == JobStatus::Closed {
        return Err(AppError::UnprocessableEntity(format!(
            "job {job_id} is no longer accepting applications"
        )));
    }

    let form = read_form(multipart, state.max_resume_bytes).await?;
    let answers = snapshot_answers(&job, &form.answers)?;

    let mut submission = Submission {
        job_id,
        email: form.email,
        full_name: form.full_name,
        phone_number: form.phone_number,
        linkedin_profile: form.linkedin_profile,
        resume_url: String::new(),
        cover_letter: form.cover_letter,
        additional_data: form.additional_data,
        answers,
        submitted_at: None,
    };
    submission.validate_fields()?;
    state.submissions.ensure_not_applied(&submission).await?;

    let resume = form
        .resume
        .ok_or_else(|| AppError::Validation("a resume is required".to_string()))?;
    let owner_path = format!(
        "{}{}",
        job_folder(&job.company_name, &job.title),
        sanitize_identifier(&normalize_email(&submission.email))
    );
    submission.resume_url = state
        .resumes
        .store(&owner_path, &resume.file_name, &resume.content_type, resume.bytes)
        .await?;

    let receipt = state.submissions.commit_submission(&submission).await?;
    let response = SubmissionResponse::from(&receipt);

    let service = state.submissions.clone();
    let background = receipt;
    tokio::spawn(async move {
        let report = service.dispatch_post_commit(&background).await;
        info!(
            application_id = %background.application.id,
            notified = report.notified,
            analysis_submitted = report.analysis_submitted,
            "Post-commit dispatch finished"
        );
    });

    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /api/v1/applications/:id
pub async fn handle_get_application(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Application>, AppError> {
    get_application(state.store.as_ref(), id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Application {id} not found")))
}

#[derive(Deserialize)]
pub struct StatusUpdate {
    pub status: ApplicationStatus,
}

/// PATCH /api/v1/applications/:id/status
pub async fn handle_update_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<StatusUpdate>,
) -> Result<Json<Application>, AppError> {
    update_status(state.store.as_ref(), id, req.status)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Application {id} not found")))
}

/// GET /api/v1/candidates/:id
pub async fn handle_get_candidate(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Candidate>, AppError> {
    get_candidate(state.store.as_ref(), id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Candidate {id} not found")))
}

/// GET /api/v1/candidates/:id/applications
pub async fn handle_candidate_applications(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Application>>, AppError> {
    applications_for_candidate(state.store.as_ref(), id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Candidate {id} not found")))
}
