//! Job postings: creation with a resume folder, edits, agency listings and
//! cascading delete.

pub mod handlers;

use std::collections::HashSet;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{Job, JobQuestion, JobStatus};
use crate::resume_storage::{job_folder, ResumeStorage};
use crate::store::{ApplicationStore, StoreError};

#[derive(Debug, Error)]
pub enum JobError {
    #[error("invalid job: {0}")]
    Invalid(String),

    #[error("job {0} not found")]
    NotFound(Uuid),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewJob {
    pub agency_id: Uuid,
    pub title: String,
    pub company_name: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub status: JobStatus,
    #[serde(default)]
    pub questions: Vec<JobQuestion>,
}

impl NewJob {
    pub fn validate(&self) -> Result<(), JobError> {
        if self.title.trim().is_empty() {
            return Err(JobError::Invalid("title is required".to_string()));
        }
        if self.company_name.trim().is_empty() {
            return Err(JobError::Invalid("company_name is required".to_string()));
        }
        validate_questions(&self.questions)
    }
}

fn validate_questions(questions: &[JobQuestion]) -> Result<(), JobError> {
    let mut ids = HashSet::new();
    for question in questions {
        if question.id.trim().is_empty() || question.question.trim().is_empty() {
            return Err(JobError::Invalid(
                "every question needs an id and text".to_string(),
            ));
        }
        if !ids.insert(question.id.as_str()) {
            return Err(JobError::Invalid(format!(
                "duplicate question id '{}'",
                question.id
            )));
        }
    }
    Ok(())
}

/// Partial edit of a posting. Absent fields keep their stored value.
/// The agency and company are fixed once the job exists.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobUpdate {
    pub title: Option<String>,
    pub department: Option<String>,
    pub description: Option<String>,
    pub skills: Option<Vec<String>>,
    pub status: Option<JobStatus>,
    pub questions: Option<Vec<JobQuestion>>,
}

impl JobUpdate {
    fn apply(self, job: &mut Job) -> Result<(), JobError> {
        if let Some(title) = self.title {
            let title = title.trim();
            if title.is_empty() {
                return Err(JobError::Invalid("title is required".to_string()));
            }
            job.title = title.to_string();
        }
        if let Some(department) = self.department {
            job.department = department;
        }
        if let Some(description) = self.description {
            job.description = description;
        }
        if let Some(skills) = self.skills {
            job.skills = skills;
        }
        if let Some(status) = self.status {
            job.status = status;
        }
        if let Some(questions) = self.questions {
            validate_questions(&questions)?;
            job.questions = questions;
        }
        Ok(())
    }
}

/// Outcome of `delete_job_cascade`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CascadeReport {
    pub job_id: Uuid,
    pub applications_deleted: usize,
    pub notes_deleted: u64,
    pub candidates_touched: usize,
}

/// Inserts the job, then creates its resume folder. A folder failure is logged only.
pub async fn create_job(
    store: &dyn ApplicationStore,
    resumes: &dyn ResumeStorage,
    new_job: NewJob,
) -> Result<Job, JobError> {
    new_job.validate()?;

    let job = Job {
        id: Uuid::new_v4(),
        agency_id: new_job.agency_id,
        title: new_job.title.trim().to_string(),
        company_name: new_job.company_name.trim().to_string(),
        department: new_job.department,
        description: new_job.description,
        skills: new_job.skills,
        status: new_job.status,
        questions: new_job.questions,
        created_at: Utc::now(),
    };

    let mut tx = store.begin().await?;
    tx.insert_job(&job).await?;
    tx.commit().await?;

    let folder = job_folder(&job.company_name, &job.title);
    if let Err(e) = resumes.create_folder(&folder).await {
        warn!(job_id = %job.id, "Could not create resume folder '{folder}': {e}");
    }

    info!(job_id = %job.id, title = %job.title, "Job created");
    Ok(job)
}

pub async fn get_job(store: &dyn ApplicationStore, id: Uuid) -> Result<Job, JobError> {
    let mut tx = store.begin().await?;
    let job = tx.get_job(id).await?;
    tx.commit().await?;
    job.ok_or(JobError::NotFound(id))
}

/// Applies `update` to the stored job and returns the result.
pub async fn update_job(
    store: &dyn ApplicationStore,
    id: Uuid,
    update: JobUpdate,
) -> Result<Job, JobError> {
    let mut tx = store.begin().await?;
    let mut job = tx.get_job(id).await?.ok_or(JobError::NotFound(id))?;
    update.apply(&mut job)?;
    if !tx.update_job(&job).await? {
        return Err(JobError::NotFound(id));
    }
    tx.commit().await?;

    info!(job_id = %id, status = job.status.as_str(), "Job updated");
    Ok(job)
}

/// Opens or closes a posting. Closed jobs refuse new submissions.
pub async fn update_job_status(
    store: &dyn ApplicationStore,
    id: Uuid,
    status: JobStatus,
) -> Result<Job, JobError> {
    let update = JobUpdate {
        status: Some(status),
        ..Default::default()
    };
    update_job(store, id, update).await
}

pub async fn jobs_for_agency(
    store: &dyn ApplicationStore,
    agency_id: Uuid,
) -> Result<Vec<Job>, JobError> {
    let mut tx = store.begin().await?;
    let jobs = tx.jobs_for_agency(agency_id).await?;
    tx.commit().await?;
    Ok(jobs)
}

/// Deletes a job with its applications and their notes, and unlinks those
/// applications from their candidates. Candidates survive. All in one transaction.
pub async fn delete_job_cascade(
    store: &dyn ApplicationStore,
    job_id: Uuid,
) -> Result<CascadeReport, JobError> {
    let mut tx = store.begin().await?;
    if tx.get_job(job_id).await?.is_none() {
        return Err(JobError::NotFound(job_id));
    }

    let applications = tx.applications_for_job(job_id).await?;
    let mut notes_deleted = 0;
    let mut candidates = HashSet::new();
    for application in &applications {
        notes_deleted += tx.delete_notes_for_application(application.id).await?;
        tx.remove_application_ref(application.candidate_id, application.id)
            .await?;
        tx.delete_application(application.id).await?;
        candidates.insert(application.candidate_id);
    }

    tx.delete_job(job_id).await?;
    tx.commit().await?;

    let report = CascadeReport {
        job_id,
        applications_deleted: applications.len(),
        notes_deleted,
        candidates_touched: candidates.len(),
    };
    info!(
        %job_id,
        applications = report.applications_deleted,
        notes = report.notes_deleted,
        "Job deleted"
    );
    Ok(report)
}
