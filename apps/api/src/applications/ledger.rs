//! Application Ledger: at most one application per (candidate, job) pair.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::models::{AdditionalData, Answer, Application, ApplicationStatus};
use crate::store::{ApplicationStore, StoreError, StoreTx, APPLICATION_PAIR_KEY};

/// Submission content stored on the application record.
#[derive(Debug, Clone, Default)]
pub struct ApplicationPayload {
    /// Defaults to `Submitted`.
    pub status: Option<ApplicationStatus>,
    pub resume_url: String,
    pub cover_letter: Option<String>,
    pub additional_data: AdditionalData,
    pub answers: Vec<Answer>,
    /// Defaults to the current time.
    pub submitted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("candidate {candidate_id} has already applied to job {job_id}")]
    Duplicate { candidate_id: Uuid, job_id: Uuid },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Records a new application and links it from the candidate, inside `tx`.
///
/// The lookup before the insert is a fast path only. The storage-level unique
/// constraint decides, and its violation is reported as `LedgerError::Duplicate`.
pub async fn record_application(
    tx: &mut dyn StoreTx,
    candidate_id: Uuid,
    job_id: Uuid,
    payload: ApplicationPayload,
) -> Result<Application, LedgerError> {
    if tx.find_application(candidate_id, job_id).await?.is_some() {
        return Err(LedgerError::Duplicate {
            candidate_id,
            job_id,
        });
    }

    let application = Application {
        id: Uuid::new_v4(),
        candidate_id,
        job_id,
        status: payload.status.unwrap_or_default(),
        resume_url: payload.resume_url,
        cover_letter: payload.cover_letter,
        additional_data: payload.additional_data,
        answers: payload.answers,
        submitted_at: payload.submitted_at.unwrap_or_else(Utc::now),
    };

    match tx.insert_application(&application).await {
        Err(err) if err.violates(APPLICATION_PAIR_KEY) => {
            return Err(LedgerError::Duplicate {
                candidate_id,
                job_id,
            })
        }
        result => result?,
    }

    tx.append_application_ref(candidate_id, application.id)
        .await?;

    info!(
        application_id = %application.id,
        %candidate_id,
        %job_id,
        "Recorded application"
    );
    Ok(application)
}

pub async fn get_application(
    store: &dyn ApplicationStore,
    id: Uuid,
) -> Result<Option<Application>, StoreError> {
    let mut tx = store.begin().await?;
    let application = tx.get_application(id).await?;
    tx.commit().await?;
    Ok(application)
}

pub async fn applications_for_job(
    store: &dyn ApplicationStore,
    job_id: Uuid,
) -> Result<Vec<Application>, StoreError> {
    let mut tx = store.begin().await?;
    let applications = tx.applications_for_job(job_id).await?;
    tx.commit().await?;
    Ok(applications)
}

/// Follows the candidate's back-reference list. `None` if the candidate does not exist.
pub async fn applications_for_candidate(
    store: &dyn ApplicationStore,
    candidate_id: Uuid,
) -> Result<Option<Vec<Application>>, StoreError> {
    let mut tx = store.begin().await?;
    let Some(candidate) = tx.get_candidate(candidate_id).await? else {
        tx.rollback().await?;
        return Ok(None);
    };
    let mut applications = Vec::with_capacity(candidate.application_ids.len());
    for id in &candidate.application_ids {
        let application = tx.get_application(*id).await?.ok_or(StoreError::NotFound {
            entity: "application",
            id: *id,
        })?;
        applications.push(application);
    }
    tx.commit().await?;
    Ok(Some(applications))
}

pub async fn applications_for_agency(
    store: &dyn ApplicationStore,
    agency_id: Uuid,
) -> Result<Vec<Application>, StoreError> {
    let mut tx = store.begin().await?;
    let applications = tx.applications_for_agency(agency_id).await?;
    tx.commit().await?;
    Ok(applications)
}

/// Moves an application to `status`. Returns `None` if the application does not exist.
pub async fn update_status(
    store: &dyn ApplicationStore,
    id: Uuid,
    status: ApplicationStatus,
) -> Result<Option<Application>, StoreError> {
    let mut tx = store.begin().await?;
    let updated = tx.update_application_status(id, status).await?;
    tx.commit().await?;
    if updated.is_some() {
        info!(application_id = %id, %status, "Application status updated");
    }
    Ok(updated)
}
