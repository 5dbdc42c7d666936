//! Submission coordinator: turns one application form into a committed
//! candidate + application pair, atomically.
//!
//! Flow: validate → begin → find_or_create_candidate → record_application
//!       (duplicate check, insert, back-reference) → commit → post-commit dispatch.
//!
//! Nothing from a failed submission becomes visible. Notification and analysis
//! run only after commit and cannot undo it.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::analysis_client::AnalysisDispatcher;
use crate::applications::ledger::{record_application, ApplicationPayload, LedgerError};
use crate::applications::registry::find_or_create_candidate;
use crate::mailer::{application_confirmation, Notifier};
use crate::models::{AdditionalData, Answer, Application, Candidate, CandidateProfile, Job};
use crate::store::{ApplicationStore, StoreError, APPLICATION_PAIR_KEY, CANDIDATE_EMAIL_KEY};

/// Whole-transaction attempts when a concurrent submission creates the same candidate first.
const MAX_SUBMIT_ATTEMPTS: u32 = 3;

// ────────────────────────────────────────────────────────────────────────────
// Data models
// ────────────────────────────────────────────────────────────────────────────

/// One application form, after the resume has been stored.
#[derive(Debug, Clone, Deserialize)]
pub struct Submission {
    pub job_id: Uuid,
    pub email: String,
    pub full_name: String,
    pub phone_number: String,
    #[serde(default)]
    pub linkedin_profile: Option<String>,
    pub resume_url: String,
    #[serde(default)]
    pub cover_letter: Option<String>,
    #[serde(default)]
    pub additional_data: AdditionalData,
    #[serde(default)]
    pub answers: Vec<Answer>,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
}

/// An answer as typed by the candidate, before the question text is attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAnswer {
    pub question_id: String,
    pub answer: String,
}

/// Result of a committed submission. Carries the stored candidate, so it
/// stays server-side; HTTP callers get `SubmissionResponse`.
#[derive(Debug, Clone)]
pub struct SubmissionReceipt {
    pub application: Application,
    /// Candidate as committed, including the new back-reference.
    pub candidate: Candidate,
    pub candidate_created: bool,
    pub job_title: Option<String>,
}

/// What the best-effort phase managed to do. Never affects the submission outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PostCommitReport {
    pub notified: bool,
    pub analysis_submitted: bool,
}

#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("candidate {candidate_id} has already applied to job {job_id}")]
    DuplicateApplication { candidate_id: Uuid, job_id: Uuid },

    #[error("concurrent creation of candidate '{email}' could not be resolved")]
    DuplicateKey { email: String },

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

impl From<LedgerError> for SubmissionError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Duplicate {
                candidate_id,
                job_id,
            } => SubmissionError::DuplicateApplication {
                candidate_id,
                job_id,
            },
            LedgerError::Store(e) => SubmissionError::Storage(e),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Validation
// ────────────────────────────────────────────────────────────────────────────

/// Trims and lowercases an email address.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    }
}

impl Submission {
    /// Validates everything except the resume reference, which the HTTP layer
    /// only obtains after upload.
    pub fn validate_fields(&self) -> Result<(), SubmissionError> {
        let email = normalize_email(&self.email);
        if email.is_empty() {
            return Err(SubmissionError::Validation("email is required".to_string()));
        }
        if !is_plausible_email(&email) {
            return Err(SubmissionError::Validation(format!(
                "'{}' is not a valid email address",
                self.email.trim()
            )));
        }
        if self.full_name.trim().is_empty() {
            return Err(SubmissionError::Validation("full_name is required".to_string()));
        }
        if self.phone_number.trim().is_empty() {
            return Err(SubmissionError::Validation(
                "phone_number is required".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for answer in &self.answers {
            if answer.question_id.trim().is_empty() {
                return Err(SubmissionError::Validation(
                    "every answer needs a question_id".to_string(),
                ));
            }
            if !seen.insert(answer.question_id.as_str()) {
                return Err(SubmissionError::Validation(format!(
                    "question '{}' answered more than once",
                    answer.question_id
                )));
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), SubmissionError> {
        self.validate_fields()?;
        if self.resume_url.trim().is_empty() {
            return Err(SubmissionError::Validation("a resume is required".to_string()));
        }
        Ok(())
    }

    fn profile(&self) -> CandidateProfile {
        CandidateProfile {
            full_name: self.full_name.trim().to_string(),
            phone_number: self.phone_number.trim().to_string(),
            resume_url: self.resume_url.clone(),
            linkedin_profile: self
                .linkedin_profile
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from),
        }
    }

    fn payload(&self) -> ApplicationPayload {
        ApplicationPayload {
            status: None,
            resume_url: self.resume_url.clone(),
            cover_letter: self
                .cover_letter
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from),
            additional_data: self.additional_data.clone(),
            answers: self.answers.clone(),
            submitted_at: self.submitted_at,
        }
    }
}

/// Attaches each question's current text to the candidate's answers.
///
/// Rejects answers to questions the job does not have and required questions
/// left blank.
pub fn snapshot_answers(job: &Job, raw: &[RawAnswer]) -> Result<Vec<Answer>, SubmissionError> {
    let mut answers = Vec::with_capacity(raw.len());
    for entry in raw {
        let question = job.question(&entry.question_id).ok_or_else(|| {
            SubmissionError::Validation(format!(
                "job has no question '{}'",
                entry.question_id
            ))
        })?;
        answers.push(Answer {
            question_id: question.id.clone(),
            question: question.question.clone(),
            answer: entry.answer.trim().to_string(),
        });
    }

    for question in job.questions.iter().filter(|q| q.is_required) {
        let answered = answers
            .iter()
            .any(|a| a.question_id == question.id && !a.answer.is_empty());
        if !answered {
            return Err(SubmissionError::Validation(format!(
                "required question '{}' was not answered",
                question.question
            )));
        }
    }
    Ok(answers)
}

// ────────────────────────────────────────────────────────────────────────────
// Coordinator
// ────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct SubmissionService {
    store: Arc<dyn ApplicationStore>,
    notifier: Arc<dyn Notifier>,
    analysis: Arc<dyn AnalysisDispatcher>,
}

impl SubmissionService {
    pub fn new(
        store: Arc<dyn ApplicationStore>,
        notifier: Arc<dyn Notifier>,
        analysis: Arc<dyn AnalysisDispatcher>,
    ) -> Self {
        Self {
            store,
            notifier,
            analysis,
        }
    }

    /// Commits the submission, then runs the best-effort phase before returning.
    #[cfg(test)]
    pub async fn submit_application(
        &self,
        submission: Submission,
    ) -> Result<(SubmissionReceipt, PostCommitReport), SubmissionError> {
        let receipt = self.commit_submission(&submission).await?;
        let report = self.dispatch_post_commit(&receipt).await;
        Ok((receipt, report))
    }

    /// Runs validation and the atomic unit: candidate, duplicate check,
    /// application, back-reference. Either all of it commits or none of it does.
    pub async fn commit_submission(
        &self,
        submission: &Submission,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        submission.validate()?;
        let email = normalize_email(&submission.email);

        for attempt in 1..=MAX_SUBMIT_ATTEMPTS {
            match self.try_commit(&email, submission).await {
                Err(SubmissionError::Storage(err)) if err.violates(CANDIDATE_EMAIL_KEY) => {
                    warn!(
                        attempt,
                        job_id = %submission.job_id,
                        "Candidate was created by a concurrent submission, retrying"
                    );
                }
                result => return result,
            }
        }

        Err(SubmissionError::DuplicateKey { email })
    }

    /// Read-only duplicate check so a repeat submitter is turned away before
    /// their resume is uploaded. `commit_submission` still decides.
    pub async fn ensure_not_applied(&self, submission: &Submission) -> Result<(), SubmissionError> {
        let email = normalize_email(&submission.email);
        let mut tx = self.store.begin().await?;
        let existing = match tx.find_candidate_by_email(&email).await? {
            Some(candidate) => tx
                .find_application(candidate.id, submission.job_id)
                .await?
                .map(|application| application.candidate_id),
            None => None,
        };
        tx.rollback().await?;

        match existing {
            Some(candidate_id) => Err(SubmissionError::DuplicateApplication {
                candidate_id,
                job_id: submission.job_id,
            }),
            None => Ok(()),
        }
    }

    async fn try_commit(
        &self,
        email: &str,
        submission: &Submission,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        let job_id = submission.job_id;
        let mut tx = self.store.begin().await?;

        let (candidate, candidate_created) =
            find_or_create_candidate(tx.as_mut(), email, submission.profile()).await?;

        let application =
            record_application(tx.as_mut(), candidate.id, job_id, submission.payload()).await?;

        let candidate = tx
            .get_candidate(candidate.id)
            .await?
            .ok_or(StoreError::NotFound {
                entity: "candidate",
                id: candidate.id,
            })?;
        let job_title = tx.get_job(job_id).await?.map(|job| job.title);

        tx.commit().await.map_err(|err| {
            if err.violates(APPLICATION_PAIR_KEY) {
                SubmissionError::DuplicateApplication {
                    candidate_id: candidate.id,
                    job_id,
                }
            } else {
                SubmissionError::Storage(err)
            }
        })?;

        info!(
            application_id = %application.id,
            candidate_id = %candidate.id,
            %job_id,
            candidate_created,
            "Application submitted"
        );

        Ok(SubmissionReceipt {
            application,
            candidate,
            candidate_created,
            job_title,
        })
    }

    /// Sends the confirmation email and hands the application to analysis.
    /// Failures are logged and reported, never returned.
    pub async fn dispatch_post_commit(&self, receipt: &SubmissionReceipt) -> PostCommitReport {
        let application = &receipt.application;
        let candidate = &receipt.candidate;

        let (subject, body) =
            application_confirmation(&candidate.full_name, receipt.job_title.as_deref());
        let notified = match self.notifier.send(&candidate.email, &subject, &body).await {
            Ok(()) => {
                info!(application_id = %application.id, "Confirmation email sent");
                true
            }
            Err(e) => {
                warn!(
                    application_id = %application.id,
                    "Confirmation email failed: {e}"
                );
                false
            }
        };

        let analysis_submitted = match self
            .analysis
            .submit(
                application.id,
                &application.resume_url,
                &application.job_id.to_string(),
            )
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    application_id = %application.id,
                    "Analysis dispatch failed: {e}"
                );
                false
            }
        };

        PostCommitReport {
            notified,
            analysis_submitted,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
