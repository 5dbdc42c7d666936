//! Transactional storage seam.
//!
//! Every read and write goes through a `StoreTx`. A transaction that is dropped
//! without `commit` is rolled back, so early returns via `?` never leave partial
//! writes behind.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Application, ApplicationStatus, Candidate, Job, Note, UnknownVariant};

pub use memory::{FailPoint, MemoryStore};
pub use postgres::PgStore;

/// Unique constraint on `candidates.email`.
pub const CANDIDATE_EMAIL_KEY: &str = "candidates_email_key";
/// Unique constraint on `applications (candidate_id, job_id)`.
pub const APPLICATION_PAIR_KEY: &str = "applications_candidate_id_job_id_key";
pub const APPLICATION_CANDIDATE_FKEY: &str = "applications_candidate_id_fkey";
pub const APPLICATION_JOB_FKEY: &str = "applications_job_id_fkey";
pub const NOTE_APPLICATION_FKEY: &str = "notes_application_id_fkey";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint '{constraint}' violated")]
    UniqueViolation { constraint: String },

    #[error("foreign key constraint '{constraint}' violated")]
    ForeignKeyViolation { constraint: String },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("corrupt row: {0}")]
    Corrupt(#[from] UnknownVariant),

    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl StoreError {
    pub fn violates(&self, name: &str) -> bool {
        matches!(self, StoreError::UniqueViolation { constraint } if constraint == name)
    }
}

/// Entry point to the persistence layer.
#[async_trait]
pub trait ApplicationStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError>;
}

/// An open transaction. Writes become visible to other transactions only on `commit`.
#[async_trait]
pub trait StoreTx: Send {
    // Candidates
    async fn find_candidate_by_email(&mut self, email: &str) -> Result<Option<Candidate>, StoreError>;
    async fn get_candidate(&mut self, id: Uuid) -> Result<Option<Candidate>, StoreError>;
    async fn insert_candidate(&mut self, candidate: &Candidate) -> Result<(), StoreError>;
    /// Adds `application_id` to the candidate's back-reference list unless already present.
    async fn append_application_ref(
        &mut self,
        candidate_id: Uuid,
        application_id: Uuid,
    ) -> Result<(), StoreError>;
    async fn remove_application_ref(
        &mut self,
        candidate_id: Uuid,
        application_id: Uuid,
    ) -> Result<(), StoreError>;

    // Applications
    async fn find_application(
        &mut self,
        candidate_id: Uuid,
        job_id: Uuid,
    ) -> Result<Option<Application>, StoreError>;
    async fn get_application(&mut self, id: Uuid) -> Result<Option<Application>, StoreError>;
    async fn insert_application(&mut self, application: &Application) -> Result<(), StoreError>;
    async fn applications_for_job(&mut self, job_id: Uuid) -> Result<Vec<Application>, StoreError>;
    async fn applications_for_agency(
        &mut self,
        agency_id: Uuid,
    ) -> Result<Vec<Application>, StoreError>;
    async fn update_application_status(
        &mut self,
        id: Uuid,
        status: ApplicationStatus,
    ) -> Result<Option<Application>, StoreError>;
    async fn delete_application(&mut self, id: Uuid) -> Result<(), StoreError>;

    // Jobs
    async fn insert_job(&mut self, job: &Job) -> Result<(), StoreError>;
    async fn get_job(&mut self, id: Uuid) -> Result<Option<Job>, StoreError>;
    /// Replaces the stored row; `false` when no job has that id.
    async fn update_job(&mut self, job: &Job) -> Result<bool, StoreError>;
    async fn jobs_for_agency(&mut self, agency_id: Uuid) -> Result<Vec<Job>, StoreError>;
    async fn delete_job(&mut self, id: Uuid) -> Result<bool, StoreError>;

    // Notes
    async fn insert_note(&mut self, note: &Note) -> Result<(), StoreError>;
    async fn get_note(&mut self, id: Uuid) -> Result<Option<Note>, StoreError>;
    async fn notes_for_application(&mut self, application_id: Uuid) -> Result<Vec<Note>, StoreError>;
    /// Adds `member_id` under `reaction` without touching other members'
    /// entries. Adding an existing member is a no-op.
    async fn add_reaction(
        &mut self,
        note_id: Uuid,
        reaction: &str,
        member_id: Uuid,
    ) -> Result<(), StoreError>;
    async fn append_reply(&mut self, parent_id: Uuid, reply_id: Uuid) -> Result<(), StoreError>;
    async fn delete_notes_for_application(&mut self, application_id: Uuid) -> Result<u64, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}
