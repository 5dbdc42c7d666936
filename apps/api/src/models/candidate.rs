use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A person who has applied to at least one job. One record per normalized email.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Candidate {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub phone_number: String,
    pub resume_url: String,
    pub linkedin_profile: Option<String>,
    /// Denormalized index of the candidate's applications. The application row owns the link.
    pub application_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Contact fields captured from the first submission that creates a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateProfile {
    pub full_name: String,
    pub phone_number: String,
    pub resume_url: String,
    pub linkedin_profile: Option<String>,
}

impl Candidate {
    /// Builds a fresh candidate with no applications. `email` must already be normalized.
    pub fn new(email: &str, profile: CandidateProfile) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.to_string(),
            full_name: profile.full_name,
            phone_number: profile.phone_number,
            resume_url: profile.resume_url,
            linkedin_profile: profile.linkedin_profile,
            application_ids: Vec::new(),
            created_at: Utc::now(),
        }
    }
}
