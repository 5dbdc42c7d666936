//! Candidate Registry: one candidate record per normalized email.

use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{Candidate, CandidateProfile};
use crate::store::{ApplicationStore, StoreError, StoreTx};

/// Returns the candidate registered under `email`, creating it from `profile` if absent.
///
/// `email` must already be normalized. An existing record is authoritative: the
/// profile from this submission is discarded. The boolean is `true` when this call
/// inserted the candidate. A concurrent creation of the same email surfaces as
/// `StoreError::UniqueViolation` on `candidates_email_key`.
pub async fn find_or_create_candidate(
    tx: &mut dyn StoreTx,
    email: &str,
    profile: CandidateProfile,
) -> Result<(Candidate, bool), StoreError> {
    if let Some(existing) = tx.find_candidate_by_email(email).await? {
        debug!(candidate_id = %existing.id, "Reusing existing candidate");
        return Ok((existing, false));
    }

    let candidate = Candidate::new(email, profile);
    tx.insert_candidate(&candidate).await?;
    info!(candidate_id = %candidate.id, "Created candidate");
    Ok((candidate, true))
}

pub async fn get_candidate(
    store: &dyn ApplicationStore,
    id: Uuid,
) -> Result<Option<Candidate>, StoreError> {
    let mut tx = store.begin().await?;
    let candidate = tx.get_candidate(id).await?;
    tx.commit().await?;
    Ok(candidate)
}
