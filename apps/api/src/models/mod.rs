pub mod application;
pub mod candidate;
pub mod job;
pub mod note;

pub use application::{AdditionalData, Answer, Application, ApplicationStatus};
pub use candidate::{Candidate, CandidateProfile};
pub use job::{Job, JobQuestion, JobStatus};
pub use note::Note;

/// A stored enum column held a value outside its known variants.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}
