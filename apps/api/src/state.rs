use std::sync::Arc;

use crate::applications::submission::SubmissionService;
use crate::resume_storage::ResumeStorage;
use crate::store::ApplicationStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ApplicationStore>,
    pub resumes: Arc<dyn ResumeStorage>,
    pub submissions: SubmissionService,
    /// Upper bound on an uploaded resume, also applied as the request body limit.
    pub max_resume_bytes: usize,
}
