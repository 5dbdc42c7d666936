//! Fakes for the external collaborators, shared by unit tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use uuid::Uuid;

use crate::analysis_client::{AnalysisDispatchError, AnalysisDispatcher};
use crate::applications::submission::SubmissionService;
use crate::mailer::{NotificationError, Notifier};
use crate::models::{Job, JobQuestion, JobStatus};
use crate::resume_storage::{object_key, ResumeStorage, ResumeStorageError};
use crate::store::{ApplicationStore, MemoryStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<SentMail>>,
    pub fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), NotificationError> {
        if self.fail {
            return Err(NotificationError::Api {
                status: 503,
                message: "mail relay unavailable".to_string(),
            });
        }
        self.sent.lock().unwrap().push(SentMail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingAnalysis {
    pub submitted: Mutex<Vec<(Uuid, String, String)>>,
    pub fail: bool,
}

impl RecordingAnalysis {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn submitted(&self) -> Vec<(Uuid, String, String)> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl AnalysisDispatcher for RecordingAnalysis {
    async fn submit(
        &self,
        application_id: Uuid,
        file_reference: &str,
        job_reference: &str,
    ) -> Result<(), AnalysisDispatchError> {
        if self.fail {
            return Err(AnalysisDispatchError::Exhausted { retries: 3 });
        }
        self.submitted.lock().unwrap().push((
            application_id,
            file_reference.to_string(),
            job_reference.to_string(),
        ));
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryResumeStorage {
    pub objects: Mutex<Vec<(String, usize)>>,
    pub folders: Mutex<Vec<String>>,
}

impl MemoryResumeStorage {
    pub fn objects(&self) -> Vec<(String, usize)> {
        self.objects.lock().unwrap().clone()
    }

    pub fn folders(&self) -> Vec<String> {
        self.folders.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResumeStorage for MemoryResumeStorage {
    async fn store(
        &self,
        owner_path: &str,
        file_name: &str,
        _content_type: &str,
        bytes: Bytes,
    ) -> Result<String, ResumeStorageError> {
        if bytes.is_empty() {
            return Err(ResumeStorageError::Empty);
        }
        let key = object_key(owner_path, file_name);
        self.objects.lock().unwrap().push((key.clone(), bytes.len()));
        Ok(format!("memory://resumes/{key}"))
    }

    async fn create_folder(&self, path: &str) -> Result<String, ResumeStorageError> {
        self.folders.lock().unwrap().push(path.to_string());
        Ok(path.to_string())
    }
}

pub fn question(id: &str, text: &str, is_required: bool) -> JobQuestion {
    JobQuestion {
        id: id.to_string(),
        question: text.to_string(),
        kind: "text".to_string(),
        options: vec![],
        is_required,
    }
}

pub fn open_job(questions: Vec<JobQuestion>) -> Job {
    Job {
        id: Uuid::new_v4(),
        agency_id: Uuid::new_v4(),
        title: "Backend Engineer".to_string(),
        company_name: "Acme Corp".to_string(),
        department: "Engineering".to_string(),
        description: "Build the hiring platform.".to_string(),
        skills: vec!["rust".to_string(), "postgres".to_string()],
        status: JobStatus::Open,
        questions,
        created_at: Utc::now(),
    }
}

pub async fn seed_job(store: &MemoryStore, job: &Job) {
    let mut tx = store.begin().await.unwrap();
    tx.insert_job(job).await.unwrap();
    tx.commit().await.unwrap();
}

/// Service wired to a memory store and recording collaborators.
pub struct Harness {
    pub store: MemoryStore,
    pub notifier: Arc<RecordingNotifier>,
    pub analysis: Arc<RecordingAnalysis>,
    pub service: SubmissionService,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(RecordingNotifier::default(), RecordingAnalysis::default())
    }

    pub fn with(notifier: RecordingNotifier, analysis: RecordingAnalysis) -> Self {
        let store = MemoryStore::new();
        let notifier = Arc::new(notifier);
        let analysis = Arc::new(analysis);
        let service = SubmissionService::new(
            Arc::new(store.clone()),
            notifier.clone(),
            analysis.clone(),
        );
        Self {
            store,
            notifier,
            analysis,
            service,
        }
    }
}
