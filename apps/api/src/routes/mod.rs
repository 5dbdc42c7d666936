pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, patch, post},
    Router,
};

use crate::applications::handlers as applications;
use crate::jobs::handlers as jobs;
use crate::notes::handlers as notes;
use crate::state::AppState;

/// Headroom above the resume limit for the text fields of the form.
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.max_resume_bytes + FORM_OVERHEAD_BYTES;

    Router::new()
        .route("/health", get(health::health_handler))
        // Jobs
        .route("/api/v1/jobs", post(jobs::handle_create_job))
        .route(
            "/api/v1/jobs/:id",
            get(jobs::handle_get_job)
                .patch(jobs::handle_update_job)
                .delete(jobs::handle_delete_job),
        )
        .route("/api/v1/jobs/:id/status", patch(jobs::handle_update_job_status))
        .route(
            "/api/v1/jobs/:id/applications",
            post(applications::handle_submit_application).get(jobs::handle_list_applications),
        )
        // Applications & candidates
        .route(
            "/api/v1/applications/:id",
            get(applications::handle_get_application),
        )
        .route(
            "/api/v1/applications/:id/status",
            patch(applications::handle_update_status),
        )
        .route(
            "/api/v1/candidates/:id",
            get(applications::handle_get_candidate),
        )
        .route(
            "/api/v1/candidates/:id/applications",
            get(applications::handle_candidate_applications),
        )
        // Agencies
        .route("/api/v1/agencies/:id/jobs", get(jobs::handle_agency_jobs))
        .route(
            "/api/v1/agencies/:id/applications",
            get(jobs::handle_agency_applications),
        )
        // Notes
        .route(
            "/api/v1/applications/:id/notes",
            post(notes::handle_add_note).get(notes::handle_list_notes),
        )
        .route(
            "/api/v1/notes/:id/reactions",
            post(notes::handle_add_reaction),
        )
        .route("/api/v1/notes/:id/replies", post(notes::handle_add_reply))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;
    use crate::models::JobStatus;
    use crate::store::MemoryStore;
    use crate::test_support::{open_job, question, seed_job, Harness, MemoryResumeStorage};

    const BOUNDARY: &str = "desky-test-boundary";

    struct TestApp {
        harness: Harness,
        resumes: Arc<MemoryResumeStorage>,
        router: Router,
    }

    impl TestApp {
        fn new() -> Self {
            let harness = Harness::new();
            let resumes = Arc::new(MemoryResumeStorage::default());
            let state = AppState {
                store: Arc::new(harness.store.clone()),
                resumes: resumes.clone(),
                submissions: harness.service.clone(),
                max_resume_bytes: 1024,
            };
            Self {
                harness,
                resumes,
                router: build_router(state),
            }
        }

        fn store(&self) -> &MemoryStore {
            &self.harness.store
        }

        async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
            let response = self.router.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let body = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap()
            };
            (status, body)
        }

        async fn json(&self, method: Method, uri: &str, body: Value) -> (StatusCode, Value) {
            self.send(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
        }

        async fn get(&self, uri: &str) -> (StatusCode, Value) {
            self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
        }

        async fn submit(
            &self,
            job_id: Uuid,
            fields: &[(&str, &str)],
            resume: Option<&[u8]>,
        ) -> (StatusCode, Value) {
            self.send(
                Request::builder()
                    .method(Method::POST)
                    .uri(format!("/api/v1/jobs/{job_id}/applications"))
                    .header(
                        header::CONTENT_TYPE,
                        format!("multipart/form-data; boundary={BOUNDARY}"),
                    )
                    .body(Body::from(multipart_body(fields, resume)))
                    .unwrap(),
            )
            .await
        }
    }

    fn multipart_body(fields: &[(&str, &str)], resume: Option<&[u8]>) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        if let Some(bytes) = resume {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"resume\"; filename=\"Ada CV.pdf\"\r\nContent-Type: application/pdf\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn ada() -> Vec<(&'static str, &'static str)> {
        vec![
            ("email", "Ada@Example.com"),
            ("full_name", "Ada Lovelace"),
            ("phone_number", "555-0100"),
            ("answers", r#"[{"question_id":"q1","answer":"The mission"}]"#),
            ("additional_data", r#"{"source":"referral"}"#),
        ]
    }

    async fn seeded_job(app: &TestApp) -> crate::models::Job {
        let job = open_job(vec![question("q1", "Why Acme?", true)]);
        seed_job(app.store(), &job).await;
        job
    }

    #[tokio::test]
    async fn test_health() {
        let app = TestApp::new();
        let (status, body) = app.get("/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["service"], "desky-api");
    }

    #[tokio::test]
    async fn test_submit_application_returns_created_application() {
        let app = TestApp::new();
        let job = seeded_job(&app).await;

        let (status, body) = app.submit(job.id, &ada(), Some(b"%PDF-1.4 cv".as_slice())).await;

        assert_eq!(status, StatusCode::CREATED);
        let candidate = app
            .store()
            .committed_candidate_by_email("ada@example.com")
            .unwrap();
        assert_eq!(body["candidate_id"], candidate.id.to_string());
        assert_eq!(body["application"]["status"], "submitted");
        assert_eq!(body["application"]["answers"][0]["question"], "Why Acme?");
        assert_eq!(body["application"]["additional_data"]["source"], "referral");

        let objects = app.resumes.objects();
        assert_eq!(objects.len(), 1);
        assert!(objects[0]
            .0
            .starts_with("acme-corp/backend-engineer/ada-example-com/"));
        let resume_url = body["application"]["resume_url"].as_str().unwrap();
        assert!(resume_url.starts_with("memory://resumes/acme-corp/backend-engineer/"));
    }

    #[tokio::test]
    async fn test_second_submission_to_same_job_conflicts() {
        let app = TestApp::new();
        let job = seeded_job(&app).await;
        app.submit(job.id, &ada(), Some(b"cv".as_slice())).await;

        let (status, body) = app.submit(job.id, &ada(), Some(b"cv".as_slice())).await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "CONFLICT");
        assert_eq!(app.store().committed_applications().len(), 1);
        assert_eq!(app.resumes.objects().len(), 1);
    }

    #[tokio::test]
    async fn test_repeat_submitter_does_not_see_stored_profile() {
        let app = TestApp::new();
        let first = seeded_job(&app).await;
        let second = seeded_job(&app).await;
        let original = [
            ("email", "ada@example.com"),
            ("full_name", "Ada Lovelace"),
            ("phone_number", "555-SECRET"),
            ("linkedin_profile", "https://linkedin.com/in/ada-private"),
            ("answers", r#"[{"question_id":"q1","answer":"The mission"}]"#),
        ];
        app.submit(first.id, &original, Some(b"cv".as_slice())).await;

        let other = [
            ("email", "ADA@example.com"),
            ("full_name", "Someone Else"),
            ("phone_number", "555-0199"),
            ("answers", r#"[{"question_id":"q1","answer":"Curious"}]"#),
        ];
        let (status, body) = app.submit(second.id, &other, Some(b"cv".as_slice())).await;

        assert_eq!(status, StatusCode::CREATED);
        assert!(body.get("candidate").is_none());
        let text = body.to_string();
        for private in ["555-SECRET", "Ada Lovelace", "ada-private", "ada@example.com"] {
            assert!(!text.contains(private), "response exposes {private}");
        }
        let stored = app
            .store()
            .committed_candidate_by_email("ada@example.com")
            .unwrap();
        assert_eq!(body["candidate_id"], stored.id.to_string());
    }

    #[tokio::test]
    async fn test_submission_without_resume_is_rejected_before_upload() {
        let app = TestApp::new();
        let job = seeded_job(&app).await;

        let (status, _) = app.submit(job.id, &ada(), None).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(app.store().committed_candidates().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_email_uploads_nothing() {
        let app = TestApp::new();
        let job = seeded_job(&app).await;
        let mut fields = ada();
        fields[0] = ("email", "nobody");

        let (status, body) = app.submit(job.id, &fields, Some(b"cv".as_slice())).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert!(app.resumes.objects().is_empty());
    }

    #[tokio::test]
    async fn test_missing_required_answer_is_rejected() {
        let app = TestApp::new();
        let job = seeded_job(&app).await;
        let fields: Vec<_> = ada().into_iter().filter(|(k, _)| *k != "answers").collect();

        let (status, _) = app.submit(job.id, &fields, Some(b"cv".as_slice())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_oversized_resume_is_rejected() {
        let app = TestApp::new();
        let job = seeded_job(&app).await;

        let (status, _) = app.submit(job.id, &ada(), Some([b'x'; 2048].as_slice())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(app.store().committed_applications().is_empty());
    }

    #[tokio::test]
    async fn test_submission_to_unknown_or_closed_job() {
        let app = TestApp::new();
        let (status, _) = app.submit(Uuid::new_v4(), &ada(), Some(b"cv".as_slice())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let mut closed = open_job(vec![]);
        closed.status = JobStatus::Closed;
        seed_job(app.store(), &closed).await;
        let (status, _) = app.submit(closed.id, &ada(), Some(b"cv".as_slice())).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_status_update_and_lookups() {
        let app = TestApp::new();
        let job = seeded_job(&app).await;
        let (_, receipt) = app.submit(job.id, &ada(), Some(b"cv".as_slice())).await;
        let application_id = receipt["application"]["id"].as_str().unwrap().to_string();
        let candidate_id = receipt["candidate_id"].as_str().unwrap().to_string();

        let (status, body) = app
            .json(
                Method::PATCH,
                &format!("/api/v1/applications/{application_id}/status"),
                json!({ "status": "shortlisted" }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "shortlisted");

        let (status, body) = app
            .get(&format!("/api/v1/applications/{application_id}"))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "shortlisted");

        let (status, body) = app.get(&format!("/api/v1/candidates/{candidate_id}")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["application_ids"][0], application_id.as_str());

        let (status, body) = app
            .get(&format!("/api/v1/candidates/{candidate_id}/applications"))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["id"], application_id.as_str());
        assert_eq!(body[0]["status"], "shortlisted");

        let (status, _) = app
            .get(&format!("/api/v1/candidates/{}/applications", Uuid::new_v4()))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = app
            .get(&format!("/api/v1/jobs/{}/applications", job.id))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);

        let (status, _) = app
            .get(&format!("/api/v1/applications/{}", Uuid::new_v4()))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_job_lifecycle() {
        let app = TestApp::new();
        let (status, job) = app
            .json(
                Method::POST,
                "/api/v1/jobs",
                json!({
                    "agency_id": Uuid::new_v4(),
                    "title": "Data Engineer",
                    "company_name": "Globex",
                    "questions": [{ "id": "q1", "question": "Why Globex?", "type": "text", "is_required": false }]
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(app.resumes.folders(), vec!["globex/data-engineer/".to_string()]);
        let job_id = job["id"].as_str().unwrap().to_string();

        let (status, body) = app.get(&format!("/api/v1/jobs/{job_id}")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "Data Engineer");

        let (status, report) = app
            .send(
                Request::builder()
                    .method(Method::DELETE)
                    .uri(format!("/api/v1/jobs/{job_id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["applications_deleted"], 0);

        let (status, _) = app.get(&format!("/api/v1/jobs/{job_id}")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_closing_job_stops_submissions() {
        let app = TestApp::new();
        let job = seeded_job(&app).await;

        let (status, body) = app
            .json(
                Method::PATCH,
                &format!("/api/v1/jobs/{}/status", job.id),
                json!({ "status": "closed" }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "closed");

        let (status, _) = app.submit(job.id, &ada(), Some(b"cv".as_slice())).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(app.resumes.objects().is_empty());
    }

    #[tokio::test]
    async fn test_patch_job_edits_fields() {
        let app = TestApp::new();
        let job = seeded_job(&app).await;

        let (status, body) = app
            .json(
                Method::PATCH,
                &format!("/api/v1/jobs/{}", job.id),
                json!({ "description": "Own the ingestion pipeline", "skills": ["rust"] }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["description"], "Own the ingestion pipeline");
        assert_eq!(body["skills"][0], "rust");
        assert_eq!(body["title"], job.title.as_str());

        let (status, body) = app
            .json(
                Method::PATCH,
                &format!("/api/v1/jobs/{}", job.id),
                json!({ "title": "" }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        let (status, _) = app
            .json(
                Method::PATCH,
                &format!("/api/v1/jobs/{}/status", Uuid::new_v4()),
                json!({ "status": "closed" }),
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_agency_listings() {
        let app = TestApp::new();
        let agency = Uuid::new_v4();
        let mut owned = open_job(vec![question("q1", "Why Acme?", true)]);
        owned.agency_id = agency;
        seed_job(app.store(), &owned).await;
        let unrelated = seeded_job(&app).await;

        app.submit(owned.id, &ada(), Some(b"cv".as_slice())).await;
        app.submit(unrelated.id, &ada(), Some(b"cv".as_slice())).await;

        let (status, jobs) = app.get(&format!("/api/v1/agencies/{agency}/jobs")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(jobs.as_array().unwrap().len(), 1);
        assert_eq!(jobs[0]["id"], owned.id.to_string());

        let (status, applications) = app
            .get(&format!("/api/v1/agencies/{agency}/applications"))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(applications.as_array().unwrap().len(), 1);
        assert_eq!(applications[0]["job_id"], owned.id.to_string());
    }

    #[tokio::test]
    async fn test_notes_thread() {
        let app = TestApp::new();
        let job = seeded_job(&app).await;
        let (_, receipt) = app.submit(job.id, &ada(), Some(b"cv".as_slice())).await;
        let application_id = receipt["application"]["id"].as_str().unwrap().to_string();
        let author = Uuid::new_v4();

        let (status, note) = app
            .json(
                Method::POST,
                &format!("/api/v1/applications/{application_id}/notes"),
                json!({ "author_id": author, "content": "Strong systems background" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let note_id = note["id"].as_str().unwrap().to_string();

        let (status, reacted) = app
            .json(
                Method::POST,
                &format!("/api/v1/notes/{note_id}/reactions"),
                json!({ "member_id": author, "reaction": "thumbs_up" }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reacted["reactions"]["thumbs_up"].as_array().unwrap().len(), 1);

        let (status, _) = app
            .json(
                Method::POST,
                &format!("/api/v1/notes/{note_id}/replies"),
                json!({ "author_id": author, "content": "Agreed" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, notes) = app
            .get(&format!("/api/v1/applications/{application_id}/notes"))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(notes.as_array().unwrap().len(), 2);
    }
}
