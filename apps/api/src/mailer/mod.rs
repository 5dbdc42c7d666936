//! Mailer: outbound email through an HTTP mail API.
//!
//! Delivery is best-effort from the caller's point of view: submission code logs
//! a `NotificationError` and moves on.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("mail API error (status {status}): {message}")]
    Api { status: u16, message: String },
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), NotificationError>;
}

#[derive(Debug, Serialize)]
struct MailRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

/// Sends plain-text mail by POSTing JSON to the configured mail API endpoint.
#[derive(Clone)]
pub struct HttpMailer {
    client: Client,
    endpoint: String,
    api_key: String,
    from: String,
}

impl HttpMailer {
    pub fn new(endpoint: String, api_key: String, from: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("Failed to build HTTP client"),
            endpoint,
            api_key,
            from,
        }
    }
}

#[async_trait]
impl Notifier for HttpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), NotificationError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&MailRequest {
                from: &self.from,
                to,
                subject,
                text: body,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(NotificationError::Api {
                status: status.as_u16(),
                message,
            });
        }

        debug!(status = status.as_u16(), "Mail API accepted message");
        Ok(())
    }
}

/// Subject and body of the confirmation sent after an application is committed.
pub fn application_confirmation(candidate_name: &str, job_title: Option<&str>) -> (String, String) {
    let role = job_title.unwrap_or("the position");
    let subject = format!("We received your application for {role}");
    let body = format!(
        "Hi {candidate_name},\n\n\
        Thank you for applying for {role}. Your application has been received \
        and the hiring team will review it shortly.\n\n\
        Best regards,\nThe Hiring Team"
    );
    (subject, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn mailer(server: &MockServer) -> HttpMailer {
        HttpMailer::new(
            format!("{}/send", server.uri()),
            "mail-key".to_string(),
            "no-reply@desky.app".to_string(),
        )
    }

    #[tokio::test]
    async fn test_send_posts_message_with_bearer_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/send"))
            .and(header("authorization", "Bearer mail-key"))
            .and(body_partial_json(serde_json::json!({
                "from": "no-reply@desky.app",
                "to": "a@x.com",
                "subject": "Hello"
            })))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        mailer(&server)
            .send("a@x.com", "Hello", "Body")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_non_success_status_is_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("smtp relay down"))
            .mount(&server)
            .await;

        let err = mailer(&server)
            .send("a@x.com", "Hello", "Body")
            .await
            .unwrap_err();
        match err {
            NotificationError::Api { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "smtp relay down");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn test_confirmation_mentions_role_and_name() {
        let (subject, body) = application_confirmation("Ada", Some("Backend Engineer"));
        assert_eq!(subject, "We received your application for Backend Engineer");
        assert!(body.starts_with("Hi Ada,"));
        assert!(body.contains("Backend Engineer"));
    }

    #[test]
    fn test_confirmation_without_job_title() {
        let (subject, _) = application_confirmation("Ada", None);
        assert_eq!(subject, "We received your application for the position");
    }
}
