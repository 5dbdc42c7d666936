//! Analysis client: hands committed applications to the external scoring service.
//!
//! Dispatch happens after commit and is best-effort: a failure is logged by the
//! caller and never affects the stored application.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

const MAX_RETRIES: u32 = 3;

#[derive(Debug, Error)]
pub enum AnalysisDispatchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("analysis API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("analysis service still failing after {retries} attempts")]
    Exhausted { retries: u32 },
}

#[async_trait]
pub trait AnalysisDispatcher: Send + Sync {
    async fn submit(
        &self,
        application_id: Uuid,
        file_reference: &str,
        job_reference: &str,
    ) -> Result<(), AnalysisDispatchError>;
}

#[derive(Debug, Serialize)]
struct AnalysisRequest<'a> {
    application_id: Uuid,
    file_reference: &'a str,
    job_reference: &'a str,
}

#[derive(Clone)]
pub struct HttpAnalysisClient {
    client: Client,
    endpoint: String,
    retry_base: Duration,
}

impl HttpAnalysisClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("Failed to build HTTP client"),
            endpoint: format!("{}/v1/applications", base_url.trim_end_matches('/')),
            retry_base: Duration::from_millis(1000),
        }
    }

    /// Overrides the first backoff delay; later delays double from it.
    #[cfg(test)]
    pub fn with_retry_base(mut self, retry_base: Duration) -> Self {
        self.retry_base = retry_base;
        self
    }
}

#[async_trait]
impl AnalysisDispatcher for HttpAnalysisClient {
    /// Retries on 429 and 5xx responses with exponential backoff.
    async fn submit(
        &self,
        application_id: Uuid,
        file_reference: &str,
        job_reference: &str,
    ) -> Result<(), AnalysisDispatchError> {
        let body = AnalysisRequest {
            application_id,
            file_reference,
            job_reference,
        };

        let mut last_error: Option<AnalysisDispatchError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                let delay = self.retry_base * (1 << (attempt - 1));
                warn!(
                    "Analysis dispatch attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = match self.client.post(&self.endpoint).json(&body).send().await {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(AnalysisDispatchError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let message = response.text().await.unwrap_or_default();
                last_error = Some(AnalysisDispatchError::Api {
                    status: status.as_u16(),
                    message,
                });
                continue;
            }

            if !status.is_success() {
                let message = response.text().await.unwrap_or_default();
                return Err(AnalysisDispatchError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            debug!(%application_id, "Application submitted for analysis");
            return Ok(());
        }

        warn!(
            %application_id,
            "Analysis dispatch gave up: {}",
            last_error
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default()
        );
        Err(AnalysisDispatchError::Exhausted {
            retries: MAX_RETRIES,
        })
    }
}

/// Dispatcher used when no analysis service is configured.
pub struct DisabledAnalysis;

#[async_trait]
impl AnalysisDispatcher for DisabledAnalysis {
    async fn submit(
        &self,
        application_id: Uuid,
        _file_reference: &str,
        _job_reference: &str,
    ) -> Result<(), AnalysisDispatchError> {
        debug!(%application_id, "Analysis service not configured, skipping dispatch");
        Ok(())
    }
}
