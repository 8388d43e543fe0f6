pub mod auth;
pub mod config;
pub mod schemas;

use std::time::Duration;
use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{info, warn};
use ig_core::{Error, GenerationRequest, Result, Task};
use crate::generator::backend::config::GenBackendConfig;
use crate::generator::backend::schemas::{ApiEnvelope, CreateTaskBody, TaskData};
use crate::generator::retry::with_retry;

pub const GENERATIONS_PATH: &str = "/v1/images/generations";

/// Remote side of a generation: create a task, read its latest snapshot.
#[async_trait]
pub trait TaskBackend: Send + Sync {
    async fn submit(&self, request: &GenerationRequest) -> Result<Task>;

    async fn fetch_task(&self, task_id: &str) -> Result<Task>;
}

pub struct GenBackend {
    config: GenBackendConfig,
    client: reqwest::Client,
}

impl GenBackend {
    pub fn new(config: GenBackendConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| Error::Configuration(format!("cannot build HTTP client: {e}")))?;

        info!(base_url = %config.base_url, model = %config.model, "Image generation backend ready");

        Ok(Self { config, client })
    }

    fn endpoint(&self, suffix: &str) -> String {
        format!("{}{}{}", self.config.base_url.trim_end_matches('/'), GENERATIONS_PATH, suffix)
    }

    async fn submit_once(&self, url: &str, body: &CreateTaskBody<'_>) -> Result<TaskData> {
        let token = self.config.credentials.sign()?;
        let response = self
            .client
            .post(url)
            .bearer_auth(token.as_str())
            .json(body)
            .send()
            .await
            .map_err(transport)?;

        read_envelope(response).await
    }

    async fn fetch_once(&self, url: &str) -> Result<TaskData> {
        let token = self.config.credentials.sign()?;
        let response = self
            .client
            .get(url)
            .bearer_auth(token.as_str())
            .send()
            .await
            .map_err(transport)?;

        read_envelope(response).await
    }
}

#[async_trait]
impl TaskBackend for GenBackend {
    async fn submit(&self, request: &GenerationRequest) -> Result<Task> {
        request.validate()?;
        // Missing keys will not fix themselves between attempts.
        self.config.credentials.validate()?;

        let url = self.endpoint("");
        let body = CreateTaskBody::new(request, self.config.model, self.config.callback_url.as_deref());

        let data = with_retry(
            &self.config.retry,
            |attempt, err: &Error, delay: Duration| {
                warn!(attempt, delay_ms = delay.as_millis() as u64, error = %err, "Task submission failed, retrying");
            },
            |_| self.submit_once(&url, &body),
        )
        .await?;

        let task = data.into_task()?;
        info!(task_id = %task.id, status = task.status.as_str(), "Submitted generation task");

        Ok(task)
    }

    async fn fetch_task(&self, task_id: &str) -> Result<Task> {
        self.config.credentials.validate()?;

        let url = self.endpoint(&format!("/{task_id}"));

        let data = with_retry(
            &self.config.retry,
            |attempt, err: &Error, delay: Duration| {
                warn!(task_id, attempt, delay_ms = delay.as_millis() as u64, error = %err, "Status fetch failed, retrying");
            },
            |_| self.fetch_once(&url),
        )
        .await?;

        data.into_task()
    }
}

/// Classifies the HTTP outcome and unwraps the `{code, message, data}` envelope.
async fn read_envelope(response: reqwest::Response) -> Result<TaskData> {
    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        let body = response.text().await.unwrap_or_default();
        let detail = match body.trim() {
            "" => "HTTP 429".to_string(),
            body => format!("HTTP 429: {body}"),
        };
        return Err(Error::RateLimited(detail));
    }

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::Http {
            status: status.as_u16(),
            body,
        });
    }

    let envelope: ApiEnvelope<TaskData> = response
        .json()
        .await
        .map_err(|e| Error::ProtocolViolation(format!("malformed response body: {e}")))?;

    if envelope.code != 0 {
        return Err(Error::Api {
            code: envelope.code,
            message: envelope.message,
        });
    }

    envelope
        .data
        .ok_or_else(|| Error::ProtocolViolation("response is missing data".into()))
}

fn transport(e: reqwest::Error) -> Error {
    Error::Transport(e.to_string())
}
