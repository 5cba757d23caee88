use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use std::time::Duration;

use crate::models::job::{TaskId, UploadFile};
use crate::models::wire::{TaskStatus, TaskStatusResponse, UploadOutcome, UploadResponse};

/// Accepts one file per call and reports how the analysis went.
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(&self, file: &UploadFile) -> Result<UploadOutcome, ClientError>;
}

/// Reports the state of a deferred analysis.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn status(&self, task_id: &TaskId) -> Result<TaskStatus, ClientError>;
}

/// Client for the label analysis service.
pub struct HttpAnalysisClient {
    http: Client,
    base_url: String,
}

impl HttpAnalysisClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn upload_url(&self) -> String {
        format!("{}/upload", self.base_url)
    }

    fn status_url(&self, task_id: &TaskId) -> String {
        format!("{}/status/{}", self.base_url, task_id)
    }
}

#[async_trait]
impl Uploader for HttpAnalysisClient {
    async fn upload(&self, file: &UploadFile) -> Result<UploadOutcome, ClientError> {
        let part = Part::bytes(file.bytes.to_vec())
            .file_name(file.name.clone())
            .mime_str(&file.media_type)?;
        let form = Form::new().part("file", part);

        // Error statuses still carry a JSON body worth interpreting.
        let response = self
            .http
            .post(self.upload_url())
            .multipart(form)
            .send()
            .await?;

        let http_status = response.status();
        let body: UploadResponse = response.json().await?;
        tracing::debug!(
            file = %file.name,
            http_status = http_status.as_u16(),
            success = body.success,
            "Upload response received"
        );

        body.interpret().map_err(ClientError::Malformed)
    }
}

#[async_trait]
impl StatusSource for HttpAnalysisClient {
    async fn status(&self, task_id: &TaskId) -> Result<TaskStatus, ClientError> {
        let response = self.http.get(self.status_url(task_id)).send().await?;
        let body: TaskStatusResponse = response.json().await?;
        Ok(body.into())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Malformed response: {0}")]
    Malformed(String),
}
