use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use strum::Display;
use uuid::Uuid;

use crate::models::verdict::Verdict;

/// Identity of a tracked job, assigned when the file is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Server-issued identifier of a deferred analysis.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A file selected for upload. The payload is shared and never mutated.
/// The media type is stored trimmed and lowercased so every consumer sees
/// the same value.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub media_type: String,
    pub bytes: Arc<[u8]>,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into().trim().to_ascii_lowercase(),
            bytes: bytes.into(),
        }
    }

    /// Read a file from disk, deriving its media type from the extension
    /// and falling back to the leading magic bytes.
    pub async fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let media_type = detect_media_type(path, &bytes);
        Ok(Self::new(name, media_type, bytes))
    }

    /// True for `image/*` media types.
    pub fn is_image(&self) -> bool {
        self.media_type
            .split_once('/')
            .is_some_and(|(top, sub)| top == "image" && !sub.is_empty())
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

fn detect_media_type(path: &Path, bytes: &[u8]) -> String {
    image::ImageFormat::from_path(path)
        .or_else(|_| image::guess_format(bytes))
        .map(|format| format.to_mime_type().to_string())
        .unwrap_or_else(|_| "application/octet-stream".to_string())
}

/// Lifecycle of one uploaded file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Uploading,
    AwaitingResult,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("job {job_id} cannot move from {from} to {to}")]
pub struct TransitionError {
    pub job_id: JobId,
    pub from: JobStatus,
    pub to: JobStatus,
}

/// One file's upload-and-analysis lifecycle.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub file: UploadFile,
    pub task_id: Option<TaskId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    status: JobStatus,
    result: Option<Verdict>,
    error: Option<String>,
}

impl Job {
    pub fn new(file: UploadFile) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            file,
            task_id: None,
            created_at: now,
            updated_at: now,
            status: JobStatus::Queued,
            result: None,
            error: None,
        }
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    /// Decoded verdict, present only once the job has succeeded.
    pub fn result(&self) -> Option<&Verdict> {
        self.result.as_ref()
    }

    /// Failure reason, present only once the job has failed.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn start_upload(&mut self) -> Result<(), TransitionError> {
        self.transition(JobStatus::Uploading, &[JobStatus::Queued])
    }

    pub fn await_result(&mut self, task_id: TaskId) -> Result<(), TransitionError> {
        self.transition(JobStatus::AwaitingResult, &[JobStatus::Uploading])?;
        self.task_id = Some(task_id);
        Ok(())
    }

    pub fn succeed(&mut self, verdict: Verdict) -> Result<(), TransitionError> {
        self.transition(
            JobStatus::Succeeded,
            &[JobStatus::Uploading, JobStatus::AwaitingResult],
        )?;
        self.result = Some(verdict);
        Ok(())
    }

    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), TransitionError> {
        self.transition(
            JobStatus::Failed,
            &[JobStatus::Uploading, JobStatus::AwaitingResult],
        )?;
        self.error = Some(message.into());
        Ok(())
    }

    fn transition(&mut self, to: JobStatus, allowed_from: &[JobStatus]) -> Result<(), TransitionError> {
        if !allowed_from.contains(&self.status) {
            return Err(TransitionError {
                job_id: self.id,
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Read-only view of a job handed to observers.
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub id: JobId,
    pub file_name: String,
    pub status: JobStatus,
    pub task_id: Option<TaskId>,
    pub result: Option<Verdict>,
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Job> for JobSnapshot {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id,
            file_name: job.file.name.clone(),
            status: job.status,
            task_id: job.task_id.clone(),
            result: job.result.clone(),
            error: job.error.clone(),
            updated_at: job.updated_at,
        }
    }
}
