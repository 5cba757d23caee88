use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::job::TaskId;

/// Body returned by `POST /upload`, before interpretation.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UploadResponse {
    #[serde(default)]
    pub success: bool,
    pub status: Option<String>,
    pub result: Option<Value>,
    pub task_id: Option<String>,
    pub error: Option<String>,
}

/// Interpreted upload response.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    /// The server refused the file.
    Rejected { error: Option<String> },
    /// The verdict came back with the upload.
    Completed { result: Value },
    /// Analysis continues server-side under `task_id`.
    Processing { task_id: TaskId },
}

impl UploadResponse {
    /// Map the response onto one of the three known shapes.
    /// Anything else is reported as malformed.
    pub fn interpret(self) -> Result<UploadOutcome, String> {
        if !self.success {
            return Ok(UploadOutcome::Rejected { error: self.error });
        }
        match self.status.as_deref() {
            Some("completed") => self
                .result
                .map(|result| UploadOutcome::Completed { result })
                .ok_or_else(|| "completed response without result".to_string()),
            Some("processing") => self
                .task_id
                .filter(|id| !id.is_empty())
                .map(|id| UploadOutcome::Processing {
                    task_id: TaskId::new(id),
                })
                .ok_or_else(|| "processing response without task_id".to_string()),
            Some(other) => Err(format!("unknown upload status {other:?}")),
            None => Err("upload response without status".to_string()),
        }
    }
}

/// Body returned by `GET /status/{task_id}`.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct TaskStatusResponse {
    #[serde(default)]
    pub status: String,
    pub result: Option<Value>,
    pub error: Option<String>,
}

/// Interpreted status of a deferred task.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskStatus {
    Pending,
    Success { result: Option<Value> },
    Failure { error: Option<String> },
}

impl From<TaskStatusResponse> for TaskStatus {
    /// Unrecognized statuses count as still pending.
    fn from(response: TaskStatusResponse) -> Self {
        match response.status.as_str() {
            "SUCCESS" => TaskStatus::Success {
                result: response.result,
            },
            "FAILURE" => TaskStatus::Failure {
                error: response.error,
            },
            _ => TaskStatus::Pending,
        }
    }
}
