//! Scripted analysis service and an observer that checks the upload
//! invariant on every event.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use label_check::config::OrchestratorConfig;
use label_check::models::job::{JobId, JobStatus, TaskId, UploadFile};
use label_check::models::wire::{TaskStatus, UploadOutcome};
use label_check::services::client::{ClientError, StatusSource, Uploader};
use label_check::services::presenter::{JobEvent, JobObserver};
use label_check::Orchestrator;

pub fn verdict_json(verdict: bool) -> Value {
    json!({
        "verdict": verdict,
        "category": "2.3",
        "g_per_100g": { "proteins": 3.2, "fats": 1.5, "carbohydrates": 4.7 },
        "percent_of_daily_norm": { "proteins": 6, "fats": 2, "carbohydrates": 2 },
        "requirements": [
            { "criterion": "Total fat below 3 g per 100 g", "verdict": true }
        ]
    })
}

/// Verdict in its textual encoding, as the service sends it.
pub fn encoded_verdict(verdict: bool) -> Value {
    Value::String(verdict_json(verdict).to_string())
}

pub fn image(name: &str) -> UploadFile {
    UploadFile::new(name, "image/png", name.as_bytes().to_vec())
}

pub fn transport_error() -> ClientError {
    ClientError::Malformed("connection reset".to_string())
}

/// Answers uploads by file name and status queries from per-task scripts.
#[derive(Default)]
pub struct ScriptedService {
    uploads: Mutex<HashMap<String, Result<UploadOutcome, String>>>,
    statuses: Mutex<HashMap<TaskId, VecDeque<Result<TaskStatus, String>>>>,
    upload_order: Mutex<Vec<String>>,
    polls: Mutex<HashMap<TaskId, usize>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    upload_delay: Duration,
}

impl ScriptedService {
    pub fn new(upload_delay: Duration) -> Self {
        Self {
            upload_delay,
            ..Self::default()
        }
    }

    pub fn on_upload(&self, file: &str, outcome: UploadOutcome) -> &Self {
        self.uploads.lock().unwrap().insert(file.to_string(), Ok(outcome));
        self
    }

    pub fn on_upload_error(&self, file: &str) -> &Self {
        self.uploads
            .lock()
            .unwrap()
            .insert(file.to_string(), Err("transport".to_string()));
        self
    }

    pub fn immediate(&self, file: &str, verdict: bool) -> &Self {
        self.on_upload(
            file,
            UploadOutcome::Completed {
                result: encoded_verdict(verdict),
            },
        )
    }

    pub fn deferred(&self, file: &str, task_id: &str) -> &Self {
        self.on_upload(
            file,
            UploadOutcome::Processing {
                task_id: TaskId::new(task_id),
            },
        )
    }

    /// Statuses returned in order; once exhausted every query is PENDING.
    pub fn on_status(&self, task_id: &str, script: Vec<Result<TaskStatus, String>>) -> &Self {
        self.statuses
            .lock()
            .unwrap()
            .insert(TaskId::new(task_id), script.into());
        self
    }

    pub fn upload_order(&self) -> Vec<String> {
        self.upload_order.lock().unwrap().clone()
    }

    pub fn poll_count(&self, task_id: &str) -> usize {
        self.polls
            .lock()
            .unwrap()
            .get(&TaskId::new(task_id))
            .copied()
            .unwrap_or(0)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Uploader for ScriptedService {
    async fn upload(&self, file: &UploadFile) -> Result<UploadOutcome, ClientError> {
        self.upload_order.lock().unwrap().push(file.name.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.upload_delay).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        let scripted = self.uploads.lock().unwrap().get(&file.name).cloned();
        match scripted {
            Some(Ok(outcome)) => Ok(outcome),
            Some(Err(_)) | None => Err(transport_error()),
        }
    }
}

#[async_trait]
impl StatusSource for ScriptedService {
    async fn status(&self, task_id: &TaskId) -> Result<TaskStatus, ClientError> {
        *self.polls.lock().unwrap().entry(task_id.clone()).or_default() += 1;
        let next = self
            .statuses
            .lock()
            .unwrap()
            .get_mut(task_id)
            .and_then(|script| script.pop_front());
        match next {
            Some(Ok(status)) => Ok(status),
            Some(Err(_)) => Err(transport_error()),
            None => Ok(TaskStatus::Pending),
        }
    }
}

/// Mirrors job statuses from events and records the largest number of
/// jobs ever seen uploading at once.
#[derive(Default)]
pub struct Tracker {
    statuses: Mutex<HashMap<JobId, JobStatus>>,
    events: Mutex<Vec<JobEvent>>,
    max_uploading: AtomicUsize,
}

impl Tracker {
    pub fn events(&self) -> Vec<JobEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn max_uploading(&self) -> usize {
        self.max_uploading.load(Ordering::SeqCst)
    }

    /// Statuses a job went through, in order.
    pub fn history(&self, id: JobId) -> Vec<JobStatus> {
        self.events()
            .iter()
            .filter_map(|e| e.snapshot())
            .filter(|s| s.id == id)
            .map(|s| s.status)
            .collect()
    }
}

impl JobObserver for Tracker {
    fn on_event(&self, event: JobEvent) {
        if let Some(snapshot) = event.snapshot() {
            let mut statuses = self.statuses.lock().unwrap();
            statuses.insert(snapshot.id, snapshot.status);
            let uploading = statuses
                .values()
                .filter(|s| **s == JobStatus::Uploading)
                .count();
            self.max_uploading.fetch_max(uploading, Ordering::SeqCst);
        }
        self.events.lock().unwrap().push(event);
    }
}

pub struct Harness {
    pub orchestrator: Orchestrator,
    pub service: Arc<ScriptedService>,
    pub tracker: Arc<Tracker>,
}

impl Harness {
    pub fn new(service: ScriptedService) -> Self {
        Self::with_config(service, OrchestratorConfig::default())
    }

    pub fn with_config(service: ScriptedService, config: OrchestratorConfig) -> Self {
        let service = Arc::new(service);
        let tracker = Arc::new(Tracker::default());
        let orchestrator = Orchestrator::new(config, service.clone(), service.clone(), tracker.clone());
        Self {
            orchestrator,
            service,
            tracker,
        }
    }

    /// Wait until every job is terminal and the upload loop is idle.
    pub async fn settle(&self) {
        tokio::time::timeout(Duration::from_secs(3600), self.orchestrator.settled())
            .await
            .expect("jobs did not settle");
    }
}
