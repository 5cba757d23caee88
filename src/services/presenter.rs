use std::io::Write;
use std::sync::Mutex;
use tokio::sync::mpsc;

use crate::models::job::{JobSnapshot, JobStatus};

/// A change the UI should reflect.
#[derive(Debug, Clone)]
pub enum JobEvent {
    /// A file was accepted; show its placeholder row.
    Added(JobSnapshot),
    /// A job changed status; re-render only its row.
    Updated(JobSnapshot),
    /// The queue went idle with no jobs at all.
    Empty,
}

impl JobEvent {
    pub fn snapshot(&self) -> Option<&JobSnapshot> {
        match self {
            JobEvent::Added(s) | JobEvent::Updated(s) => Some(s),
            JobEvent::Empty => None,
        }
    }
}

/// Receives job events in the order the engine state changed.
///
/// Called with no engine locks held, so an observer may call back into the
/// [`Orchestrator`](crate::Orchestrator), e.g. to `submit` more files on
/// [`JobEvent::Empty`] or `cancel` a poll. Events raised by such a call are
/// delivered after `on_event` returns.
pub trait JobObserver: Send + Sync {
    fn on_event(&self, event: JobEvent);
}

/// Logs each transition with structured fields.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl JobObserver for TracingObserver {
    fn on_event(&self, event: JobEvent) {
        match event {
            JobEvent::Added(job) => {
                tracing::info!(job_id = %job.id, file = %job.file_name, "File queued");
            }
            JobEvent::Updated(job) => match job.status {
                JobStatus::Succeeded => tracing::info!(
                    job_id = %job.id,
                    file = %job.file_name,
                    passed = job.result.as_ref().map(|r| r.verdict),
                    "Analysis complete"
                ),
                JobStatus::Failed => tracing::warn!(
                    job_id = %job.id,
                    file = %job.file_name,
                    error = job.error.as_deref().unwrap_or_default(),
                    "Job failed"
                ),
                status => tracing::debug!(
                    job_id = %job.id,
                    file = %job.file_name,
                    status = %status,
                    task_id = job.task_id.as_ref().map(|t| t.as_str()),
                    "Job status changed"
                ),
            },
            JobEvent::Empty => tracing::info!("No files queued"),
        }
    }
}

/// Renders one row per event to a writer, followed by the verdict
/// detail view when a job succeeds.
pub struct ConsoleObserver<W> {
    out: Mutex<W>,
}

impl<W: Write + Send> ConsoleObserver<W> {
    pub fn new(out: W) -> Self {
        Self { out: Mutex::new(out) }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

pub fn render_row(job: &JobSnapshot) -> String {
    let detail = match job.status {
        JobStatus::Queued => "waiting".to_string(),
        JobStatus::Uploading => "uploading...".to_string(),
        JobStatus::AwaitingResult => "analysing...".to_string(),
        JobStatus::Succeeded => match &job.result {
            Some(result) if result.verdict => "passed".to_string(),
            Some(result) => match result.failed_requirements().count() {
                0 => "did not pass".to_string(),
                n => format!("did not pass ({n} unmet)"),
            },
            None => String::new(),
        },
        JobStatus::Failed => format!("error: {}", job.error.as_deref().unwrap_or("unknown")),
    };
    format!("{:<32} {:<16} {}", job.file_name, job.status.to_string(), detail)
}

impl<W: Write + Send> JobObserver for ConsoleObserver<W> {
    fn on_event(&self, event: JobEvent) {
        let Ok(mut out) = self.out.lock() else {
            return;
        };
        // Console output is best-effort.
        let _ = match &event {
            JobEvent::Added(job) | JobEvent::Updated(job) => {
                writeln!(out, "{}", render_row(job)).and_then(|_| match &job.result {
                    Some(result) if job.status == JobStatus::Succeeded => write!(out, "{result}"),
                    _ => Ok(()),
                })
            }
            JobEvent::Empty => writeln!(out, "No files queued. Pass one or more label images."),
        };
    }
}

/// Forwards events into a channel, e.g. for a UI task or for tests.
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<JobEvent>,
}

impl ChannelObserver {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<JobEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl JobObserver for ChannelObserver {
    fn on_event(&self, event: JobEvent) {
        // Receiver gone means nobody is watching anymore.
        let _ = self.tx.send(event);
    }
}

/// Fans events out to several observers in order.
#[derive(Default)]
pub struct Observers(Vec<Box<dyn JobObserver>>);

impl Observers {
    pub fn with(mut self, observer: impl JobObserver + 'static) -> Self {
        self.0.push(Box::new(observer));
        self
    }
}

impl JobObserver for Observers {
    fn on_event(&self, event: JobEvent) {
        for observer in &self.0 {
            observer.on_event(event.clone());
        }
    }
}
