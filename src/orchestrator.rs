use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::config::OrchestratorConfig;
use crate::models::job::{JobId, JobSnapshot, JobStatus, TaskId};
use crate::models::verdict::Verdict;
use crate::services::{
    client::{HttpAnalysisClient, StatusSource, Uploader},
    presenter::{JobEvent, JobObserver},
    queue::PendingQueue,
    registry::JobRegistry,
};

pub(crate) const NETWORK_ERROR: &str = "network error";
pub(crate) const UPLOAD_FAILED: &str = "upload failed";
pub(crate) const ANALYSIS_FAILED: &str = "analysis failed";
pub(crate) const POLL_TIMED_OUT: &str = "timed out waiting for result";
pub(crate) const POLL_CANCELLED: &str = "polling cancelled";

/// Whether the upload loop is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessorState {
    #[default]
    Idle,
    Draining,
}

/// Active status poll for one server task. Identical uploads may share a
/// task, so an entry can resolve several jobs.
pub(crate) struct PollEntry {
    pub(crate) handle: JoinHandle<()>,
    pub(crate) jobs: Vec<JobId>,
}

#[derive(Default)]
pub(crate) struct EngineState {
    pub(crate) registry: JobRegistry,
    pub(crate) pending: PendingQueue,
    pub(crate) processor: ProcessorState,
    pub(crate) polls: HashMap<TaskId, PollEntry>,
    /// Events produced but not yet handed to the observer, in the order
    /// the state changed.
    outbox: VecDeque<JobEvent>,
    /// Set while some caller is draining `outbox` into the observer.
    delivering: bool,
}

pub(crate) struct Inner {
    pub(crate) config: OrchestratorConfig,
    pub(crate) uploader: Arc<dyn Uploader>,
    pub(crate) status: Arc<dyn StatusSource>,
    observer: Arc<dyn JobObserver>,
    state: Mutex<EngineState>,
    changed: Notify,
}

/// Upload queue, processor and status poller behind one cheap handle.
///
/// All state lives behind a single lock that is never held across an
/// `.await`. The upload loop and every status poll run as their own tokio
/// tasks, so methods that start work must be called inside a runtime.
#[derive(Clone)]
pub struct Orchestrator {
    pub(crate) inner: Arc<Inner>,
}

impl Orchestrator {
    pub fn new(
        config: OrchestratorConfig,
        uploader: Arc<dyn Uploader>,
        status: Arc<dyn StatusSource>,
        observer: Arc<dyn JobObserver>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                uploader,
                status,
                observer,
                state: Mutex::new(EngineState::default()),
                changed: Notify::new(),
            }),
        }
    }

    /// Orchestrator talking to the analysis service over HTTP.
    pub fn with_client(
        config: OrchestratorConfig,
        client: HttpAnalysisClient,
        observer: Arc<dyn JobObserver>,
    ) -> Self {
        let client = Arc::new(client);
        Self::new(config, client.clone(), client, observer)
    }

    /// All jobs in the order they were accepted.
    pub fn snapshot(&self) -> Vec<JobSnapshot> {
        self.inner.read(|state| state.registry.snapshots())
    }

    pub fn job(&self, id: JobId) -> Option<JobSnapshot> {
        self.inner
            .read(|state| state.registry.get(id).map(JobSnapshot::from))
    }

    /// Verdict of a succeeded job, for the detail view.
    pub fn result(&self, id: JobId) -> Option<Verdict> {
        self.inner
            .read(|state| state.registry.get(id).and_then(|job| job.result().cloned()))
    }

    pub fn processor_state(&self) -> ProcessorState {
        self.inner.read(|state| state.processor)
    }

    /// Number of jobs currently in `status`.
    pub fn count(&self, status: JobStatus) -> usize {
        self.inner.read(|state| state.registry.count(status))
    }

    /// Task ids currently being polled.
    pub fn active_polls(&self) -> Vec<TaskId> {
        self.inner.read(|state| state.polls.keys().cloned().collect())
    }

    /// Resolves once the upload loop is idle, every job is terminal and the
    /// observer has seen every event.
    pub async fn settled(&self) {
        loop {
            let notified = self.inner.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let done = self.inner.read(|state| {
                state.processor == ProcessorState::Idle
                    && state.registry.all_terminal()
                    && state.outbox.is_empty()
                    && !state.delivering
            });
            if done {
                return;
            }
            notified.await;
        }
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn read<R>(&self, f: impl FnOnce(&EngineState) -> R) -> R {
        f(&self.lock_state())
    }

    /// Apply a mutation, queue the events it produced and wake anyone
    /// waiting in [`Orchestrator::settled`].
    ///
    /// Events are delivered with no lock held. Only one caller delivers at a
    /// time; a caller that finds delivery in progress, including an observer
    /// calling back into the engine, leaves its events to that caller.
    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut EngineState, &mut Vec<JobEvent>) -> R) -> R {
        let mut events = Vec::new();
        let (out, deliver) = {
            let mut state = self.lock_state();
            let out = f(&mut state, &mut events);
            state.outbox.extend(events);
            let deliver = !state.delivering && !state.outbox.is_empty();
            state.delivering |= deliver;
            (out, deliver)
        };
        if deliver {
            self.deliver();
        }
        self.changed.notify_waiters();
        out
    }

    fn deliver(&self) {
        loop {
            let next = {
                let mut state = self.lock_state();
                let next = state.outbox.pop_front();
                state.delivering = next.is_some();
                next
            };
            match next {
                Some(event) => self.observer.on_event(event),
                None => return,
            }
        }
    }
}

/// Move a job into its terminal state. Returns false when the job is
/// unknown or already terminal.
pub(crate) fn finish_job(
    state: &mut EngineState,
    events: &mut Vec<JobEvent>,
    id: JobId,
    outcome: Result<Verdict, String>,
) -> bool {
    let Some(job) = state.registry.get_mut(id) else {
        tracing::warn!(job_id = %id, "Finished job is not registered");
        return false;
    };

    let (applied, counter) = match outcome {
        Ok(verdict) => (job.succeed(verdict), "label_check_jobs_succeeded_total"),
        Err(message) => (job.fail(message), "label_check_jobs_failed_total"),
    };

    match applied {
        Ok(()) => {
            metrics::counter!(counter).increment(1);
            events.push(JobEvent::Updated(JobSnapshot::from(&*job)));
            true
        }
        Err(e) => {
            tracing::debug!(error = %e, "Ignoring transition of a settled job");
            false
        }
    }
}
