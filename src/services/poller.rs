use crate::models::job::{JobId, JobSnapshot, TaskId};
use crate::models::verdict::{DecodeError, Verdict};
use crate::models::wire::TaskStatus;
use crate::orchestrator::{
    finish_job, Orchestrator, PollEntry, ANALYSIS_FAILED, POLL_CANCELLED, POLL_TIMED_OUT,
};
use crate::services::presenter::JobEvent;

impl Orchestrator {
    /// Mark the job as awaiting `task_id` and make sure the task is polled.
    pub(crate) fn watch(&self, task_id: TaskId, job_id: JobId) {
        self.inner.update(|state, events| {
            let Some(job) = state.registry.get_mut(job_id) else {
                tracing::warn!(job_id = %job_id, "Watched job is not registered");
                return;
            };
            if let Err(e) = job.await_result(task_id.clone()) {
                tracing::warn!(error = %e, "Cannot await result");
                return;
            }
            events.push(JobEvent::Updated(JobSnapshot::from(&*job)));

            if let Some(entry) = state.polls.get_mut(&task_id) {
                tracing::debug!(job_id = %job_id, task_id = %task_id, "Joining existing poll");
                entry.jobs.push(job_id);
                return;
            }

            tracing::info!(job_id = %job_id, task_id = %task_id, "Polling deferred result");
            // Spawned under the state lock so the entry exists before the
            // poll can try to remove it.
            let handle = tokio::spawn(self.clone().poll(task_id.clone()));
            state.polls.insert(
                task_id,
                PollEntry {
                    handle,
                    jobs: vec![job_id],
                },
            );
        });
    }

    /// Stop polling `task_id`. Jobs waiting on it fail, so none is left
    /// awaiting a result that will never arrive.
    pub fn cancel(&self, task_id: &TaskId) -> bool {
        self.inner.update(|state, events| {
            let Some(entry) = state.polls.remove(task_id) else {
                return false;
            };
            entry.handle.abort();
            tracing::info!(task_id = %task_id, "Polling cancelled");
            for job_id in entry.jobs {
                finish_job(state, events, job_id, Err(POLL_CANCELLED.to_string()));
            }
            true
        })
    }

    async fn poll(self, task_id: TaskId) {
        let config = self.inner.config;
        let mut attempts: u32 = 0;

        loop {
            tokio::time::sleep(config.poll_interval).await;
            attempts += 1;
            metrics::counter!("label_check_polls_total").increment(1);

            let status = match self.inner.status.status(&task_id).await {
                Ok(status) => status,
                Err(e) => {
                    tracing::debug!(task_id = %task_id, attempts, error = %e, "Status query failed, retrying");
                    TaskStatus::Pending
                }
            };

            let outcome = match status {
                TaskStatus::Pending if config.max_poll_attempts.is_some_and(|max| attempts >= max) => {
                    tracing::warn!(task_id = %task_id, attempts, "Giving up on deferred result");
                    Err(POLL_TIMED_OUT.to_string())
                }
                TaskStatus::Pending => continue,
                TaskStatus::Success { result } => result
                    .ok_or(DecodeError::Missing)
                    .and_then(|value| Verdict::decode(&value))
                    .map_err(|e| {
                        tracing::warn!(task_id = %task_id, error = %e, "Result could not be decoded");
                        format!("invalid result: {e}")
                    }),
                TaskStatus::Failure { error } => {
                    tracing::warn!(task_id = %task_id, error = ?error, "Analysis failed");
                    Err(error.unwrap_or_else(|| ANALYSIS_FAILED.to_string()))
                }
            };

            tracing::debug!(task_id = %task_id, attempts, "Deferred task finished");
            self.resolve(&task_id, outcome);
            return;
        }
    }

    /// Finish every job waiting on `task_id`. A second call, or a call for
    /// a cancelled task, changes nothing.
    fn resolve(&self, task_id: &TaskId, outcome: Result<Verdict, String>) {
        self.inner.update(|state, events| {
            let Some(entry) = state.polls.remove(task_id) else {
                return;
            };
            for job_id in entry.jobs {
                finish_job(state, events, job_id, outcome.clone());
            }
        });
    }
}
