use std::time::Instant;

use crate::models::job::{JobId, JobSnapshot, UploadFile};
use crate::models::verdict::Verdict;
use crate::models::wire::UploadOutcome;
use crate::orchestrator::{finish_job, Orchestrator, ProcessorState, NETWORK_ERROR, UPLOAD_FAILED};
use crate::services::client::ClientError;
use crate::services::presenter::JobEvent;

enum Step {
    Upload(JobId, UploadFile),
    Skip,
    Idle,
}

impl Orchestrator {
    /// Upload pending jobs one at a time until the queue is empty.
    ///
    /// Only one drain runs at a time; `submit` starts it when the
    /// processor is idle and it returns after switching back to idle.
    pub(crate) async fn drain(self) {
        tracing::debug!("Upload loop started");
        loop {
            let (id, file) = match self.next_step() {
                Step::Upload(id, file) => (id, file),
                Step::Skip => continue,
                Step::Idle => break,
            };

            tracing::info!(job_id = %id, file = %file.name, bytes = file.len(), "Uploading");
            let start = Instant::now();
            let outcome = self.inner.uploader.upload(&file).await;
            metrics::histogram!("label_check_upload_seconds").record(start.elapsed().as_secs_f64());

            self.settle_upload(id, outcome);

            // Yield before the next upload instead of chaining straight into it.
            tokio::time::sleep(self.inner.config.reschedule_delay).await;
        }
        tracing::debug!("Upload loop idle");
    }

    fn next_step(&self) -> Step {
        self.inner.update(|state, events| {
            let Some(id) = state.pending.pop_next() else {
                state.processor = ProcessorState::Idle;
                if state.registry.is_empty() {
                    events.push(JobEvent::Empty);
                }
                return Step::Idle;
            };
            metrics::gauge!("label_check_queue_depth").set(state.pending.len() as f64);

            let Some(job) = state.registry.get_mut(id) else {
                tracing::warn!(job_id = %id, "Pending job is not registered");
                return Step::Skip;
            };
            if let Err(e) = job.start_upload() {
                tracing::warn!(error = %e, "Skipping pending job");
                return Step::Skip;
            }
            events.push(JobEvent::Updated(JobSnapshot::from(&*job)));
            Step::Upload(id, job.file.clone())
        })
    }

    /// Record the upload result. A deferred task is handed to the poller
    /// and the loop moves on without waiting for it.
    fn settle_upload(&self, id: JobId, outcome: Result<UploadOutcome, ClientError>) {
        let result = match outcome {
            Ok(UploadOutcome::Processing { task_id }) => {
                self.watch(task_id, id);
                return;
            }
            Ok(UploadOutcome::Completed { result }) => {
                Verdict::decode(&result).map_err(|e| {
                    tracing::warn!(job_id = %id, error = %e, "Result could not be decoded");
                    format!("invalid result: {e}")
                })
            }
            Ok(UploadOutcome::Rejected { error }) => {
                tracing::warn!(job_id = %id, error = ?error, "Upload rejected");
                Err(error.unwrap_or_else(|| UPLOAD_FAILED.to_string()))
            }
            Err(e) => {
                tracing::warn!(job_id = %id, error = %e, "Upload failed");
                Err(NETWORK_ERROR.to_string())
            }
        };

        self.inner
            .update(|state, events| finish_job(state, events, id, result));
    }
}
