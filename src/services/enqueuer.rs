use crate::models::job::{Job, JobId, JobSnapshot, UploadFile};
use crate::orchestrator::{Orchestrator, ProcessorState};
use crate::services::presenter::JobEvent;

impl Orchestrator {
    /// Accept a batch of files. Non-images are dropped without a job.
    ///
    /// Every accepted file gets a placeholder event before any upload
    /// starts, and the batch is placed ahead of older pending work. The
    /// upload loop is started if it is idle.
    pub fn submit(&self, files: impl IntoIterator<Item = UploadFile>) -> Vec<JobId> {
        let jobs: Vec<Job> = files
            .into_iter()
            .filter(|file| {
                if file.is_image() {
                    return true;
                }
                tracing::debug!(
                    file = %file.name,
                    media_type = %file.media_type,
                    "Skipping non-image file"
                );
                metrics::counter!("label_check_files_rejected_total").increment(1);
                false
            })
            .map(Job::new)
            .collect();

        metrics::counter!("label_check_jobs_submitted_total").increment(jobs.len() as u64);

        let (ids, start) = self.inner.update(|state, events| {
            let mut ids = Vec::with_capacity(jobs.len());
            for job in jobs {
                events.push(JobEvent::Added(JobSnapshot::from(&job)));
                ids.push(state.registry.insert(job));
            }
            state.pending.push_batch(&ids);
            metrics::gauge!("label_check_queue_depth").set(state.pending.len() as f64);

            let start = state.processor == ProcessorState::Idle;
            if start {
                state.processor = ProcessorState::Draining;
            }
            (ids, start)
        });

        tracing::info!(accepted = ids.len(), started = start, "Batch submitted");

        if start {
            tokio::spawn(self.clone().drain());
        }
        ids
    }
}
