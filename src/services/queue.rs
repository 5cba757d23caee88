use std::collections::VecDeque;

use crate::models::job::JobId;

/// Jobs waiting for upload.
///
/// The most recent batch is served first; inside a batch, jobs keep the
/// order they were submitted in. Batches `[a, b]` then `[c, d]` drain as
/// `c, d, a, b`. Keeping the in-batch order, rather than reversing it, is a
/// deliberate choice so a multi-file selection uploads top to bottom.
#[derive(Debug, Default)]
pub struct PendingQueue {
    jobs: VecDeque<JobId>,
}

impl PendingQueue {
    /// Put a whole batch ahead of everything already waiting.
    pub fn push_batch(&mut self, batch: &[JobId]) {
        for id in batch.iter().rev() {
            self.jobs.push_front(*id);
        }
    }

    pub fn pop_next(&mut self) -> Option<JobId> {
        self.jobs.pop_front()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
