use std::collections::HashMap;

use crate::models::job::{Job, JobId, JobSnapshot, JobStatus};

/// Every job accepted during the session, in the order it was accepted.
/// Jobs are never removed.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: Vec<Job>,
    index: HashMap<JobId, usize>,
}

impl JobRegistry {
    pub fn insert(&mut self, job: Job) -> JobId {
        let id = job.id;
        self.index.insert(id, self.jobs.len());
        self.jobs.push(job);
        id
    }

    pub fn get(&self, id: JobId) -> Option<&Job> {
        self.index.get(&id).map(|&i| &self.jobs[i])
    }

    pub fn get_mut(&mut self, id: JobId) -> Option<&mut Job> {
        self.index.get(&id).map(|&i| &mut self.jobs[i])
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn count(&self, status: JobStatus) -> usize {
        self.jobs.iter().filter(|j| j.status() == status).count()
    }

    pub fn all_terminal(&self) -> bool {
        self.jobs.iter().all(|j| j.status().is_terminal())
    }

    pub fn snapshots(&self) -> Vec<JobSnapshot> {
        self.jobs.iter().map(JobSnapshot::from).collect()
    }
}
