//! Status reads for pollers.

use super::JobRegistry;
use crate::types::{JobId, JobSnapshot};
use tokio::sync::watch;

impl JobRegistry {
    /// Latest snapshot of a job, or `None` if the id is unknown
    ///
    /// Never waits for the worker; the copy returned is internally
    /// consistent.
    pub fn status(&self, id: &JobId) -> Option<JobSnapshot> {
        let jobs = self.jobs.read().unwrap_or_else(|e| e.into_inner());
        jobs.get(id).map(|entry| entry.snapshot.borrow().clone())
    }

    /// Snapshots of every known job, oldest first
    pub fn list(&self) -> Vec<JobSnapshot> {
        let mut snapshots: Vec<JobSnapshot> = {
            let jobs = self.jobs.read().unwrap_or_else(|e| e.into_inner());
            jobs.values()
                .map(|entry| entry.snapshot.borrow().clone())
                .collect()
        };
        snapshots.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        snapshots
    }

    /// Receiver that is notified on every update of a job
    pub fn watch(&self, id: &JobId) -> Option<watch::Receiver<JobSnapshot>> {
        let jobs = self.jobs.read().unwrap_or_else(|e| e.into_inner());
        jobs.get(id).map(|entry| entry.snapshot.clone())
    }

    /// Wait until a job reaches a terminal state and return that snapshot
    ///
    /// Returns `None` if the id is unknown.
    pub async fn wait(&self, id: &JobId) -> Option<JobSnapshot> {
        let mut rx = self.watch(id)?;
        if rx.wait_for(|s| s.is_terminal()).await.is_err() {
            // Worker gone; its reporter publishes a terminal state on drop
            tracing::debug!(job_id = %id, "Job channel closed while waiting");
        }
        let snapshot = rx.borrow().clone();
        Some(snapshot)
    }
}
