//! Job control: cancel and clear.

use super::JobRegistry;
use crate::error::{JobError, Result};
use crate::types::{Event, JobId, JobSnapshot};

impl JobRegistry {
    /// Request cooperative cancellation of a job
    ///
    /// Units still waiting for a fetch slot are skipped and fetches already
    /// in flight drain. The job then ends in `Error` with a cancellation
    /// message. Nothing is written.
    ///
    /// # Errors
    /// `NotFound` for an unknown id, `InvalidState` if the job already
    /// finished.
    pub fn cancel(&self, id: &JobId) -> Result<()> {
        let jobs = self.jobs.read().unwrap_or_else(|e| e.into_inner());
        let entry = jobs
            .get(id)
            .ok_or_else(|| JobError::NotFound { id: id.clone() })?;

        let status = entry.snapshot.borrow().status;
        if status.is_terminal() {
            return Err(JobError::InvalidState {
                id: id.clone(),
                operation: "cancel".to_string(),
                status: status.to_string(),
            }
            .into());
        }

        tracing::info!(job_id = %id, "Cancelling job");
        entry.cancel.cancel();
        Ok(())
    }

    /// Remove a finished job from the registry
    ///
    /// Returns its final snapshot. Files already written are kept.
    ///
    /// # Errors
    /// `NotFound` for an unknown id, `InvalidState` while the job is still
    /// pending or running.
    pub fn clear(&self, id: &JobId) -> Result<JobSnapshot> {
        let snapshot = {
            let mut jobs = self.jobs.write().unwrap_or_else(|e| e.into_inner());
            let entry = jobs
                .get(id)
                .ok_or_else(|| JobError::NotFound { id: id.clone() })?;

            let snapshot = entry.snapshot.borrow().clone();
            if !snapshot.is_terminal() {
                return Err(JobError::InvalidState {
                    id: id.clone(),
                    operation: "clear".to_string(),
                    status: snapshot.status.to_string(),
                }
                .into());
            }

            jobs.remove(id);
            snapshot
        };

        tracing::debug!(job_id = %id, "Job cleared");
        self.emit_event(Event::Cleared { id: id.clone() });
        Ok(snapshot)
    }

    /// Remove every finished job, returning how many were removed
    pub fn clear_finished(&self) -> usize {
        let removed: Vec<JobId> = {
            let mut jobs = self.jobs.write().unwrap_or_else(|e| e.into_inner());
            let finished: Vec<JobId> = jobs
                .iter()
                .filter(|(_, entry)| entry.snapshot.borrow().is_terminal())
                .map(|(id, _)| id.clone())
                .collect();
            for id in &finished {
                jobs.remove(id);
            }
            finished
        };

        for id in &removed {
            self.emit_event(Event::Cleared { id: id.clone() });
        }
        removed.len()
    }
}
