//! Worker-side handle for publishing job state

use crate::types::{Event, JobId, JobSnapshot, JobStatus};
use chrono::Utc;
use std::fmt::Display;
use std::path::PathBuf;
use tokio::sync::{broadcast, watch};

/// Message published when a worker goes away without reporting an outcome
pub(crate) const WORKER_LOST: &str = "worker terminated unexpectedly";

/// Publishes snapshots and events for one job
///
/// Owned by exactly one worker. Every update replaces the whole snapshot, so
/// readers never see a half-written state. The terminal transition happens
/// through [`finish_done`](Self::finish_done) or
/// [`finish_error`](Self::finish_error), which consume the reporter; if the
/// worker is dropped first (panic, aborted task) the job is marked failed.
pub(crate) struct JobReporter {
    id: JobId,
    snapshot: watch::Sender<JobSnapshot>,
    events: broadcast::Sender<Event>,
    finished: bool,
}

impl JobReporter {
    pub(crate) fn new(
        id: JobId,
        snapshot: watch::Sender<JobSnapshot>,
        events: broadcast::Sender<Event>,
    ) -> Self {
        Self {
            id,
            snapshot,
            events,
            finished: false,
        }
    }

    pub(crate) fn id(&self) -> &JobId {
        &self.id
    }

    /// Current published state
    pub(crate) fn current(&self) -> JobSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Transition to `Running` with a known unit count
    pub(crate) fn start(&self, total: u64, message: impl Into<String>) {
        let message = message.into();
        self.snapshot.send_modify(|s| {
            s.status = JobStatus::Running;
            s.total = total;
            s.processed = s.processed.min(total);
            s.message = message;
        });
        self.emit(Event::Started {
            id: self.id.clone(),
            total,
        });
    }

    /// Replace the unit count once it is known (image jobs)
    pub(crate) fn set_total(&self, total: u64, message: impl Into<String>) {
        let message = message.into();
        self.snapshot.send_modify(|s| {
            s.total = total;
            s.processed = s.processed.min(total);
            s.message = message;
        });
    }

    /// Count one successfully processed unit
    pub(crate) fn item_succeeded(&self) {
        self.advance(false);
    }

    /// Count one failed unit
    pub(crate) fn item_failed(&self, item: &str, error: impl Display) {
        self.advance(true);
        self.emit(Event::ItemFailed {
            id: self.id.clone(),
            item: item.to_string(),
            error: error.to_string(),
        });
    }

    fn advance(&self, failed: bool) {
        let mut progress = (0, 0);
        self.snapshot.send_modify(|s| {
            if s.processed < s.total {
                s.processed += 1;
            }
            if failed {
                s.failed += 1;
            }
            s.message = format!("Processed {} of {}", s.processed, s.total);
            progress = (s.processed, s.total);
        });
        self.emit(Event::Progress {
            id: self.id.clone(),
            processed: progress.0,
            total: progress.1,
        });
    }

    /// Terminal success
    pub(crate) fn finish_done(mut self, output_path: PathBuf, message: impl Into<String>) {
        let message = message.into();
        self.finished = true;
        let path = output_path.clone();
        self.snapshot.send_modify(|s| {
            s.status = JobStatus::Done;
            s.message = message;
            s.output_path = Some(path);
            s.error = None;
            s.finished_at = Some(Utc::now());
        });
        self.emit(Event::Completed {
            id: self.id.clone(),
            output_path,
        });
    }

    /// Terminal failure
    pub(crate) fn finish_error(mut self, error: impl Display) {
        self.fail(error.to_string());
    }

    fn fail(&mut self, error: String) {
        self.finished = true;
        let text = error.clone();
        self.snapshot.send_modify(|s| {
            s.status = JobStatus::Error;
            s.message = format!("Failed: {}", text);
            s.output_path = None;
            s.error = Some(text);
            s.finished_at = Some(Utc::now());
        });
        self.emit(Event::Failed {
            id: self.id.clone(),
            error,
        });
    }

    fn emit(&self, event: Event) {
        // No subscribers is fine
        self.events.send(event).ok();
    }
}

impl Drop for JobReporter {
    fn drop(&mut self) {
        if !self.finished {
            tracing::error!(job_id = %self.id, "Job worker exited without reporting an outcome");
            self.fail(WORKER_LOST.to_string());
        }
    }
}
