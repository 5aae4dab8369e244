//! Shutdown coordination.

use super::JobRegistry;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::sync::watch;

use crate::Result;
use crate::types::JobSnapshot;

/// How long shutdown waits for cancelled workers to report
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

impl JobRegistry {
    /// Gracefully shut down the registry
    ///
    /// 1. Stops accepting new jobs
    /// 2. Cancels every job still pending or running
    /// 3. Waits (up to 30 seconds) for their workers to publish a terminal state
    ///
    /// Finished jobs stay queryable afterwards.
    pub async fn shutdown(&self) {
        tracing::info!("Initiating graceful shutdown");

        self.accepting_new.store(false, Ordering::SeqCst);
        tracing::info!("Stopped accepting new jobs");

        self.shutdown_token.cancel();

        let pending: Vec<watch::Receiver<JobSnapshot>> = {
            let jobs = self.jobs.read().unwrap_or_else(|e| e.into_inner());
            jobs.values()
                .filter(|entry| !entry.snapshot.borrow().is_terminal())
                .map(|entry| entry.snapshot.clone())
                .collect()
        };
        tracing::debug!(active_count = pending.len(), "Waiting for active jobs to finish");

        let wait_all = async move {
            for mut rx in pending {
                // Closed channel means the worker is gone and already reported
                rx.wait_for(|s| s.is_terminal()).await.ok();
            }
        };

        match tokio::time::timeout(SHUTDOWN_TIMEOUT, wait_all).await {
            Ok(()) => tracing::info!("All active jobs finished"),
            Err(_) => tracing::warn!("Timeout waiting for jobs to finish, proceeding with shutdown"),
        }

        tracing::info!("Graceful shutdown complete");
    }

    /// Whether new submissions are accepted
    pub fn is_accepting(&self) -> bool {
        self.accepting_new.load(Ordering::SeqCst)
    }

    /// Serve the REST API for this registry in a background task
    ///
    /// Binds to `config.api.bind_address`. Abort the returned handle to stop
    /// the server.
    pub fn spawn_api_server(self: &Arc<Self>) -> tokio::task::JoinHandle<Result<()>> {
        let registry = self.clone();
        let config = self.config.clone();

        tokio::spawn(async move { crate::api::start_api_server(registry, config).await })
    }
}
