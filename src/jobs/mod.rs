//! Background job engine split into focused submodules.
//!
//! The `JobRegistry` struct and its methods are organized by concern:
//! - [`pool`] - Process-wide bound on concurrent fetches
//! - `reporter` - Worker-side snapshot and event publishing
//! - `records` - Record job submission and the fan-out worker
//! - `images` - Image job submission and the sequential download worker
//! - `query` - Non-blocking status reads for pollers
//! - `control` - Cancel and clear
//! - `lifecycle` - Shutdown coordination

mod control;
mod images;
mod lifecycle;
pub mod pool;
mod query;
mod records;
mod reporter;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use pool::FetchPool;

use crate::client::{HwdbClient, RestClient};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::types::{Event, JobId, JobKind, JobSnapshot};
use reporter::JobReporter;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;

/// Registry entry for one job
///
/// The worker owns the sending half of `snapshot`; the registry only reads.
pub(crate) struct JobEntry {
    pub(crate) snapshot: watch::Receiver<JobSnapshot>,
    pub(crate) cancel: CancellationToken,
}

/// Job registry and worker launcher (cloneable - all fields are Arc-wrapped)
///
/// Submitting a job returns its id immediately and runs the work on a
/// background task. Status reads never block on a running worker: each job
/// publishes complete snapshots through a watch channel and readers take a
/// copy of the latest one.
#[derive(Clone)]
pub struct JobRegistry {
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Remote data client shared by all workers
    pub(crate) client: Arc<dyn HwdbClient>,
    /// Shared fetch pool (every job draws from the same slots)
    pub(crate) pool: FetchPool,
    /// Known jobs by id
    pub(crate) jobs: Arc<RwLock<HashMap<JobId, JobEntry>>>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Flag to indicate whether new jobs are accepted (set to false during shutdown)
    pub(crate) accepting_new: Arc<AtomicBool>,
    /// Parent of every job's cancellation token
    pub(crate) shutdown_token: CancellationToken,
}

impl JobRegistry {
    /// Create a registry talking to the HWDB REST API described by `config`
    ///
    /// # Errors
    /// Returns a configuration error if `config` does not validate or the
    /// REST client cannot be built.
    pub fn new(config: Config) -> Result<Self> {
        let client = RestClient::new(&config.hwdb)?;
        Self::with_client(config, Arc::new(client))
    }

    /// Create a registry over any client, with a pool sized from `config`
    pub fn with_client(config: Config, client: Arc<dyn HwdbClient>) -> Result<Self> {
        let pool = FetchPool::from_config(&config.pool);
        Self::with_pool(config, client, pool)
    }

    /// Create a registry that draws fetch slots from an existing pool
    ///
    /// Several registries built over clones of the same pool share its bound.
    pub fn with_pool(config: Config, client: Arc<dyn HwdbClient>, pool: FetchPool) -> Result<Self> {
        config.validate()?;

        // Create broadcast channel with buffer size of 1000 events
        let (event_tx, _rx) = broadcast::channel(1000);

        tracing::info!(
            base_url = %config.hwdb.base_url,
            pool_size = pool.size(),
            output_dir = %config.output.output_dir.display(),
            "Job registry initialized"
        );

        Ok(Self {
            config: Arc::new(config),
            client,
            pool,
            jobs: Arc::new(RwLock::new(HashMap::new())),
            event_tx,
            accepting_new: Arc::new(AtomicBool::new(true)),
            shutdown_token: CancellationToken::new(),
        })
    }

    /// Subscribe to job events
    ///
    /// Multiple subscribers are supported. Each subscriber receives all events independently.
    /// Events are buffered, but if a subscriber falls behind by more than 1000 events,
    /// it will receive a `RecvError::Lagged` error.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use hwdb_jobs::{Config, JobRegistry};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let registry = JobRegistry::new(Config::default())?;
    ///
    ///     let mut events = registry.subscribe();
    ///     tokio::spawn(async move {
    ///         while let Ok(event) = events.recv().await {
    ///             tracing::info!(?event, "job event");
    ///         }
    ///     });
    ///
    ///     Ok(())
    /// }
    /// ```
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// The fetch pool jobs draw from
    pub fn pool(&self) -> &FetchPool {
        &self.pool
    }

    /// Emit an event to all subscribers
    ///
    /// If there are no active subscribers, the event is silently dropped.
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    pub(crate) fn ensure_accepting(&self) -> Result<()> {
        if self.accepting_new.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::ShuttingDown)
        }
    }

    /// Create the registry entry for a new job
    ///
    /// Returns the worker's reporter and cancellation token. The job is
    /// visible to pollers (as `Pending`) before this returns.
    pub(crate) fn register(
        &self,
        kind: JobKind,
        label: String,
        items: u64,
    ) -> (JobReporter, CancellationToken) {
        let id = JobId::generate();
        let (tx, rx) = watch::channel(JobSnapshot::pending(id.clone(), kind, label));
        let cancel = self.shutdown_token.child_token();

        self.jobs
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(
                id.clone(),
                JobEntry {
                    snapshot: rx,
                    cancel: cancel.clone(),
                },
            );

        self.emit_event(Event::Submitted {
            id: id.clone(),
            kind,
            items,
        });

        (JobReporter::new(id, tx, self.event_tx.clone()), cancel)
    }
}
