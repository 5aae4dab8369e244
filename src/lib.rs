//! # hwdb-jobs
//!
//! Background job engine for bulk retrieval from a hardware-tracking REST
//! API ("HWDB").
//!
//! A caller submits a list of item identifiers plus a set of field paths.
//! The [`JobRegistry`] returns a job id at once and runs the job in the
//! background: every identifier is fetched through a shared, bounded
//! [`FetchPool`], the requested fields are projected out of each record, and
//! the results are written to one CSV or JSON document. Per-item failures are
//! counted and skipped. Image jobs download every image attached to a set of
//! parts into a directory instead, stopping at the first failure.
//!
//! Progress is read through [`JobRegistry::status`] (or the optional HTTP
//! surface in [`api`]), which always returns a consistent snapshot.
//!
//! ## Quick Start
//!
//! ```no_run
//! use hwdb_jobs::{Config, JobRegistry, OutputMode, RecordJobRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = JobRegistry::new(Config::default())?;
//!
//!     let id = registry.submit(RecordJobRequest {
//!         identifiers: vec!["D08100400001-00001".into()],
//!         fields: vec!["serial_number".into(), "specifications[0].gain".into()],
//!         mode: OutputMode::Tabular,
//!         label: "sipm".into(),
//!         ..Default::default()
//!     })?;
//!
//!     if let Some(snapshot) = registry.wait(&id).await {
//!         println!("{:?}: {}", snapshot.status, snapshot.message);
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// HWDB client
pub mod client;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Job registry and workers
pub mod jobs;
/// CSV / JSON output assembly
pub mod output;
/// Retry logic with exponential backoff
pub mod retry;
/// Field path compilation
pub mod selection;
/// Record projection
pub mod transform;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use client::{HwdbClient, RestClient};
pub use config::{Config, FileCollisionAction};
pub use error::{
    ApiError, DatabaseError, Error, ErrorDetail, ItemError, JobError, Result, SubmissionError,
    ToHttpStatus,
};
pub use jobs::{FetchPool, JobRegistry};
pub use selection::{FieldSelection, SelectionTree};
pub use types::{
    Event, ImageJobRequest, JobId, JobKind, JobSnapshot, JobStatus, OutputMode, RecordJobRequest,
    RecordSource,
};

/// Helper function to run the registry with graceful signal handling.
///
/// Waits for a termination signal and then calls [`JobRegistry::shutdown`],
/// which cancels running jobs and waits for them to settle.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use hwdb_jobs::{Config, JobRegistry, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let registry = JobRegistry::new(Config::default())?;
///     run_with_shutdown(registry).await?;
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(registry: JobRegistry) -> Result<()> {
    wait_for_signal().await;
    registry.shutdown().await;
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
