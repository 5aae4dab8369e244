//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`jobs`] - Job submission, status, cancellation and clearing
//! - [`system`] - Health, events, OpenAPI

use crate::types::JobId;
use serde::{Deserialize, Serialize};

mod jobs;
mod system;

pub use jobs::*;
pub use system::*;

/// Response body for POST /jobs and POST /jobs/images
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct SubmitJobResponse {
    /// Id of the new job
    pub id: JobId,
    /// Where to poll for the job's status
    pub status_url: String,
}

impl SubmitJobResponse {
    pub(crate) fn new(id: JobId) -> Self {
        let status_url = format!("/jobs/{id}");
        Self { id, status_url }
    }
}

/// Response body for DELETE /jobs (clear finished jobs)
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct ClearedJobsResponse {
    /// Number of finished jobs removed from the registry
    pub cleared: usize,
}
