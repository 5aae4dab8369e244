//! Error types for hwdb-jobs
//!
//! This module provides the error taxonomy of the job engine:
//! - Synchronous submission errors (the job is never created)
//! - Job-terminal errors (recorded in the job's `error` field)
//! - Per-item errors (logged, counted and skipped by record jobs)
//! - Errors raised by the remote HWDB client
//! - HTTP status code mapping for the status API

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use utoipa::ToSchema;

use crate::types::JobId;

/// Result type alias for hwdb-jobs operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for hwdb-jobs
///
/// Only submission-time failures and registry operations surface this type to
/// callers. Once a job exists, every failure is reported through the job's
/// status snapshot instead.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "pool.max_concurrent_fetches")
        key: Option<String>,
    },

    /// The job request was rejected before a job was created
    #[error("submission rejected: {0}")]
    Submission(#[from] SubmissionError),

    /// Job lookup or job-level failure
    #[error("job error: {0}")]
    Job(#[from] JobError),

    /// Remote HWDB client error outside of a job's fan-out loop
    #[error("HWDB error: {0}")]
    Client(#[from] DatabaseError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Delimited-file serialization error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Shutdown in progress - not accepting new jobs
    #[error("shutdown in progress: not accepting new jobs")]
    ShuttingDown,

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Reasons a job request is refused synchronously
#[derive(Debug, Error)]
pub enum SubmissionError {
    /// A record job was requested with an empty identifier set
    #[error("no identifiers supplied: nothing to download")]
    NoIdentifiers,

    /// An image job was requested without any part ids
    #[error("no part ids supplied: nothing to download")]
    NoPartIds,
}

/// Job lookup errors and job-terminal failures
///
/// The terminal variants (`NoUsableData`, `Persistence`, `Cancelled`,
/// `ImageDownload`) are never returned to a caller; their `Display` text is
/// what ends up in [`JobSnapshot::error`](crate::types::JobSnapshot::error).
#[derive(Debug, Error)]
pub enum JobError {
    /// No job with this id is known to the registry
    #[error("job {id} not found")]
    NotFound {
        /// The job id that was not found
        id: JobId,
    },

    /// Operation not allowed in the job's current state
    #[error("cannot {operation} job {id} in state {status}")]
    InvalidState {
        /// The job id
        id: JobId,
        /// The operation that was attempted (e.g., "clear", "cancel")
        operation: String,
        /// The current status that prevents the operation
        status: String,
    },

    /// Every identifier failed or produced no output
    #[error("no usable data: {failed} of {attempted} items failed and nothing was produced")]
    NoUsableData {
        /// Number of items attempted
        attempted: u64,
        /// Number of items that failed
        failed: u64,
    },

    /// Writing the output failed
    #[error("failed to write {path}: {reason}")]
    Persistence {
        /// The output path that could not be written
        path: PathBuf,
        /// The underlying failure
        reason: String,
    },

    /// The job was cancelled before completing
    #[error("cancelled after {processed} of {total} items ({skipped} not started)")]
    Cancelled {
        /// Items attempted before cancellation took effect
        processed: u64,
        /// Items requested
        total: u64,
        /// Items never started because of the cancellation
        skipped: u64,
    },

    /// Listing the images of one item failed, which halts an image job
    #[error("failed to list images for {part_id}: {reason}")]
    ImageListing {
        /// Item whose image list could not be fetched
        part_id: String,
        /// The per-item failure
        reason: String,
    },

    /// None of the requested items has any image
    #[error("no images found for {items} item(s)")]
    NoImages {
        /// Number of items listed
        items: u64,
    },

    /// First failure of a binary download job, which halts the job
    #[error("image download stopped at item {position} of {total}: {reason}")]
    ImageDownload {
        /// 1-based position of the failing item
        position: u64,
        /// Total number of images in the job
        total: u64,
        /// The per-item failure
        reason: String,
    },
}

/// Errors raised by the HWDB REST client
#[derive(Debug, Clone, Error)]
pub enum DatabaseError {
    /// The server answered with a non-success status
    #[error("HTTP {status} from {url}: {message}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Request URL
        url: String,
        /// Response body or reason phrase
        message: String,
    },

    /// The requested record does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Connection, DNS or transport failure
    #[error("network error: {0}")]
    Network(String),

    /// The response could not be interpreted (e.g. missing `data` field)
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for DatabaseError {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            DatabaseError::Http {
                status: status.as_u16(),
                url: e.url().map(|u| u.to_string()).unwrap_or_default(),
                message: e.to_string(),
            }
        } else if e.is_decode() {
            DatabaseError::Malformed(e.to_string())
        } else {
            DatabaseError::Network(e.to_string())
        }
    }
}

/// Failure of a single unit of work inside a job
#[derive(Debug, Error)]
pub enum ItemError {
    /// Retrieval failed
    #[error("fetch failed: {0}")]
    Fetch(#[from] DatabaseError),

    /// Retrieval did not complete within the per-fetch timeout
    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),

    /// The record could not be reduced under the selection tree
    #[error("transform failed: {0}")]
    Transform(String),

    /// An image record lacks a field needed to download it
    #[error("missing metadata: {0}")]
    MissingMetadata(String),

    /// Writing the downloaded file failed
    #[error("failed to write {path}: {source}")]
    Write {
        /// Target file
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// The job was cancelled before this unit started
    #[error("cancelled before start")]
    Cancelled,
}

/// API error response format
///
/// This structure is returned by API endpoints when an error occurs.
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "job_not_found",
///     "message": "job error: job 3f0c… not found",
///     "details": { "job_id": "3f0c…" }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "job_not_found", "no_identifiers")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create a "not found" error
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new("not_found", format!("{} not found", resource.into()))
    }

    /// Create a "validation error" error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("validation_error", message)
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            Error::Config { .. } => 400,
            Error::Submission(_) => 422,

            Error::Job(JobError::NotFound { .. }) => 404,
            Error::Job(JobError::InvalidState { .. }) => 409,
            Error::Job(_) => 500,

            Error::Client(DatabaseError::NotFound(_)) => 404,
            Error::Client(_) => 502,

            Error::Io(_) => 500,
            Error::Serialization(_) => 500,
            Error::Csv(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::Other(_) => 500,

            Error::ShuttingDown => 503,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Submission(e) => match e {
                SubmissionError::NoIdentifiers => "no_identifiers",
                SubmissionError::NoPartIds => "no_part_ids",
            },
            Error::Job(e) => match e {
                JobError::NotFound { .. } => "job_not_found",
                JobError::InvalidState { .. } => "invalid_state",
                JobError::NoUsableData { .. } => "no_usable_data",
                JobError::Persistence { .. } => "persistence_error",
                JobError::Cancelled { .. } => "cancelled",
                JobError::ImageListing { .. } => "image_listing_failed",
                JobError::NoImages { .. } => "no_images",
                JobError::ImageDownload { .. } => "image_download_failed",
            },
            Error::Client(_) => "hwdb_error",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
            Error::Csv(_) => "csv_error",
            Error::ShuttingDown => "shutting_down",
            Error::ApiServerError(_) => "api_server_error",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::Job(JobError::NotFound { id }) => Some(serde_json::json!({
                "job_id": id,
            })),
            Error::Job(JobError::InvalidState {
                id,
                operation,
                status,
            }) => Some(serde_json::json!({
                "job_id": id,
                "operation": operation,
                "status": status,
            })),
            Error::Config { key: Some(key), .. } => Some(serde_json::json!({
                "key": key,
            })),
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}
