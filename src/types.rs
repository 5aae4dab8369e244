//! Core types for hwdb-jobs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use utoipa::ToSchema;

/// Column / field name under which the fetched identifier is recorded in every output row or object
pub const EXTERNAL_ID_FIELD: &str = "External_ID";

/// Unique identifier for a job
///
/// Opaque to consumers. Generated from a random v4 UUID at submission time,
/// so it stays unique for the lifetime of the process.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a fresh job id
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Borrow the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for JobId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Job status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Created, worker not started yet
    Pending,
    /// Worker is fetching and assembling
    Running,
    /// Output written successfully
    Done,
    /// Job failed; see the snapshot's `error`
    Error,
}

impl JobStatus {
    /// Whether the status is terminal (`Done` or `Error`)
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Error)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Done => "done",
            JobStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Output shape of a record job
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Flat rows with array expansion, written as CSV (default)
    #[default]
    Tabular,
    /// Pruned nested objects, written as a JSON array
    Nested,
}

impl OutputMode {
    /// File extension of the output document
    pub fn extension(&self) -> &'static str {
        match self {
            OutputMode::Tabular => "csv",
            OutputMode::Nested => "json",
        }
    }
}

/// Which remote record is fetched for every identifier of a record job
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecordSource {
    /// Item metadata (default)
    #[default]
    Item,
    /// Latest test record of the given test type
    LatestTest {
        /// HWDB test type name or id
        test_type: String,
    },
}

/// What a job does
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobKind {
    /// Fan-out record retrieval producing one output document
    Records {
        /// Output shape
        mode: OutputMode,
    },
    /// Sequential image download into a directory
    Images,
}

/// Logic operator joining filter thresholds
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicOperator {
    /// Every threshold must hold (default)
    #[default]
    And,
    /// Any threshold may hold
    Or,
}

/// Numeric bounds applied to one field by the dashboard's filter panel
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FieldThreshold {
    /// Dotted field path
    pub field: String,
    /// Inclusive lower bound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    /// Inclusive upper bound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

/// Filter specification recorded next to a tabular export for auditability
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FilterSpec {
    /// Thresholds active when the export was requested
    #[serde(default)]
    pub thresholds: Vec<FieldThreshold>,
    /// How thresholds are combined
    #[serde(default)]
    pub logic: LogicOperator,
}

/// Request for a record (tabular or nested) job
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct RecordJobRequest {
    /// Identifiers to fetch; duplicates are ignored
    pub identifiers: Vec<String>,
    /// User-selected field paths (dotted/bracketed notation)
    #[serde(default)]
    pub fields: Vec<String>,
    /// Output shape
    #[serde(default)]
    pub mode: OutputMode,
    /// Which record to fetch per identifier
    #[serde(default)]
    pub source: RecordSource,
    /// Label embedded in the output filename
    #[serde(default)]
    pub label: String,
    /// Output directory (defaults to the configured output directory)
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub destination: Option<PathBuf>,
    /// Filter specification to record in a companion metadata file (tabular only)
    #[serde(default)]
    pub filter: Option<FilterSpec>,
}

/// Request for a binary (image) download job
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct ImageJobRequest {
    /// Items whose images are downloaded
    pub part_ids: Vec<String>,
    /// Label used in progress messages and the default directory name
    #[serde(default)]
    pub label: String,
    /// Target directory (defaults to `<output_dir>/<label>_images`)
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub destination: Option<PathBuf>,
}

/// Point-in-time view of a job, as returned to pollers
///
/// Snapshots are published whole, so every snapshot is internally consistent:
/// `processed <= total`, and `output_path` / `error` are only populated once
/// `status` is terminal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct JobSnapshot {
    /// Job id
    pub id: JobId,
    /// What the job does
    pub kind: JobKind,
    /// Caller-supplied label
    pub label: String,
    /// Current status
    pub status: JobStatus,
    /// Number of units in the job
    pub total: u64,
    /// Number of units attempted so far (successful or not)
    pub processed: u64,
    /// Number of units that failed and were skipped
    pub failed: u64,
    /// Human-readable progress message
    pub message: String,
    /// Output file (record jobs) or directory (image jobs), set on success
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub output_path: Option<PathBuf>,
    /// Error message, set on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the job was submitted
    pub created_at: DateTime<Utc>,
    /// When the job reached its terminal state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl JobSnapshot {
    pub(crate) fn pending(id: JobId, kind: JobKind, label: String) -> Self {
        Self {
            id,
            kind,
            label,
            status: JobStatus::Pending,
            total: 0,
            processed: 0,
            failed: 0,
            message: "Queued".to_string(),
            output_path: None,
            error: None,
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Whether the job has reached `Done` or `Error`
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Progress as a percentage (0.0 to 100.0)
    pub fn percent(&self) -> f32 {
        if self.total == 0 {
            if self.status == JobStatus::Done { 100.0 } else { 0.0 }
        } else {
            (self.processed as f32 / self.total as f32) * 100.0
        }
    }
}

/// Event emitted during a job's lifecycle
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Job created
    Submitted {
        /// Job id
        id: JobId,
        /// Job kind
        kind: JobKind,
        /// Number of identifiers / part ids
        items: u64,
    },

    /// Worker started
    Started {
        /// Job id
        id: JobId,
        /// Number of units
        total: u64,
    },

    /// One unit completed
    Progress {
        /// Job id
        id: JobId,
        /// Units attempted so far
        processed: u64,
        /// Number of units
        total: u64,
    },

    /// One unit failed and was skipped (record jobs)
    ItemFailed {
        /// Job id
        id: JobId,
        /// Identifier that failed
        item: String,
        /// Error message
        error: String,
    },

    /// Job finished successfully
    Completed {
        /// Job id
        id: JobId,
        /// Output file or directory
        #[schema(value_type = String)]
        output_path: PathBuf,
    },

    /// Job finished with an error
    Failed {
        /// Job id
        id: JobId,
        /// Error message
        error: String,
    },

    /// Job removed from the registry
    Cleared {
        /// Job id
        id: JobId,
    },
}

impl Event {
    /// Short event name used as the SSE `event:` field
    pub fn name(&self) -> &'static str {
        match self {
            Event::Submitted { .. } => "submitted",
            Event::Started { .. } => "started",
            Event::Progress { .. } => "progress",
            Event::ItemFailed { .. } => "item_failed",
            Event::Completed { .. } => "completed",
            Event::Failed { .. } => "failed",
            Event::Cleared { .. } => "cleared",
        }
    }
}
