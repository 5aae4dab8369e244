//! Configuration types for hwdb-jobs

use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::Path, path::PathBuf, time::Duration};
use utoipa::ToSchema;

use crate::error::{Error, Result};

/// Connection settings for the HWDB REST API
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct HwdbConfig {
    /// Base URL of the REST API (default: "https://localhost/cdbdev/api/v1/")
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token sent with every request (None = anonymous)
    #[serde(default)]
    pub token: Option<String>,

    /// Timeout applied by the HTTP client to a whole request (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_ms_serde")]
    #[schema(value_type = u64)]
    pub request_timeout: Duration,
}

impl Default for HwdbConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: None,
            request_timeout: default_request_timeout(),
        }
    }
}

/// Shared fetch pool sizing
///
/// One pool serves every job in the process, so this caps the number of
/// concurrent outbound calls regardless of how many jobs are running.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct PoolConfig {
    /// Maximum concurrent fetches across all jobs (default: 8)
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: default_max_concurrent_fetches(),
        }
    }
}

/// Per-fetch policy (timeout and retry)
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct FetchConfig {
    /// Timeout for one fetch attempt; expiry counts as a per-item failure (default: 60 seconds)
    #[serde(default = "default_fetch_timeout", with = "duration_ms_serde")]
    #[schema(value_type = u64)]
    pub timeout: Duration,

    /// Retry policy for transient failures
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: default_fetch_timeout(),
            retry: RetryConfig::default(),
        }
    }
}

/// Retry configuration for transient failures
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first try (default: 2)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 500 ms)
    #[serde(default = "default_initial_delay", with = "duration_ms_serde")]
    #[schema(value_type = u64)]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 10 seconds)
    #[serde(default = "default_max_delay", with = "duration_ms_serde")]
    #[schema(value_type = u64)]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// A policy that never retries
    pub fn none() -> Self {
        Self {
            max_attempts: 0,
            ..Self::default()
        }
    }
}

/// File collision handling strategy for output files
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FileCollisionAction {
    /// Append (1), (2), etc. to filename (default)
    #[default]
    Rename,
    /// Overwrite existing file
    Overwrite,
    /// Refuse to write; the job fails with a persistence error
    Skip,
}

/// Where and how job output is written
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct OutputConfig {
    /// Default output directory (default: "./output")
    #[serde(default = "default_output_dir")]
    #[schema(value_type = String)]
    pub output_dir: PathBuf,

    /// What to do when the generated filename already exists (default: rename)
    #[serde(default)]
    pub file_collision: FileCollisionAction,

    /// Write a companion `<stem>_filters.json` for tabular exports carrying a filter (default: true)
    #[serde(default = "default_true")]
    pub write_filter_metadata: bool,

    /// CSV field delimiter (default: ',')
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            file_collision: FileCollisionAction::default(),
            write_filter_metadata: true,
            delimiter: default_delimiter(),
        }
    }
}

/// REST status API configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiConfig {
    /// Address to bind to (default: 127.0.0.1:6790)
    #[serde(default = "default_bind_address")]
    #[schema(value_type = String)]
    pub bind_address: SocketAddr,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            cors_enabled: true,
            cors_origins: default_cors_origins(),
        }
    }
}

/// Main configuration for the job engine
///
/// Every field has a default, so `Config::default()` and an empty JSON object
/// both produce a working configuration pointed at a local HWDB instance.
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct Config {
    /// HWDB REST API connection
    #[serde(default)]
    pub hwdb: HwdbConfig,

    /// Shared fetch pool
    #[serde(default)]
    pub pool: PoolConfig,

    /// Per-fetch timeout and retry
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Output location and naming
    #[serde(default)]
    pub output: OutputConfig,

    /// Status API
    #[serde(default)]
    pub api: ApiConfig,
}

impl Config {
    /// Load configuration from a JSON file and validate it
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("cannot read {}: {}", path.display(), e),
            key: None,
        })?;
        let config: Config = serde_json::from_str(&text).map_err(|e| Error::Config {
            message: format!("invalid config {}: {}", path.display(), e),
            key: None,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that serde cannot reject on its own
    pub fn validate(&self) -> Result<()> {
        if self.pool.max_concurrent_fetches == 0 {
            return Err(Error::Config {
                message: "must be at least 1".to_string(),
                key: Some("pool.max_concurrent_fetches".to_string()),
            });
        }
        if self.fetch.timeout.is_zero() {
            return Err(Error::Config {
                message: "must be greater than zero".to_string(),
                key: Some("fetch.timeout".to_string()),
            });
        }
        if self.fetch.retry.backoff_multiplier < 1.0 {
            return Err(Error::Config {
                message: "must be >= 1.0".to_string(),
                key: Some("fetch.retry.backoff_multiplier".to_string()),
            });
        }
        if !self.output.delimiter.is_ascii() {
            return Err(Error::Config {
                message: "must be a single ASCII character".to_string(),
                key: Some("output.delimiter".to_string()),
            });
        }
        url::Url::parse(&self.hwdb.base_url).map_err(|e| Error::Config {
            message: format!("invalid URL: {}", e),
            key: Some("hwdb.base_url".to_string()),
        })?;
        Ok(())
    }
}

// Default value functions
fn default_base_url() -> String {
    "https://localhost/cdbdev/api/v1/".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_max_concurrent_fetches() -> usize {
    8
}

fn default_fetch_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_max_attempts() -> u32 {
    2
}

fn default_initial_delay() -> Duration {
    Duration::from_millis(500)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(10)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_true() -> bool {
    true
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_delimiter() -> char {
    ','
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 6790))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".into()]
}

// Duration serialization helper (milliseconds)
mod duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
