//! In-memory HWDB fake and registry builders for job tests.

use crate::client::HwdbClient;
use crate::config::{Config, FileCollisionAction, RetryConfig};
use crate::error::DatabaseError;
use crate::jobs::JobRegistry;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Scriptable HWDB fake
///
/// Unknown identifiers answer `NotFound`. Every call is counted and the
/// peak number of concurrent calls is tracked.
#[derive(Default)]
pub(crate) struct MockClient {
    items: HashMap<String, Result<Value, DatabaseError>>,
    tests: HashMap<(String, String), Value>,
    image_lists: HashMap<String, Result<Value, DatabaseError>>,
    images: HashMap<String, Result<Vec<u8>, DatabaseError>>,
    delays: HashMap<String, Duration>,
    default_delay: Duration,
    pub(crate) calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub(crate) peak_in_flight: AtomicUsize,
    pub(crate) image_requests: Mutex<Vec<String>>,
}

impl MockClient {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Item whose response envelope wraps `data`
    pub(crate) fn with_item(mut self, part_id: &str, data: Value) -> Self {
        self.items
            .insert(part_id.to_string(), Ok(json!({ "data": data })));
        self
    }

    /// Item answering with a raw envelope (e.g. one lacking `data`)
    pub(crate) fn with_raw_item(mut self, part_id: &str, response: Value) -> Self {
        self.items.insert(part_id.to_string(), Ok(response));
        self
    }

    pub(crate) fn with_item_error(mut self, part_id: &str, error: DatabaseError) -> Self {
        self.items.insert(part_id.to_string(), Err(error));
        self
    }

    pub(crate) fn with_test(mut self, part_id: &str, test_type: &str, data: Value) -> Self {
        self.tests.insert(
            (part_id.to_string(), test_type.to_string()),
            json!({ "data": data }),
        );
        self
    }

    pub(crate) fn with_image_list(mut self, part_id: &str, records: Value) -> Self {
        self.image_lists
            .insert(part_id.to_string(), Ok(json!({ "data": records })));
        self
    }

    pub(crate) fn with_image_list_error(mut self, part_id: &str, error: DatabaseError) -> Self {
        self.image_lists.insert(part_id.to_string(), Err(error));
        self
    }

    pub(crate) fn with_image(mut self, image_id: &str, bytes: &[u8]) -> Self {
        self.images.insert(image_id.to_string(), Ok(bytes.to_vec()));
        self
    }

    pub(crate) fn with_image_error(mut self, image_id: &str, error: DatabaseError) -> Self {
        self.images.insert(image_id.to_string(), Err(error));
        self
    }

    /// Delay for calls about one id (part id or image id)
    pub(crate) fn with_delay(mut self, id: &str, delay: Duration) -> Self {
        self.delays.insert(id.to_string(), delay);
        self
    }

    /// Delay for every call without a specific one
    pub(crate) fn with_default_delay(mut self, delay: Duration) -> Self {
        self.default_delay = delay;
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn peak(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub(crate) fn requested_images(&self) -> Vec<String> {
        self.image_requests.lock().unwrap().clone()
    }

    async fn enter(&self, id: &str) -> InFlight<'_> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        let guard = InFlight(&self.in_flight);
        let delay = self.delays.get(id).copied().unwrap_or(self.default_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        guard
    }
}

/// Decrements the in-flight counter on drop, including on timeout
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn not_found(what: &str) -> DatabaseError {
    DatabaseError::NotFound(what.to_string())
}

#[async_trait]
impl HwdbClient for MockClient {
    async fn fetch_item(&self, part_id: &str) -> Result<Value, DatabaseError> {
        let _guard = self.enter(part_id).await;
        self.items
            .get(part_id)
            .cloned()
            .unwrap_or_else(|| Err(not_found(part_id)))
    }

    async fn fetch_latest_test(
        &self,
        part_id: &str,
        test_type: &str,
    ) -> Result<Value, DatabaseError> {
        let _guard = self.enter(part_id).await;
        self.tests
            .get(&(part_id.to_string(), test_type.to_string()))
            .cloned()
            .ok_or_else(|| not_found(part_id))
    }

    async fn list_images(&self, part_id: &str) -> Result<Value, DatabaseError> {
        let _guard = self.enter(part_id).await;
        self.image_lists
            .get(part_id)
            .cloned()
            .unwrap_or_else(|| Ok(json!({ "data": [] })))
    }

    async fn fetch_image(&self, image_id: &str) -> Result<Vec<u8>, DatabaseError> {
        self.image_requests
            .lock()
            .unwrap()
            .push(image_id.to_string());
        let _guard = self.enter(image_id).await;
        self.images
            .get(image_id)
            .cloned()
            .unwrap_or_else(|| Err(not_found(image_id)))
    }
}

/// Config writing under `dir`, without retries and with short timeouts
pub(crate) fn test_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.output.output_dir = dir.join("out");
    config.output.file_collision = FileCollisionAction::Rename;
    config.pool.max_concurrent_fetches = 4;
    config.fetch.timeout = Duration::from_secs(5);
    config.fetch.retry = RetryConfig::none();
    config
}

/// Registry over a fake client; the client is returned for call inspection
pub(crate) fn registry_with(client: MockClient, config: Config) -> (JobRegistry, Arc<MockClient>) {
    let client = Arc::new(client);
    let registry = JobRegistry::with_client(config, client.clone()).unwrap();
    (registry, client)
}

/// Item record shaped like an HWDB component
pub(crate) fn component(serial: &str, tests: &[(&str, f64)]) -> Value {
    json!({
        "serial_number": serial,
        "location": {"site": "FNAL", "status": "installed"},
        "tests": tests
            .iter()
            .map(|(name, value)| json!({"name": name, "value": value}))
            .collect::<Vec<_>>(),
    })
}

/// Image list entry
pub(crate) fn image_record(image_id: &str, name: &str) -> Value {
    json!({"image_id": image_id, "image_name": name})
}

/// Every file directly inside `dir` (empty if the directory is missing)
pub(crate) fn files_in(dir: &Path) -> Vec<std::path::PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<_> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    files.sort();
    files
}
