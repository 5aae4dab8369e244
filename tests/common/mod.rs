//! Common test utilities for hwdb-jobs integration tests

use hwdb_jobs::config::RetryConfig;
use hwdb_jobs::{Config, JobId, JobRegistry, JobSnapshot};
use serde_json::{Value, json};
use std::path::Path;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Path prefix the fake HWDB serves under
pub const API_PREFIX: &str = "/cdb/api/v1";

/// Config pointed at `server`, writing under `dir`
pub fn config_for(server: &MockServer, dir: &Path) -> Config {
    let mut config = Config::default();
    config.hwdb.base_url = format!("{}{}", server.uri(), API_PREFIX);
    config.hwdb.token = Some("test-token".into());
    config.output.output_dir = dir.join("out");
    config.pool.max_concurrent_fetches = 3;
    config.fetch.timeout = Duration::from_secs(5);
    config.fetch.retry = RetryConfig::none();
    config
}

/// Serve `GET components/{part_id}` with `data` inside the usual envelope
pub async fn mount_component(server: &MockServer, part_id: &str, data: Value) {
    Mock::given(method("GET"))
        .and(path(format!("{API_PREFIX}/components/{part_id}")))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"data": data, "status": "OK"})),
        )
        .mount(server)
        .await;
}

/// Serve `GET components/{part_id}/images`
pub async fn mount_image_list(server: &MockServer, part_id: &str, images: Value) {
    Mock::given(method("GET"))
        .and(path(format!("{API_PREFIX}/components/{part_id}/images")))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"data": images, "status": "OK"})),
        )
        .mount(server)
        .await;
}

/// Serve `GET img/{image_id}` with `status` and `body`
pub async fn mount_image(server: &MockServer, image_id: &str, status: u16, body: &[u8]) {
    Mock::given(method("GET"))
        .and(path(format!("{API_PREFIX}/img/{image_id}")))
        .respond_with(ResponseTemplate::new(status).set_body_bytes(body.to_vec()))
        .mount(server)
        .await;
}

/// Wait for a job to reach a terminal state
pub async fn wait_for_job(registry: &JobRegistry, id: &JobId) -> JobSnapshot {
    tokio::time::timeout(Duration::from_secs(15), registry.wait(id))
        .await
        .expect("job did not finish in time")
        .expect("job is known")
}
