//! HWDB access.
//!
//! Jobs talk to the hardware database through the [`HwdbClient`] trait so the
//! worker can be exercised against an in-memory fake. [`RestClient`] is the
//! production implementation over the HWDB REST API.

use crate::error::DatabaseError;
use crate::types::RecordSource;
use async_trait::async_trait;
use serde_json::Value;

mod rest;

pub use rest::RestClient;

/// Remote retrieval operations used by jobs
///
/// JSON operations return the full response envelope; the record itself sits
/// under its `data` field (see [`extract_data`]).
#[async_trait]
pub trait HwdbClient: Send + Sync {
    /// Metadata record of one item
    async fn fetch_item(&self, part_id: &str) -> Result<Value, DatabaseError>;

    /// Latest test record of the given type for one item
    async fn fetch_latest_test(&self, part_id: &str, test_type: &str)
    -> Result<Value, DatabaseError>;

    /// Image metadata list for one item
    async fn list_images(&self, part_id: &str) -> Result<Value, DatabaseError>;

    /// Raw bytes of one image
    async fn fetch_image(&self, image_id: &str) -> Result<Vec<u8>, DatabaseError>;
}

/// Take the `data` field out of a response envelope
pub fn extract_data(mut response: Value) -> Result<Value, DatabaseError> {
    match response.get_mut("data") {
        Some(data) => Ok(data.take()),
        None => Err(DatabaseError::Malformed(
            "response has no 'data' field".to_string(),
        )),
    }
}

/// Fetch the record a job's source asks for
pub async fn fetch_record(
    client: &dyn HwdbClient,
    source: &RecordSource,
    part_id: &str,
) -> Result<Value, DatabaseError> {
    match source {
        RecordSource::Item => client.fetch_item(part_id).await,
        RecordSource::LatestTest { test_type } => {
            client.fetch_latest_test(part_id, test_type).await
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extract_data_takes_envelope_field() {
        let data = extract_data(json!({"data": {"part_id": "A"}, "status": "OK"})).unwrap();
        assert_eq!(data, json!({"part_id": "A"}));
    }

    #[test]
    fn extract_data_requires_field() {
        let err = extract_data(json!({"status": "ERROR"})).unwrap_err();
        assert!(matches!(err, DatabaseError::Malformed(_)));
    }

    #[test]
    fn extract_data_on_non_object_is_malformed() {
        assert!(extract_data(json!([1, 2])).is_err());
    }
}
