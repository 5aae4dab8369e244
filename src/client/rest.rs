//! reqwest-backed HWDB client

use super::HwdbClient;
use crate::config::HwdbConfig;
use crate::error::{DatabaseError, Error, Result};
use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde_json::Value;
use url::Url;

/// Longest error body kept in a [`DatabaseError::Http`] message
const MAX_ERROR_BODY: usize = 256;

/// HWDB REST API client
///
/// Cheap to clone; the underlying connection pool is shared.
#[derive(Clone, Debug)]
pub struct RestClient {
    http: reqwest::Client,
    base: Url,
    token: Option<String>,
}

impl RestClient {
    /// Create a client from connection settings
    ///
    /// # Errors
    /// Returns a configuration error if the base URL does not parse or the
    /// HTTP client cannot be built.
    pub fn new(config: &HwdbConfig) -> Result<Self> {
        let mut base = config.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base = Url::parse(&base).map_err(|e| Error::Config {
            message: format!("invalid HWDB base URL '{}': {}", config.base_url, e),
            key: Some("hwdb.base_url".to_string()),
        })?;

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("hwdb-jobs/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base,
            token: config.token.clone(),
        })
    }

    /// Base URL every endpoint is resolved against
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, segments: &[&str]) -> std::result::Result<Url, DatabaseError> {
        let path = segments
            .iter()
            .map(|s| urlencoding::encode(s).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        self.base
            .join(&path)
            .map_err(|e| DatabaseError::Malformed(format!("cannot build URL for '{}': {}", path, e)))
    }

    fn get(&self, url: Url) -> RequestBuilder {
        let request = self.http.get(url);
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> std::result::Result<Response, DatabaseError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let url = response.url().to_string();
        if status == StatusCode::NOT_FOUND {
            return Err(DatabaseError::NotFound(what.to_string()));
        }

        let mut message = response.text().await.unwrap_or_default();
        if message.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !message.is_char_boundary(cut) {
                cut -= 1;
            }
            message.truncate(cut);
        }
        if message.is_empty() {
            message = status.canonical_reason().unwrap_or("request failed").to_string();
        }

        Err(DatabaseError::Http {
            status: status.as_u16(),
            url,
            message,
        })
    }

    async fn get_json(&self, url: Url, what: &str) -> std::result::Result<Value, DatabaseError> {
        tracing::debug!(url = %url, "HWDB request");
        let response = self.send(self.get(url), what).await?;
        response
            .json::<Value>()
            .await
            .map_err(|e| DatabaseError::Malformed(format!("{}: {}", what, e)))
    }
}

#[async_trait]
impl HwdbClient for RestClient {
    async fn fetch_item(&self, part_id: &str) -> std::result::Result<Value, DatabaseError> {
        let url = self.endpoint(&["components", part_id])?;
        self.get_json(url, part_id).await
    }

    async fn fetch_latest_test(
        &self,
        part_id: &str,
        test_type: &str,
    ) -> std::result::Result<Value, DatabaseError> {
        let mut url = self.endpoint(&["components", part_id, "tests", test_type])?;
        url.query_pairs_mut().append_pair("history", "false");
        self.get_json(url, &format!("{} test '{}'", part_id, test_type))
            .await
    }

    async fn list_images(&self, part_id: &str) -> std::result::Result<Value, DatabaseError> {
        let url = self.endpoint(&["components", part_id, "images"])?;
        self.get_json(url, &format!("images of {}", part_id)).await
    }

    async fn fetch_image(&self, image_id: &str) -> std::result::Result<Vec<u8>, DatabaseError> {
        let url = self.endpoint(&["img", image_id])?;
        tracing::debug!(url = %url, "HWDB image request");
        let response = self.send(self.get(url), &format!("image {}", image_id)).await?;
        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, token: Option<&str>) -> RestClient {
        RestClient::new(&HwdbConfig {
            base_url: format!("{}/cdb/api/v1", server.uri()),
            token: token.map(String::from),
            request_timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[test]
    fn invalid_base_url_is_a_config_error() {
        let err = RestClient::new(&HwdbConfig {
            base_url: "not a url".into(),
            ..HwdbConfig::default()
        })
        .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn base_url_gains_trailing_slash() {
        let client = RestClient::new(&HwdbConfig {
            base_url: "https://hwdb.example/cdb/api/v1".into(),
            ..HwdbConfig::default()
        })
        .unwrap();
        assert_eq!(client.base_url().as_str(), "https://hwdb.example/cdb/api/v1/");
        assert_eq!(
            client.endpoint(&["components", "Z001/2"]).unwrap().as_str(),
            "https://hwdb.example/cdb/api/v1/components/Z001%2F2"
        );
    }

    #[tokio::test]
    async fn fetch_item_sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cdb/api/v1/components/Z00100300001-00042"))
            .and(header("authorization", "Bearer s3cret"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"data": {"serial_number": "SN42"}, "status": "OK"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, Some("s3cret"));
        let response = client.fetch_item("Z00100300001-00042").await.unwrap();
        assert_eq!(response["data"]["serial_number"], "SN42");
    }

    #[tokio::test]
    async fn latest_test_requests_without_history() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cdb/api/v1/components/Z001/tests/IV_curve"))
            .and(query_param("history", "false"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .mount(&server)
            .await;

        let client = client_for(&server, None);
        let response = client.fetch_latest_test("Z001", "IV_curve").await.unwrap();
        assert_eq!(response["data"], json!([]));
    }

    #[tokio::test]
    async fn not_found_is_classified() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = client_for(&server, None).fetch_item("nope").await.unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound(ref what) if what == "nope"));
    }

    #[tokio::test]
    async fn server_error_keeps_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let err = client_for(&server, None).list_images("Z001").await.unwrap_err();
        match err {
            DatabaseError::Http { status, message, .. } => {
                assert_eq!(status, 503);
                assert_eq!(message, "maintenance");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_json_body_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
            .mount(&server)
            .await;

        let err = client_for(&server, None).fetch_item("Z001").await.unwrap_err();
        assert!(matches!(err, DatabaseError::Malformed(_)));
    }

    #[tokio::test]
    async fn fetch_image_returns_raw_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cdb/api/v1/img/7781"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0x89, b'P', b'N', b'G']))
            .mount(&server)
            .await;

        let bytes = client_for(&server, None).fetch_image("7781").await.unwrap();
        assert_eq!(bytes, vec![0x89, b'P', b'N', b'G']);
    }
}
