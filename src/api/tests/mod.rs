use super::*;
use crate::jobs::test_helpers::{MockClient, component, test_config};
use axum::body::Body;
use axum::http::Request;
use axum::http::StatusCode;
use serde_json::{Value, json};
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;


/// Registry over a fake client plus a router serving it
fn test_app(client: MockClient) -> (Router, Arc<JobRegistry>, TempDir) {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let registry =
        Arc::new(JobRegistry::with_client(config.clone(), Arc::new(client)).unwrap());
    let router = create_router(registry.clone(), Arc::new(config));
    (router, registry, dir)
}

/// Send one request and decode the JSON body (Null when empty)
async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, value)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn method(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_api_server_spawns() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path());
    config.api.bind_address = "127.0.0.1:0".parse().unwrap(); // Port 0 = OS assigns a free port
    let config = Arc::new(config);
    let registry = Arc::new(
        JobRegistry::with_client((*config).clone(), Arc::new(MockClient::new())).unwrap(),
    );

    let api_handle = tokio::spawn(start_api_server(registry, config));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!api_handle.is_finished(), "server exited early");
    api_handle.abort();
}

#[tokio::test]
async fn test_cors_enabled() {
    let (app, _registry, _dir) = test_app(MockClient::new());

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .headers()
            .contains_key("access-control-allow-origin"),
        "CORS header should be present when CORS is enabled"
    );
}

#[tokio::test]
async fn test_cors_disabled() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path());
    config.api.cors_enabled = false;
    let registry = Arc::new(
        JobRegistry::with_client(config.clone(), Arc::new(MockClient::new())).unwrap(),
    );
    let app = create_router(registry, Arc::new(config));

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        !response
            .headers()
            .contains_key("access-control-allow-origin")
    );
}

#[test]
fn test_cors_specific_origins() {
    // Unparseable origins are dropped rather than rejected
    let _layer = build_cors_layer(&["http://localhost:3000".to_string(), "bad\norigin".to_string()]);
}

#[tokio::test]
async fn test_spawn_api_server_method() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path());
    config.api.bind_address = "127.0.0.1:0".parse().unwrap();
    let registry =
        Arc::new(JobRegistry::with_client(config, Arc::new(MockClient::new())).unwrap());

    let api_handle = registry.spawn_api_server();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!api_handle.is_finished());
    api_handle.abort();
}
