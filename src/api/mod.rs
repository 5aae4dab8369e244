//! REST API server module
//!
//! Exposes job submission, status polling and the event stream over HTTP.

use crate::{Config, JobRegistry, Result};
use axum::{
    Router,
    http::HeaderValue,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod error_response;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use state::AppState;

/// Create the API router with all route definitions
///
/// # Routes
///
/// ## Jobs
/// - `GET /jobs` - List all jobs
/// - `POST /jobs` - Submit a record job
/// - `DELETE /jobs` - Clear every finished job
/// - `POST /jobs/images` - Submit an image download job
/// - `GET /jobs/:id` - Get a job snapshot
/// - `DELETE /jobs/:id` - Clear a finished job
/// - `POST /jobs/:id/cancel` - Cancel a running job
///
/// ## System
/// - `GET /health` - Health check
/// - `GET /openapi.json` - OpenAPI specification
/// - `GET /events` - Server-sent events stream
pub fn create_router(registry: Arc<JobRegistry>, config: Arc<Config>) -> Router {
    let state = AppState::new(registry, config.clone());

    let router = Router::new()
        // Jobs
        .route(
            "/jobs",
            get(routes::list_jobs)
                .post(routes::submit_record_job)
                .delete(routes::clear_finished_jobs),
        )
        .route("/jobs/images", post(routes::submit_image_job))
        .route(
            "/jobs/:id",
            get(routes::get_job).delete(routes::clear_job),
        )
        .route("/jobs/:id/cancel", post(routes::cancel_job))
        // System
        .route("/health", get(routes::health_check))
        .route("/openapi.json", get(routes::openapi_spec))
        .route("/events", get(routes::event_stream))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if config.api.cors_enabled {
        let cors = build_cors_layer(&config.api.cors_origins);
        router.layer(cors)
    } else {
        router
    }
}

/// Build a CORS layer based on configured origins
///
/// `"*"` or an empty list allows any origin; otherwise only the listed
/// origins that parse as header values are allowed.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_any = origins.iter().any(|o| o == "*");

    if allow_any || origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Start the API server on the configured bind address.
///
/// Runs until the server stops or fails.
///
/// # Example
///
/// ```no_run
/// use hwdb_jobs::{Config, JobRegistry};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Arc::new(Config::default());
/// let registry = Arc::new(JobRegistry::new((*config).clone())?);
///
/// hwdb_jobs::api::start_api_server(registry, config).await?;
/// # Ok(())
/// # }
/// ```
pub async fn start_api_server(registry: Arc<JobRegistry>, config: Arc<Config>) -> Result<()> {
    let bind_address = config.api.bind_address;

    tracing::info!(
        address = %bind_address,
        "Starting API server"
    );

    let app = create_router(registry, config);

    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;

    tracing::info!(
        address = %bind_address,
        "API server listening"
    );

    axum::serve(listener, app)
        .await
        .map_err(|e| crate::error::Error::ApiServerError(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
