//! HTTP error response handling for the API
//!
//! This module provides conversions from domain errors to HTTP responses
//! with appropriate status codes and JSON error bodies.

use crate::error::{ApiError, Error, ToHttpStatus};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Implement IntoResponse for Error to automatically convert errors to HTTP responses
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status_code =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let api_error: ApiError = self.into();

        (status_code, Json(api_error)).into_response()
    }
}

/// Implement IntoResponse for ApiError for explicit error responses
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Default to 500 if we're directly converting an ApiError
        // (usually errors go through Error::into_response which has the status code)
        (StatusCode::INTERNAL_SERVER_ERROR, Json(self)).into_response()
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DatabaseError, JobError, SubmissionError};
    use crate::types::JobId;

    async fn body_of(response: Response) -> ApiError {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_job_not_found_into_response() {
        let error = Error::Job(JobError::NotFound {
            id: JobId::from("abc"),
        });
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let api_error = body_of(response).await;
        assert_eq!(api_error.error.code, "job_not_found");
        assert!(api_error.error.message.contains("abc"));
        assert_eq!(api_error.error.details.unwrap()["job_id"], "abc");
    }

    #[tokio::test]
    async fn test_invalid_state_into_response() {
        let error = Error::Job(JobError::InvalidState {
            id: JobId::from("abc"),
            operation: "clear".to_string(),
            status: "running".to_string(),
        });
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::CONFLICT);

        let api_error = body_of(response).await;
        assert_eq!(api_error.error.code, "invalid_state");
        let details = api_error.error.details.unwrap();
        assert_eq!(details["operation"], "clear");
        assert_eq!(details["status"], "running");
    }

    #[tokio::test]
    async fn test_submission_error_into_response() {
        let response = Error::Submission(SubmissionError::NoIdentifiers).into_response();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body_of(response).await.error.code, "no_identifiers");
    }

    #[test]
    fn test_upstream_failure_is_bad_gateway() {
        let response =
            Error::Client(DatabaseError::Network("connection reset".into())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_shutting_down_is_service_unavailable() {
        assert_eq!(
            Error::ShuttingDown.into_response().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_bare_api_error_defaults_to_500() {
        let response = ApiError::validation("bad field path").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
