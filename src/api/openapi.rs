//! OpenAPI documentation and schema generation

use utoipa::OpenApi;

/// OpenAPI documentation for the hwdb-jobs REST API
///
/// Served at `/api/v1/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "hwdb-jobs REST API",
        version = "0.1.0",
        description = "Submit HWDB export and image download jobs and poll their progress",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:6790/api/v1", description = "Local development server")
    ),
    paths(
        // Jobs
        crate::api::routes::list_jobs,
        crate::api::routes::submit_record_job,
        crate::api::routes::submit_image_job,
        crate::api::routes::get_job,
        crate::api::routes::cancel_job,
        crate::api::routes::clear_job,
        crate::api::routes::clear_finished_jobs,

        // System
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
        crate::api::routes::event_stream,
    ),
    components(schemas(
        crate::types::JobId,
        crate::types::JobStatus,
        crate::types::JobKind,
        crate::types::OutputMode,
        crate::types::RecordSource,
        crate::types::LogicOperator,
        crate::types::FieldThreshold,
        crate::types::FilterSpec,
        crate::types::RecordJobRequest,
        crate::types::ImageJobRequest,
        crate::types::JobSnapshot,
        crate::types::Event,

        crate::api::routes::SubmitJobResponse,
        crate::api::routes::ClearedJobsResponse,

        crate::error::ApiError,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "jobs", description = "Jobs - Submit exports and image downloads, poll status, cancel and clear"),
        (name = "system", description = "System endpoints - Health checks, OpenAPI spec, events"),
    )
)]
pub struct ApiDoc;
