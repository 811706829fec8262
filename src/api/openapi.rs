//! OpenAPI documentation and schema generation
//!
//! This module defines the OpenAPI specification for the social-dl REST API
//! using utoipa for compile-time spec generation.

use utoipa::OpenApi;

/// OpenAPI documentation for the social-dl REST API
///
/// The spec can be accessed via:
/// - `/api/openapi.json` - JSON format OpenAPI specification
/// - `/swagger-ui` - Interactive Swagger UI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "social-dl REST API",
        version = "0.1.0",
        description = "Download Facebook, Instagram and TikTok videos with live progress, previews and artifact retrieval",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server")
    ),
    paths(
        // Downloads
        crate::api::routes::download_stream,
        crate::api::routes::download_artifact,

        // Preview
        crate::api::routes::preview,

        // Jobs
        crate::api::routes::list_jobs,
        crate::api::routes::get_job,

        // System
        crate::api::routes::get_capabilities,
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
        crate::api::routes::event_stream,
    ),
    components(schemas(
        // Core types from types.rs
        crate::types::Platform,
        crate::types::JobId,
        crate::types::JobState,
        crate::types::JobRecord,
        crate::types::JobEvent,
        crate::types::ProgressEvent,
        crate::types::PreviewResult,
        crate::types::PreviewSource,
        crate::types::Capabilities,

        // Config types from config.rs
        crate::config::Config,
        crate::config::DownloadConfig,
        crate::config::ToolsConfig,
        crate::config::TikTokConfig,
        crate::config::RetryConfig,
        crate::config::ReaperConfig,
        crate::config::PreviewConfig,
        crate::config::ApiConfig,
        crate::messages::Locale,

        // API request/response types from routes
        crate::api::routes::StreamQuery,
        crate::api::routes::ArtifactQuery,
        crate::api::routes::PreviewRequest,
        crate::api::routes::PreviewResponse,

        // Error types from error.rs
        crate::error::ApiError,
        crate::error::ErrorDetail,
        crate::error::ErrorKind,
    )),
    tags(
        (name = "downloads", description = "Downloads - Stream progress while fetching a video, then retrieve the file"),
        (name = "preview", description = "Preview - Title, thumbnail and media URL without downloading"),
        (name = "jobs", description = "Jobs - Read-only view of submitted jobs and their outcomes"),
        (name = "system", description = "System endpoints - Health checks, tool capabilities, OpenAPI spec, events"),
    )
)]
pub struct ApiDoc;
