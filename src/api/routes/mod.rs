//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`downloads`] — Live download streams and artifact retrieval
//! - [`preview`] — Metadata lookups without downloading
//! - [`jobs`] — Read-only job registry
//! - [`system`] — Health, capabilities, events, OpenAPI

use crate::error::ApiError;
use crate::types::Platform;
use serde::{Deserialize, Serialize};

mod downloads;
mod jobs;
mod preview;
mod system;

// Re-export all handlers so `routes::function_name` continues to work
pub use downloads::*;
pub use jobs::*;
pub use preview::*;
pub use system::*;

// ============================================================================
// Query/Request Types (shared across handlers)
// ============================================================================

/// Query parameters for GET /{platform}/download/stream
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StreamQuery {
    /// Source page URL
    #[serde(default)]
    pub url: String,
    /// Optional title used to name the artifact
    pub title: Option<String>,
}

/// Query parameters for GET /{platform}/download
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ArtifactQuery {
    /// Artifact file name as reported by the `done` event
    #[serde(default)]
    pub filename: String,
}

/// Request body for POST /{platform}/preview
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct PreviewRequest {
    /// Source page URL
    pub url: String,
}

/// Parse the `{platform}` path segment
fn parse_platform(raw: &str) -> Result<Platform, ApiError> {
    raw.parse::<Platform>()
        .map_err(|_| ApiError::not_found(format!("platform '{raw}'")))
}
