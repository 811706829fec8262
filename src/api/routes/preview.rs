//! Metadata lookups without downloading.

use super::{PreviewRequest, parse_platform};
use crate::api::AppState;
use crate::api::error_response::localized_response;
use crate::types::PreviewResult;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Response for POST /{platform}/preview
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct PreviewResponse {
    /// Resolved metadata; a missing thumbnail is replaced by the placeholder
    #[serde(flatten)]
    pub preview: PreviewResult,
    /// Set when the placeholder thumbnail was substituted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

/// POST /{platform}/preview - Look up title, thumbnail and media URL
#[utoipa::path(
    post,
    path = "/api/{platform}/preview",
    tag = "preview",
    params(
        ("platform" = String, Path, description = "facebook, instagram or tiktok")
    ),
    request_body = PreviewRequest,
    responses(
        (status = 200, description = "Video metadata", body = PreviewResponse),
        (status = 400, description = "Invalid URL", body = crate::error::ApiError),
        (status = 502, description = "Preview failed", body = crate::error::ApiError),
        (status = 503, description = "Fetch tool unavailable", body = crate::error::ApiError)
    )
)]
pub async fn preview(
    State(state): State<AppState>,
    Path(platform): Path<String>,
    Json(request): Json<PreviewRequest>,
) -> Response {
    let platform = match parse_platform(&platform) {
        Ok(platform) => platform,
        Err(e) => return e.into_response(),
    };

    match state.downloader.fetch_preview(platform, &request.url).await {
        Ok(mut preview) => {
            let notice = if preview.thumbnail_url.is_none() {
                preview.thumbnail_url = Some(state.config.preview.placeholder_thumbnail.clone());
                Some(state.downloader.catalog().invalid_thumbnail().to_string())
            } else {
                None
            };
            (StatusCode::OK, Json(PreviewResponse { preview, notice })).into_response()
        }
        Err(e) => {
            tracing::warn!(%platform, error = %e, "preview failed");
            localized_response(&e, state.downloader.catalog())
        }
    }
}
