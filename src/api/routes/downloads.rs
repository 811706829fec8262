//! Live download streams and artifact retrieval.

use super::{ArtifactQuery, StreamQuery, parse_platform};
use crate::api::AppState;
use crate::api::error_response::localized_response;
use crate::error::{Error, ErrorKind};
use crate::types::{FetchRequest, ProgressEvent};
use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{
        IntoResponse, Response,
        sse::{Event as SseEvent, KeepAlive, Sse},
    },
};
use futures::stream::{self, BoxStream, StreamExt};
use std::convert::Infallible;

type EventStream = BoxStream<'static, Result<SseEvent, Infallible>>;

/// GET /{platform}/download/stream - Download with live progress
///
/// Each progress event becomes one SSE event named after its kind (`progress`,
/// `resolved`, `done`, `error`, `fallback`) with the event as JSON data. Rejected
/// requests produce a single `error` event.
#[utoipa::path(
    get,
    path = "/api/{platform}/download/stream",
    tag = "downloads",
    params(
        ("platform" = String, Path, description = "facebook, instagram or tiktok"),
        StreamQuery
    ),
    responses(
        (status = 200, description = "Server-sent events stream (text/event-stream)", content_type = "text/event-stream", body = ProgressEvent)
    )
)]
pub async fn download_stream(
    State(state): State<AppState>,
    Path(platform): Path<String>,
    Query(query): Query<StreamQuery>,
) -> Sse<EventStream> {
    let catalog = *state.downloader.catalog();

    let stream: EventStream = match parse_platform(&platform) {
        Err(_) => single_error(catalog.message(ErrorKind::InvalidInput)),
        Ok(platform) => {
            let mut request = FetchRequest::new(platform, query.url);
            if let Some(title) = query.title.filter(|t| !t.trim().is_empty()) {
                request = request.with_title(title);
            }

            match state.downloader.submit_job(request).await {
                Ok(handle) => {
                    tracing::debug!(job_id = %handle.id, submission = ?handle.submission, "streaming job");
                    handle.events.filter_map(|event| async move { to_sse(&event) }).boxed()
                }
                Err(e) => {
                    tracing::info!(%platform, error = %e, "download request rejected");
                    single_error(catalog.message(e.kind()))
                }
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

fn single_error(message: &str) -> EventStream {
    let event = ProgressEvent::Error {
        message: message.to_string(),
    };
    stream::iter(to_sse(&event)).boxed()
}

fn to_sse(event: &ProgressEvent) -> Option<Result<SseEvent, Infallible>> {
    match serde_json::to_string(event) {
        Ok(json_data) => Some(Ok(SseEvent::default().event(event.name()).data(json_data))),
        Err(e) => {
            tracing::warn!("Failed to serialize event to JSON: {}", e);
            None
        }
    }
}

/// GET /{platform}/download - Fetch a finished artifact
#[utoipa::path(
    get,
    path = "/api/{platform}/download",
    tag = "downloads",
    params(
        ("platform" = String, Path, description = "facebook, instagram or tiktok"),
        ArtifactQuery
    ),
    responses(
        (status = 200, description = "Video file", content_type = "application/octet-stream"),
        (status = 404, description = "File not found", body = crate::error::ApiError)
    )
)]
pub async fn download_artifact(
    State(state): State<AppState>,
    Path(platform): Path<String>,
    Query(query): Query<ArtifactQuery>,
) -> Response {
    if let Err(e) = parse_platform(&platform) {
        return e.into_response();
    }

    match state.downloader.retrieve_artifact(&query.filename).await {
        Ok(bytes) => {
            let name = std::path::Path::new(query.filename.trim())
                .file_name()
                .map(|n| n.to_string_lossy().replace('"', ""))
                .unwrap_or_default();
            (
                [
                    (header::CONTENT_TYPE, "application/octet-stream".to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{name}\""),
                    ),
                ],
                bytes,
            )
                .into_response()
        }
        Err(e) => {
            if !matches!(e, Error::FileNotFound(_)) {
                tracing::error!(error = %e, "failed to read artifact");
            }
            localized_response(&e, state.downloader.catalog())
        }
    }
}
