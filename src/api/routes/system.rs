//! System handlers: health, capabilities, OpenAPI, events.

use crate::api::AppState;
use crate::types::JobEvent;
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{
        IntoResponse,
        sse::{Event as SseEvent, KeepAlive, Sse},
    },
};
use serde_json::json;
use std::convert::Infallible;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::{BroadcastStream, errors::BroadcastStreamRecvError};

/// GET /health - Liveness plus whether shutdown has begun
#[utoipa::path(
    get,
    path = "/api/health",
    tag = "system",
    responses(
        (status = 200, description = "Service is healthy")
    )
)]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": if state.downloader.is_shutting_down() { "shutting_down" } else { "ok" },
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// GET /capabilities - Query external tool availability
#[utoipa::path(
    get,
    path = "/api/capabilities",
    tag = "system",
    responses(
        (status = 200, description = "Current tool availability", body = crate::types::Capabilities)
    )
)]
pub async fn get_capabilities(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.downloader.capabilities().await))
}

/// GET /openapi.json - Generated API document
#[utoipa::path(
    get,
    path = "/api/openapi.json",
    tag = "system",
    responses(
        (status = 200, description = "Generated OpenAPI document")
    )
)]
pub async fn openapi_spec() -> impl IntoResponse {
    use crate::api::openapi::ApiDoc;
    use utoipa::OpenApi;

    Json(ApiDoc::openapi())
}

/// GET /events - Server-sent events for every job
#[utoipa::path(
    get,
    path = "/api/events",
    tag = "system",
    responses(
        (status = 200, description = "Server-sent events stream (text/event-stream)", content_type = "text/event-stream", body = crate::types::JobEvent)
    )
)]
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>> {
    let events = BroadcastStream::new(state.downloader.subscribe()).filter_map(|received| {
        let event = match received {
            Ok(job_event) => relayed(&job_event),
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "event subscriber fell behind");
                Some(SseEvent::default().event("lagged").data(json!({ "skipped": skipped }).to_string()))
            }
        };
        event.map(Ok)
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}

/// One bus event as SSE, named after the wrapped progress kind
fn relayed(job_event: &JobEvent) -> Option<SseEvent> {
    serde_json::to_string(job_event)
        .inspect_err(|e| tracing::warn!(job_id = %job_event.job_id, error = %e, "dropping unserializable event"))
        .ok()
        .map(|data| SseEvent::default().event(job_event.event.name()).data(data))
}
