//! REST API end to end over a real fetch-tool subprocess

#![cfg(unix)]
#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{FAKE_VIDEO, FakeTool, Sandbox};
use serial_test::serial;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

async fn body_string(response: axum::response::Response) -> String {
    let bytes = tokio::time::timeout(
        Duration::from_secs(20),
        axum::body::to_bytes(response.into_body(), usize::MAX),
    )
    .await
    .expect("response body did not finish")
    .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
#[serial]
async fn stream_then_fetch_artifact() {
    let sandbox = Sandbox::new(FakeTool::Succeed);
    let downloader = Arc::new(sandbox.downloader().await);
    let app = social_dl::api::create_router(downloader.clone(), downloader.get_config());

    let url = urlencoding::encode("https://vm.tiktok.com/ZMabc123/");
    let response = app
        .clone()
        .oneshot(get(&format!("/api/tiktok/download/stream?url={url}&title=Dance")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_string(response).await;
    assert!(body.contains("event: progress"), "{body}");
    assert!(body.contains("event: done"), "{body}");
    assert!(body.contains("Dance.mp4"), "{body}");

    let response = app
        .clone()
        .oneshot(get("/api/tiktok/download?filename=Dance.mp4"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, FAKE_VIDEO);

    let response = app.oneshot(get("/api/jobs/1")).await.unwrap();
    let job: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(job["state"], "succeeded");
    assert_eq!(job["platform"], "tiktok");

    downloader.shutdown().await;
}

#[tokio::test]
#[serial]
async fn failing_tool_streams_fallback() {
    let sandbox = Sandbox::new(FakeTool::Fail);
    let downloader = Arc::new(sandbox.downloader().await);
    let app = social_dl::api::create_router(downloader.clone(), downloader.get_config());

    let url = urlencoding::encode("https://www.facebook.com/reel/987654/");
    let response = app
        .oneshot(get(&format!("/api/facebook/download/stream?url={url}&title=x")))
        .await
        .unwrap();

    let body = body_string(response).await;
    assert!(body.contains("event: fallback"), "{body}");
    assert!(body.contains("https://www.facebook.com/reel/987654/"), "{body}");
    assert_eq!(sandbox.launches().len(), 3);

    downloader.shutdown().await;
}
