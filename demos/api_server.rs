//! REST API server demo
//!
//! Runs social-dl with the REST API enabled. Pass a JSON config file path as the
//! first argument to override the defaults.
//!
//! After starting, you can:
//! - View Swagger UI at http://localhost:8080/swagger-ui
//! - Stream a download via GET http://localhost:8080/api/tiktok/download/stream?url=...
//! - Fetch the file via GET http://localhost:8080/api/tiktok/download?filename=...
//! - Preview via POST http://localhost:8080/api/instagram/preview
//! - Stream all job events via GET http://localhost:8080/api/events

use social_dl::{Config, SocialDownloader, run_with_shutdown};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("social_dl=info,tower_http=info")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_json_file(path)?,
        None => {
            let mut config = Config::default();
            config.api.swagger_ui = true;
            config
        }
    };
    let address = config.api.bind_address;

    let downloader = Arc::new(SocialDownloader::new(config).await?);
    let capabilities = downloader.capabilities().await;
    if !capabilities.fetch_tool {
        tracing::warn!("yt-dlp not found; downloads will be rejected until it is installed");
    }

    println!("Starting social-dl REST API server");
    println!("Swagger UI: http://{address}/swagger-ui");
    println!();
    println!("Example commands:");
    println!("  # Download with live progress (Server-Sent Events)");
    println!(
        "  curl -N 'http://{address}/api/tiktok/download/stream?url=https%3A%2F%2Fwww.tiktok.com%2F%40user%2Fvideo%2F123'"
    );
    println!();
    println!("  # Preview");
    println!("  curl -X POST http://{address}/api/instagram/preview \\");
    println!("    -H 'Content-Type: application/json' \\");
    println!("    -d '{{\"url\": \"https://www.instagram.com/reel/abc123/\"}}'");

    let server = downloader.spawn_api_server();
    run_with_shutdown((*downloader).clone()).await;
    server.abort();

    Ok(())
}
