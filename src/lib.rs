//! # social-dl
//!
//! Job orchestration for social-media video downloads.
//!
//! Given a Facebook, Instagram or TikTok link, social-dl runs the media-fetch tool
//! (`yt-dlp`) under supervision, turns its output into live progress events, retries
//! with a fixed policy and, when every attempt fails, tells the client to use the
//! original link instead. Finished files live under one temp root and are reaped by
//! age.
//!
//! ## Quick Start
//!
//! ```no_run
//! use futures::StreamExt;
//! use social_dl::{Config, FetchRequest, Platform, SocialDownloader};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let downloader = SocialDownloader::new(Config::default()).await?;
//!
//!     let request = FetchRequest::new(
//!         Platform::TikTok,
//!         "https://www.tiktok.com/@creator/video/7300000000000000000",
//!     );
//!     let mut job = downloader.submit_job(request).await?;
//!     while let Some(event) = job.events.next().await {
//!         println!("{}: {:?}", event.name(), event);
//!     }
//!
//!     downloader.shutdown().await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Fetch tool argument construction
pub mod command;
/// Configuration types
pub mod config;
/// Core downloader implementation (decomposed into focused submodules)
pub mod downloader;
/// Error types
pub mod error;
/// Client-facing message catalog
pub mod messages;
/// Fetch tool output classification
pub mod parser;
/// Bounded worker pool
pub mod pool;
/// Preview lookups (oEmbed and fetch tool)
pub mod preview;
/// Per-session event relay
pub mod relay;
/// Retry and fallback policy
pub mod retry;
/// Artifact storage and reaping
pub mod store;
/// Subprocess supervision
pub mod supervisor;
/// Core types and events
pub mod types;
/// URL validation and title sanitizing
pub mod validation;

// Re-export commonly used types
pub use config::Config;
pub use downloader::{JobHandle, SocialDownloader};
pub use error::{ApiError, Error, ErrorDetail, ErrorKind, Result, ToHttpStatus};
pub use messages::{Locale, MessageCatalog};
pub use pool::Submission;
pub use supervisor::{ProcessLauncher, TokioProcessLauncher};
pub use types::{
    Capabilities, FetchOptions, FetchRequest, JobEvent, JobId, JobRecord, JobState, Platform,
    PreviewResult, PreviewSource, ProgressEvent,
};

/// Helper function to run the downloader with graceful signal handling.
///
/// Waits for a termination signal and then calls the downloader's `shutdown()` method.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use social_dl::{SocialDownloader, Config, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let downloader = SocialDownloader::new(Config::default()).await?;
///
///     // Run with automatic signal handling
///     run_with_shutdown(downloader).await;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(downloader: SocialDownloader) {
    wait_for_signal().await;
    downloader.shutdown().await;
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration can fail in restricted environments; fall back to ctrl_c
    let (sigterm, sigint) = match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(term), Ok(int)) => (term, int),
        (term, int) => {
            let reason = term.err().or(int.err()).map(|e| e.to_string());
            tracing::warn!(error = ?reason, "signal handlers unavailable, waiting for Ctrl+C");
            tokio::signal::ctrl_c().await.ok();
            return;
        }
    };
    let (mut sigterm, mut sigint) = (sigterm, sigint);

    tokio::select! {
        _ = sigterm.recv() => tracing::info!("Received SIGTERM, shutting down"),
        _ = sigint.recv() => tracing::info!("Received SIGINT, shutting down"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        return;
    }
    tracing::info!("Received Ctrl+C, shutting down");
}
