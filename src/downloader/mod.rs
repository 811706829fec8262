//! Core downloader implementation split into focused submodules.
//!
//! The `SocialDownloader` struct and its methods are organized by domain:
//! - [`jobs`] - Job submission and the per-job attempt loop
//! - [`lifecycle`] - Tool capabilities and shutdown coordination

mod jobs;
mod lifecycle;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::messages::MessageCatalog;
use crate::pool::{Submission, WorkerPool};
use crate::preview::Previewer;
use crate::relay::SessionStream;
use crate::store::{ArtifactStore, Reaper};
use crate::supervisor::{ProcessLauncher, TokioProcessLauncher, resolve_program};
use crate::types::{
    FetchOptions, JobEvent, JobId, JobRecord, JobState, Platform, PreviewResult,
};
use crate::validation::validate_url;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use tokio::sync::{RwLock, broadcast};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Resolved locations of the external tools
#[derive(Clone, Debug)]
pub(crate) struct ToolPaths {
    /// Fetch tool (yt-dlp)
    pub(crate) fetch: PathBuf,
    /// Transcode tool (ffmpeg)
    pub(crate) transcode: PathBuf,
}

/// A submitted job: its id and the live event stream for the client
pub struct JobHandle {
    /// Job identifier
    pub id: JobId,
    /// Where the pool placed the job
    pub submission: Submission,
    /// Progress and terminal events, ending at the terminal event or session ceiling
    pub events: SessionStream,
}

/// Main downloader instance (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct SocialDownloader {
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<JobEvent>,
    /// Process launcher (trait object so tests can script tool output)
    pub(crate) launcher: Arc<dyn ProcessLauncher>,
    /// External tool locations
    pub(crate) tools: ToolPaths,
    /// Bounded worker pool running download jobs
    pub(crate) pool: WorkerPool,
    /// Artifact files under the temp root
    pub(crate) store: Arc<ArtifactStore>,
    /// Preview lookups
    pub(crate) previewer: Arc<Previewer>,
    /// Every job submitted since startup
    pub(crate) registry: Arc<RwLock<HashMap<JobId, JobRecord>>>,
    /// Next job id
    pub(crate) next_id: Arc<AtomicU64>,
    /// Cancelled at shutdown; stops the reaper and in-flight previews
    pub(crate) shutdown_token: CancellationToken,
    /// Background reaper task, taken at shutdown
    pub(crate) reaper: Arc<tokio::sync::Mutex<Option<JoinHandle<()>>>>,
    /// Client-facing message text
    pub(crate) catalog: MessageCatalog,
}

impl SocialDownloader {
    /// Create a new SocialDownloader instance
    ///
    /// This initializes all core components:
    /// - Creates the temp root
    /// - Resolves the fetch and transcode tools
    /// - Starts the worker pool and the artifact reaper
    pub async fn new(config: Config) -> Result<Self> {
        let launcher = Arc::new(TokioProcessLauncher::new(config.tools.probe_timeout));
        Self::with_launcher(config, launcher).await
    }

    /// Create an instance that starts subprocesses through `launcher`
    pub async fn with_launcher(config: Config, launcher: Arc<dyn ProcessLauncher>) -> Result<Self> {
        config.validate()?;

        let store = ArtifactStore::open(&config.download.temp_dir)
            .await
            .map_err(|e| match e {
                Error::Io(io) => Error::Io(std::io::Error::new(
                    io.kind(),
                    format!(
                        "Failed to create temp directory '{}': {}",
                        config.download.temp_dir.display(),
                        io
                    ),
                )),
                other => other,
            })?;
        let store = Arc::new(store);

        let tools = ToolPaths {
            fetch: resolve_program(
                config.tools.fetch_tool_path.as_deref(),
                config.tools.search_path,
                "yt-dlp",
            ),
            transcode: resolve_program(
                config.tools.transcode_tool_path.as_deref(),
                config.tools.search_path,
                "ffmpeg",
            ),
        };
        tracing::info!(
            fetch_tool = %tools.fetch.display(),
            transcode_tool = %tools.transcode.display(),
            temp_dir = %config.download.temp_dir.display(),
            "external tools resolved"
        );

        let previewer = Arc::new(Previewer::new(
            config.preview.clone(),
            config.retry.clone(),
            launcher.clone(),
            tools.fetch.clone(),
        )?);

        let pool = WorkerPool::new(config.download.pool_size, config.download.queue_capacity);

        // Create broadcast channel with buffer size of 1000 events
        let (event_tx, _rx) = broadcast::channel(1000);

        let shutdown_token = CancellationToken::new();
        let reaper = Reaper::spawn(
            store.clone(),
            config.reaper.clone(),
            shutdown_token.child_token(),
        );

        Ok(Self {
            catalog: MessageCatalog::new(config.locale),
            config: Arc::new(config),
            event_tx,
            launcher,
            tools,
            pool,
            store,
            previewer,
            registry: Arc::new(RwLock::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
            shutdown_token,
            reaper: Arc::new(tokio::sync::Mutex::new(Some(reaper))),
        })
    }

    /// Subscribe to job events
    ///
    /// Multiple subscribers are supported. Each subscriber receives all events independently.
    /// A subscriber that falls behind by more than 1000 events receives `RecvError::Lagged`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use social_dl::{SocialDownloader, Config};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let downloader = SocialDownloader::new(Config::default()).await?;
    ///
    ///     let mut events = downloader.subscribe();
    ///     tokio::spawn(async move {
    ///         while let Ok(event) = events.recv().await {
    ///             tracing::info!(job_id = %event.job_id, kind = event.event.name(), "job event");
    ///         }
    ///     });
    ///
    ///     Ok(())
    /// }
    /// ```
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.event_tx.subscribe()
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Message catalog for client-facing text
    pub fn catalog(&self) -> &MessageCatalog {
        &self.catalog
    }

    /// Look up video metadata without downloading
    ///
    /// TikTok tries oEmbed first; everything else, and TikTok on oEmbed failure,
    /// runs the fetch tool under the retry policy.
    pub async fn fetch_preview(&self, platform: Platform, url: &str) -> Result<PreviewResult> {
        let url = validate_url(platform, url)?;
        let options = self.default_options(platform);
        self.previewer
            .fetch(platform, &url, &options, &self.shutdown_token)
            .await
    }

    /// Read an artifact by file name
    pub async fn retrieve_artifact(&self, filename: &str) -> Result<Vec<u8>> {
        self.store.read(filename).await
    }

    /// Artifact store backing this downloader
    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Snapshot of one job
    pub async fn job(&self, id: JobId) -> Option<JobRecord> {
        self.registry.read().await.get(&id).cloned()
    }

    /// Snapshot of every job, oldest first
    pub async fn jobs(&self) -> Vec<JobRecord> {
        let mut jobs: Vec<JobRecord> = self.registry.read().await.values().cloned().collect();
        jobs.sort_by_key(|j| j.id);
        jobs
    }

    /// Emit an event to all subscribers
    ///
    /// If there are no active subscribers, the event is silently dropped.
    pub(crate) fn emit_event(&self, event: JobEvent) {
        self.event_tx.send(event).ok();
    }

    /// Apply a state transition, logging attempts to leave a terminal state
    pub(crate) async fn transition(&self, id: JobId, next: JobState) {
        let mut registry = self.registry.write().await;
        let Some(record) = registry.get_mut(&id) else {
            return;
        };
        let from = record.state;
        if !record.transition(next) {
            tracing::warn!(job_id = %id, ?from, to = ?next, "rejected transition out of terminal state");
        }
    }

    /// Platform defaults for request options
    pub(crate) fn default_options(&self, platform: Platform) -> FetchOptions {
        match platform {
            Platform::TikTok => FetchOptions {
                proxy: self.config.tiktok.proxy.clone(),
                cookies_path: self.config.tiktok.cookies_path.clone(),
                user_agent: self.config.tiktok.user_agent.clone(),
            },
            Platform::Facebook | Platform::Instagram => FetchOptions::default(),
        }
    }

    /// Spawn the REST API server in a background task
    ///
    /// Listens on the configured bind address (default: 127.0.0.1:8080).
    pub fn spawn_api_server(self: &Arc<Self>) -> JoinHandle<Result<()>> {
        let downloader = self.clone();
        let config = self.config.clone();

        tokio::spawn(async move { crate::api::start_api_server(downloader, config).await })
    }
}
