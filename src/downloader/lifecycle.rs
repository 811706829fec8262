//! Tool capabilities and shutdown coordination.

use crate::command;
use crate::types::{Capabilities, Platform};

use super::SocialDownloader;

impl SocialDownloader {
    /// Report which external tools respond to a version probe
    pub async fn capabilities(&self) -> Capabilities {
        let (fetch_tool, transcode_tool) = tokio::join!(
            self.launcher.is_available(&self.tools.fetch, "--version"),
            self.launcher.is_available(&self.tools.transcode, "-version"),
        );

        let platforms = if !fetch_tool {
            Vec::new()
        } else {
            Platform::ALL
                .iter()
                .copied()
                .filter(|p| transcode_tool || !command::requires_transcode(*p))
                .collect()
        };

        Capabilities {
            fetch_tool,
            transcode_tool,
            platforms,
        }
    }

    /// Gracefully shut down the downloader
    ///
    /// This method performs a graceful shutdown sequence:
    /// 1. Stops accepting jobs and waits up to `shutdown_grace` for running ones
    /// 2. Cancels whatever is still running (their clients receive an `error` event)
    /// 3. Stops the artifact reaper and cancels in-flight previews
    /// 4. Runs one final reap with the configured retention
    pub async fn shutdown(&self) {
        tracing::info!("Initiating graceful shutdown");

        self.pool.shutdown(self.config.download.shutdown_grace).await;

        self.shutdown_token.cancel();
        if let Some(handle) = self.reaper.lock().await.take() {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "artifact reaper task ended abnormally");
            }
        }

        let report = self.store.reap(self.config.reaper.retention).await;
        tracing::info!(
            deleted = report.deleted,
            failed = report.failed,
            "final artifact sweep finished"
        );

        tracing::info!("Graceful shutdown complete");
    }

    /// Whether [`shutdown`](Self::shutdown) has started
    pub fn is_shutting_down(&self) -> bool {
        !self.pool.is_accepting()
    }
}
