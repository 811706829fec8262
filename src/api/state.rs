//! Application state for the API server

use crate::{Config, SocialDownloader};
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// This struct is cloned for each request (cheap Arc clone) and provides
/// access to the downloader instance and configuration.
#[derive(Clone)]
pub struct AppState {
    /// The main SocialDownloader instance
    pub downloader: Arc<SocialDownloader>,

    /// Configuration (read-only; the downloader holds its own copy)
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(downloader: Arc<SocialDownloader>, config: Arc<Config>) -> Self {
        Self { downloader, config }
    }
}
