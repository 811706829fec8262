//! Core types for social-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use utoipa::ToSchema;

/// Unique identifier for a job
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl JobId {
    /// Create a new JobId
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the inner value
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl From<u64> for JobId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for JobId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Source platform of a video URL
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// facebook.com, fb.watch, fb.com
    Facebook,
    /// instagram.com reels
    Instagram,
    /// tiktok.com, vm.tiktok.com, vt.tiktok.com
    #[serde(rename = "tiktok")]
    TikTok,
}

impl Platform {
    /// All supported platforms
    pub const ALL: [Platform; 3] = [Platform::Facebook, Platform::Instagram, Platform::TikTok];

    /// Lowercase name used in URLs and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Facebook => "facebook",
            Platform::Instagram => "instagram",
            Platform::TikTok => "tiktok",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "facebook" | "fb" => Ok(Platform::Facebook),
            "instagram" | "ig" => Ok(Platform::Instagram),
            "tiktok" => Ok(Platform::TikTok),
            other => Err(format!("unsupported platform: {other}")),
        }
    }
}

/// Per-request fetch options
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FetchOptions {
    /// Proxy URI for the fetch tool (used only when it parses as a URI)
    #[serde(default)]
    pub proxy: Option<String>,

    /// Netscape cookie file for the fetch tool (takes precedence over the proxy)
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub cookies_path: Option<PathBuf>,

    /// Browser user agent presented by the fetch tool
    #[serde(default)]
    pub user_agent: String,
}

/// A request to download one video
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FetchRequest {
    /// Source page URL
    pub source_url: String,

    /// Platform the URL belongs to
    pub platform: Platform,

    /// Title supplied by the client (used to name the artifact)
    #[serde(default)]
    pub title_hint: Option<String>,

    /// Fetch options (proxy, cookies, user agent)
    #[serde(default)]
    pub options: FetchOptions,
}

impl FetchRequest {
    /// Create a request with default options
    pub fn new(platform: Platform, source_url: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            platform,
            title_hint: None,
            options: FetchOptions::default(),
        }
    }

    /// Set the title hint
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title_hint = Some(title.into());
        self
    }

    /// Replace the fetch options
    pub fn with_options(mut self, options: FetchOptions) -> Self {
        self.options = options;
        self
    }
}

/// Event relayed to the client while a job runs
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// Download progress percentage
    Progress {
        /// Integer percent, 0 to 100
        percent: u8,
    },

    /// Metadata resolved from tool output
    Resolved {
        /// Video title
        #[serde(skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        /// Direct media URL on the platform CDN
        #[serde(skip_serializing_if = "Option::is_none")]
        direct_url: Option<String>,
        /// Thumbnail URL on the platform CDN
        #[serde(skip_serializing_if = "Option::is_none")]
        thumbnail_url: Option<String>,
    },

    /// Artifact is ready
    Done {
        /// Path of the downloaded file under the temp root
        #[schema(value_type = String)]
        file_path: PathBuf,
    },

    /// Job failed
    Error {
        /// Client-facing message
        message: String,
    },

    /// Download gave up; the client should use the source URL directly
    Fallback {
        /// The URL the client originally submitted
        original_url: String,
    },
}

impl ProgressEvent {
    /// Whether this event ends a job's stream
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProgressEvent::Done { .. } | ProgressEvent::Error { .. } | ProgressEvent::Fallback { .. }
        )
    }

    /// Snake-case name, used as the SSE event type
    pub fn name(&self) -> &'static str {
        match self {
            ProgressEvent::Progress { .. } => "progress",
            ProgressEvent::Resolved { .. } => "resolved",
            ProgressEvent::Done { .. } => "done",
            ProgressEvent::Error { .. } => "error",
            ProgressEvent::Fallback { .. } => "fallback",
        }
    }
}

/// Event published on the downloader's broadcast channel
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct JobEvent {
    /// Job that produced the event
    pub job_id: JobId,
    /// The event
    pub event: ProgressEvent,
}

/// Job lifecycle state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Accepted, waiting for a worker
    Queued,
    /// Attempts in progress
    Running,
    /// Artifact written
    Succeeded,
    /// Failed without fallback
    Failed,
    /// Attempts exhausted; client told to use the source URL
    FellBack,
}

impl JobState {
    /// Terminal states never change again
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Succeeded | JobState::Failed | JobState::FellBack
        )
    }
}

/// Record of one job
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct JobRecord {
    /// Job identifier
    pub id: JobId,
    /// Source platform
    pub platform: Platform,
    /// Source page URL
    pub source_url: String,
    /// Current state
    pub state: JobState,
    /// Artifact path once succeeded
    #[schema(value_type = Option<String>)]
    pub file_path: Option<PathBuf>,
    /// Subprocess launches made so far
    pub attempts: u32,
    /// When the job was submitted
    pub created_at: DateTime<Utc>,
    /// When the job reached a terminal state
    pub finished_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    /// Create a queued record
    pub fn new(id: JobId, platform: Platform, source_url: impl Into<String>) -> Self {
        Self {
            id,
            platform,
            source_url: source_url.into(),
            state: JobState::Queued,
            file_path: None,
            attempts: 0,
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Move to a new state; returns false (and changes nothing) if already terminal
    pub fn transition(&mut self, next: JobState) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.state = next;
        if next.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
        true
    }
}

/// Where a preview came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PreviewSource {
    /// Platform oEmbed endpoint
    OEmbed,
    /// External fetch tool
    FetchTool,
}

/// Video metadata for the preview endpoints
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PreviewResult {
    /// Video title (NFC-normalized)
    pub title: String,
    /// Thumbnail URL on an allow-listed CDN
    pub thumbnail_url: Option<String>,
    /// Direct media URL on an allow-listed CDN
    pub direct_url: Option<String>,
    /// Embed markup from oEmbed
    pub embed_html: Option<String>,
    /// Which strategy produced the result
    pub source: PreviewSource,
}

/// Availability of external tools
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct Capabilities {
    /// Fetch tool answers `--version`
    pub fetch_tool: bool,
    /// Transcode tool answers `-version`
    pub transcode_tool: bool,
    /// Platforms whose downloads can currently run
    pub platforms: Vec<Platform>,
}
