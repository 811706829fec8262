//! Configuration types for social-dl

use crate::error::{Error, Result};
use crate::messages::Locale;
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::Path, path::PathBuf, time::Duration};
use utoipa::ToSchema;

/// Browser user agent presented to platforms that reject tool-looking clients
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Download behavior configuration (temp root, concurrency, timeouts)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct DownloadConfig {
    /// Directory where artifacts are written (default: system temp dir + "social-dl")
    #[serde(default = "default_temp_dir")]
    #[schema(value_type = String)]
    pub temp_dir: PathBuf,

    /// Maximum concurrently running jobs (default: 10)
    ///
    /// Signed so that zero or negative values in a config file load; the pool
    /// replaces them with the default and logs a warning.
    #[serde(default = "default_pool_size")]
    pub pool_size: i64,

    /// Jobs that may wait for a worker before submissions run in the caller (default: 100)
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Idle timeout for one download attempt (default: 300 seconds)
    #[serde(default = "default_attempt_timeout", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub attempt_timeout: Duration,

    /// Hard ceiling for a live session on TikTok and Instagram (default: 300 seconds)
    #[serde(default = "default_session_ceiling", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub session_ceiling: Duration,

    /// Hard ceiling for a live session on Facebook (default: 600 seconds)
    #[serde(default = "default_facebook_session_ceiling", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub facebook_session_ceiling: Duration,

    /// How long shutdown waits for in-flight jobs before killing them (default: 60 seconds)
    #[serde(default = "default_shutdown_grace", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub shutdown_grace: Duration,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            temp_dir: default_temp_dir(),
            pool_size: default_pool_size(),
            queue_capacity: default_queue_capacity(),
            attempt_timeout: default_attempt_timeout(),
            session_ceiling: default_session_ceiling(),
            facebook_session_ceiling: default_facebook_session_ceiling(),
            shutdown_grace: default_shutdown_grace(),
        }
    }
}

/// External tool paths (fetch tool, transcode tool)
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ToolsConfig {
    /// Path to the fetch tool executable (auto-detected if None)
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub fetch_tool_path: Option<PathBuf>,

    /// Path to the transcode tool executable (auto-detected if None)
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub transcode_tool_path: Option<PathBuf>,

    /// Whether to search PATH for external binaries if explicit paths not set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,

    /// Timeout for the `--version` availability probe (default: 5 seconds)
    #[serde(default = "default_probe_timeout", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub probe_timeout: Duration,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            fetch_tool_path: None,
            transcode_tool_path: None,
            search_path: true,
            probe_timeout: default_probe_timeout(),
        }
    }
}

/// TikTok request shaping (user agent, proxy, cookies)
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct TikTokConfig {
    /// Proxy URI passed to the fetch tool; ignored unless it parses as a URL
    #[serde(default)]
    pub proxy: Option<String>,

    /// Netscape cookie file; takes precedence over the proxy
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub cookies_path: Option<PathBuf>,

    /// Browser user agent
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for TikTokConfig {
    fn default() -> Self {
        Self {
            proxy: None,
            cookies_path: None,
            user_agent: default_user_agent(),
        }
    }
}

/// Retry configuration for failed download attempts
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct RetryConfig {
    /// Maximum subprocess launches per job (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Fixed delay between attempts (default: 1 second)
    #[serde(default = "default_backoff", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub backoff: Duration,

    /// Add random jitter to the delay (default: false)
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff: default_backoff(),
            jitter: false,
        }
    }
}

/// Artifact retention
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ReaperConfig {
    /// Artifacts older than this are deleted (default: 12 hours)
    #[serde(default = "default_retention", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub retention: Duration,

    /// Sweep interval (default: 1 hour)
    #[serde(default = "default_reap_interval", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub interval: Duration,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            retention: default_retention(),
            interval: default_reap_interval(),
        }
    }
}

/// Preview lookups
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct PreviewConfig {
    /// TikTok oEmbed endpoint (default: https://www.tiktok.com/oembed)
    #[serde(default = "default_oembed_endpoint")]
    pub oembed_endpoint: String,

    /// oEmbed request timeout (default: 10 seconds)
    #[serde(default = "default_oembed_timeout", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub oembed_timeout: Duration,

    /// Per-attempt timeout for fetch tool previews (default: 60 seconds)
    #[serde(default = "default_preview_timeout", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub preview_timeout: Duration,

    /// Thumbnail URL returned when a preview has none
    #[serde(default = "default_placeholder_thumbnail")]
    pub placeholder_thumbnail: String,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            oembed_endpoint: default_oembed_endpoint(),
            oembed_timeout: default_oembed_timeout(),
            preview_timeout: default_preview_timeout(),
            placeholder_thumbnail: default_placeholder_thumbnail(),
        }
    }
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiConfig {
    /// Address to bind to (default: 127.0.0.1:8080)
    #[serde(default = "default_bind_address")]
    #[schema(value_type = String)]
    pub bind_address: SocketAddr,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Enable Swagger UI at /swagger-ui (default: true)
    #[serde(default = "default_true")]
    pub swagger_ui: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            swagger_ui: true,
        }
    }
}

/// Main configuration for SocialDownloader
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct Config {
    /// Temp root, concurrency and timeouts
    #[serde(default)]
    pub download: DownloadConfig,

    /// External tool locations
    #[serde(default)]
    pub tools: ToolsConfig,

    /// TikTok request shaping
    #[serde(default)]
    pub tiktok: TikTokConfig,

    /// Attempt policy
    #[serde(default)]
    pub retry: RetryConfig,

    /// Artifact retention
    #[serde(default)]
    pub reaper: ReaperConfig,

    /// Preview lookups
    #[serde(default)]
    pub preview: PreviewConfig,

    /// HTTP server
    #[serde(default)]
    pub api: ApiConfig,

    /// Language of client-facing messages (default: en)
    #[serde(default)]
    pub locale: Locale,
}

impl Config {
    /// Temporary directory
    pub fn temp_dir(&self) -> &PathBuf {
        &self.download.temp_dir
    }

    /// Load a configuration from a JSON file; missing fields take their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Config = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make the downloader unusable
    pub fn validate(&self) -> Result<()> {
        if self.retry.max_attempts == 0 {
            return Err(config_error("max_attempts must be at least 1", "retry.max_attempts"));
        }
        if self.download.attempt_timeout.is_zero() {
            return Err(config_error(
                "attempt_timeout must be greater than zero",
                "download.attempt_timeout",
            ));
        }
        if self.download.session_ceiling.is_zero() || self.download.facebook_session_ceiling.is_zero()
        {
            return Err(config_error(
                "session ceilings must be greater than zero",
                "download.session_ceiling",
            ));
        }
        if self.reaper.interval.is_zero() {
            return Err(config_error(
                "reaper interval must be greater than zero",
                "reaper.interval",
            ));
        }
        if url::Url::parse(&self.preview.oembed_endpoint).is_err() {
            return Err(config_error(
                format!("invalid oEmbed endpoint: {}", self.preview.oembed_endpoint),
                "preview.oembed_endpoint",
            ));
        }
        Ok(())
    }
}

fn config_error(message: impl Into<String>, key: &str) -> Error {
    Error::Config {
        message: message.into(),
        key: Some(key.to_string()),
    }
}

fn default_temp_dir() -> PathBuf {
    std::env::temp_dir().join("social-dl")
}

fn default_pool_size() -> i64 {
    10
}

fn default_queue_capacity() -> usize {
    100
}

fn default_attempt_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_session_ceiling() -> Duration {
    Duration::from_secs(300)
}

fn default_facebook_session_ceiling() -> Duration {
    Duration::from_secs(600)
}

fn default_shutdown_grace() -> Duration {
    Duration::from_secs(60)
}

fn default_probe_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_true() -> bool {
    true
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff() -> Duration {
    Duration::from_secs(1)
}

fn default_retention() -> Duration {
    Duration::from_secs(12 * 60 * 60)
}

fn default_reap_interval() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_oembed_endpoint() -> String {
    "https://www.tiktok.com/oembed".to_string()
}

fn default_oembed_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_preview_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_placeholder_thumbnail() -> String {
    "https://via.placeholder.com/300x150?text=Thumbnail".to_string()
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
