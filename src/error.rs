//! Error types for social-dl
//!
//! This module provides the closed error taxonomy of the job orchestration layer:
//! - Domain errors (invalid input, unavailable tools, process failures, timeouts)
//! - HTTP status code mapping for API integration
//! - Structured error responses with machine-readable error codes
//!
//! Display strings here are for logs. Client-facing text comes from
//! [`crate::messages::MessageCatalog`], keyed by [`ErrorKind`].

use crate::types::Platform;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for social-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for social-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or unsupported source URL, rejected before any subprocess runs
    #[error("invalid {platform} URL: {reason}")]
    InvalidInput {
        /// Platform the URL was submitted for
        platform: Platform,
        /// Why the URL was rejected
        reason: String,
    },

    /// External fetch or transcode tool is missing or non-functional
    #[error("external tool unavailable: {tool}")]
    ToolUnavailable {
        /// Tool name or path that failed the preflight
        tool: String,
    },

    /// Subprocess exited with a non-zero code
    #[error("process exited with code {exit_code}: {tail}")]
    ProcessFailure {
        /// Exit code (-1 when terminated by a signal)
        exit_code: i32,
        /// Last output lines, for diagnostics
        tail: String,
    },

    /// Subprocess produced no output and did not exit within the idle timeout
    #[error("process timed out after {after:?} without output")]
    ProcessTimeout {
        /// The idle timeout that elapsed
        after: Duration,
    },

    /// Supervision was cancelled (session ceiling, shutdown, explicit cancel)
    #[error("operation interrupted")]
    Interrupted,

    /// The client side of a relay went away
    #[error("client disconnected")]
    ClientDisconnected,

    /// Requested artifact does not exist under the temp root
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Preview lookup exhausted every strategy
    #[error("preview failed: {reason}")]
    PreviewFailed {
        /// Last failure reason
        reason: String,
    },

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "pool_size")
        key: Option<String>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Shutdown in progress - not accepting new jobs
    #[error("shutdown in progress: not accepting new jobs")]
    ShuttingDown,

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),
}

/// Payload-free discriminant of [`Error`], used to look up display text
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// See [`Error::InvalidInput`]
    InvalidInput,
    /// See [`Error::ToolUnavailable`]
    ToolUnavailable,
    /// See [`Error::ProcessFailure`]
    ProcessFailure,
    /// See [`Error::ProcessTimeout`]
    ProcessTimeout,
    /// See [`Error::Interrupted`]
    Interrupted,
    /// See [`Error::ClientDisconnected`]
    ClientDisconnected,
    /// See [`Error::FileNotFound`]
    FileNotFound,
    /// See [`Error::PreviewFailed`]
    PreviewFailed,
    /// See [`Error::ShuttingDown`]
    ShuttingDown,
    /// Configuration, I/O, network, serialization and server errors
    Internal,
}

impl Error {
    /// The payload-free kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidInput { .. } => ErrorKind::InvalidInput,
            Error::ToolUnavailable { .. } => ErrorKind::ToolUnavailable,
            Error::ProcessFailure { .. } => ErrorKind::ProcessFailure,
            Error::ProcessTimeout { .. } => ErrorKind::ProcessTimeout,
            Error::Interrupted => ErrorKind::Interrupted,
            Error::ClientDisconnected => ErrorKind::ClientDisconnected,
            Error::FileNotFound(_) => ErrorKind::FileNotFound,
            Error::PreviewFailed { .. } => ErrorKind::PreviewFailed,
            Error::ShuttingDown => ErrorKind::ShuttingDown,
            Error::Config { .. }
            | Error::Io(_)
            | Error::Network(_)
            | Error::Serialization(_)
            | Error::ApiServerError(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn invalid_input(platform: Platform, reason: impl Into<String>) -> Self {
        Error::InvalidInput {
            platform,
            reason: reason.into(),
        }
    }

    pub(crate) fn tool_unavailable(tool: impl std::fmt::Display) -> Self {
        Error::ToolUnavailable {
            tool: tool.to_string(),
        }
    }
}

/// API error response format
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "invalid_input",
///     "message": "Invalid URL. Please check the TikTok URL format.",
///     "details": { "platform": "tiktok" }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "not_found", "invalid_input")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create an API error with additional details
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    /// Create a "not found" error
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new("not_found", format!("{} not found", resource.into()))
    }

    /// Build the client-facing error from a domain error using the given catalog
    pub fn localized(error: &Error, catalog: &crate::messages::MessageCatalog) -> Self {
        Self {
            error: ErrorDetail {
                code: error.error_code().to_string(),
                message: catalog.message(error.kind()).to_string(),
                details: error_details(error),
            },
        }
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - Client error (invalid input)
            Error::InvalidInput { .. } => 400,
            Error::Config { .. } => 400,

            // 404 Not Found
            Error::FileNotFound(_) => 404,

            // 499-ish conditions never reach a response; report as 500 if they do
            Error::ClientDisconnected => 500,
            Error::Interrupted => 500,

            // 500 Internal Server Error - Server-side issues
            Error::Io(_) => 500,
            Error::Serialization(_) => 500,
            Error::ApiServerError(_) => 500,

            // 502 Bad Gateway - External process / service errors
            Error::ProcessFailure { .. } => 502,
            Error::PreviewFailed { .. } => 502,
            Error::Network(_) => 502,

            // 503 Service Unavailable
            Error::ToolUnavailable { .. } => 503,
            Error::ShuttingDown => 503,

            // 504 Gateway Timeout
            Error::ProcessTimeout { .. } => 504,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::InvalidInput { .. } => "invalid_input",
            Error::ToolUnavailable { .. } => "tool_unavailable",
            Error::ProcessFailure { .. } => "process_failure",
            Error::ProcessTimeout { .. } => "process_timeout",
            Error::Interrupted => "interrupted",
            Error::ClientDisconnected => "client_disconnected",
            Error::FileNotFound(_) => "not_found",
            Error::PreviewFailed { .. } => "preview_failed",
            Error::Config { .. } => "config_error",
            Error::Io(_) => "io_error",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::ShuttingDown => "shutting_down",
            Error::ApiServerError(_) => "api_server_error",
        }
    }
}

fn error_details(error: &Error) -> Option<serde_json::Value> {
    match error {
        Error::InvalidInput { platform, .. } => Some(serde_json::json!({
            "platform": platform,
        })),
        Error::ToolUnavailable { tool } => Some(serde_json::json!({
            "tool": tool,
        })),
        Error::ProcessFailure { exit_code, .. } => Some(serde_json::json!({
            "exit_code": exit_code,
        })),
        Error::ProcessTimeout { after } => Some(serde_json::json!({
            "timeout_secs": after.as_secs(),
        })),
        Error::FileNotFound(path) => path
            .file_name()
            .map(|name| serde_json::json!({ "filename": name.to_string_lossy() })),
        _ => None,
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let details = error_details(&error);
        ApiError {
            error: ErrorDetail {
                code: error.error_code().to_string(),
                message: error.to_string(),
                details,
            },
        }
    }
}
