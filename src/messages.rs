//! Client-facing display text for error kinds
//!
//! The error enum carries diagnostics; what a user reads is looked up here by
//! [`ErrorKind`] so wording and language can change without touching control flow.

use crate::error::ErrorKind;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Supported display languages
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    /// English (default)
    #[default]
    En,
    /// Vietnamese
    Vi,
}

/// Message lookup for one locale
#[derive(Clone, Copy, Debug, Default)]
pub struct MessageCatalog {
    locale: Locale,
}

impl MessageCatalog {
    /// Create a catalog for the given locale
    pub fn new(locale: Locale) -> Self {
        Self { locale }
    }

    /// Locale this catalog renders
    pub fn locale(&self) -> Locale {
        self.locale
    }

    /// Display text for an error kind
    pub fn message(&self, kind: ErrorKind) -> &'static str {
        match self.locale {
            Locale::En => english(kind),
            Locale::Vi => vietnamese(kind),
        }
    }

    /// Text shown when a preview cannot use a thumbnail and falls back to the placeholder
    pub fn invalid_thumbnail(&self) -> &'static str {
        match self.locale {
            Locale::En => "Invalid thumbnail. Using a placeholder instead.",
            Locale::Vi => "Thumbnail không hợp lệ. Sử dụng placeholder thay thế.",
        }
    }
}

fn english(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::InvalidInput => "Invalid URL. Please check the link format.",
        ErrorKind::ToolUnavailable => "The download tool is not available on this server.",
        ErrorKind::ProcessFailure => "Could not fetch the video from this link. Please try another link.",
        ErrorKind::ProcessTimeout => "Processing the video took too long. Please try again.",
        ErrorKind::Interrupted => "The download was interrupted.",
        ErrorKind::ClientDisconnected => "The connection was closed.",
        ErrorKind::FileNotFound => "The file does not exist. Please check again.",
        ErrorKind::PreviewFailed => {
            "Could not fetch video information. The video may be private, region-locked, or blocked. Try downloading it directly."
        }
        ErrorKind::ShuttingDown => "The server is shutting down. Please try again later.",
        ErrorKind::Internal => "System error. Please try again later.",
    }
}

fn vietnamese(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::InvalidInput => "URL không hợp lệ. Vui lòng kiểm tra lại định dạng URL.",
        ErrorKind::ToolUnavailable => "yt-dlp không khả dụng trên hệ thống.",
        ErrorKind::ProcessFailure => "Không thể lấy video từ link. Vui lòng thử link khác.",
        ErrorKind::ProcessTimeout => "Hết thời gian xử lý video. Vui lòng thử lại.",
        ErrorKind::Interrupted => "Lỗi hệ thống (quá trình bị gián đoạn).",
        ErrorKind::ClientDisconnected => "Kết nối đã bị đóng.",
        ErrorKind::FileNotFound => "Tệp không tồn tại. Vui lòng kiểm tra lại.",
        ErrorKind::PreviewFailed => {
            "Không thể lấy thông tin video. Video có thể bị hạn chế quyền riêng tư, vùng miền, hoặc bị chặn. Hãy thử tải trực tiếp."
        }
        ErrorKind::ShuttingDown => "Hệ thống đang tắt. Vui lòng thử lại sau.",
        ErrorKind::Internal => "Lỗi hệ thống. Vui lòng thử lại sau.",
    }
}
