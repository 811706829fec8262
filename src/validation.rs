//! Per-platform URL grammars and title sanitization
//!
//! Everything here runs before a subprocess is launched, so a rejected URL
//! never costs a spawn.

use crate::error::{Error, Result};
use crate::types::Platform;
use regex::Regex;
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;

/// Longest source URL accepted on any platform
pub const MAX_URL_LEN: usize = 2048;

// Literal patterns; compilation cannot fail.
#[allow(clippy::expect_used)]
static TIKTOK_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://(www\.)?(tiktok\.com|vm\.tiktok\.com|vt\.tiktok\.com)/\S*$")
        .expect("tiktok pattern")
});

#[allow(clippy::expect_used)]
static FACEBOOK_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://(www\.|m\.)?(facebook\.com|fb\.watch|fb\.com)/\S*$")
        .expect("facebook pattern")
});

#[allow(clippy::expect_used)]
static INSTAGRAM_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://(www\.)?instagram\.com/reels?/[a-zA-Z0-9_-]+(/|\?\S*)?$")
        .expect("instagram pattern")
});

#[allow(clippy::expect_used)]
static TITLE_DISALLOWED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9\-_\s]").expect("title pattern"));

/// Check a source URL against its platform's grammar
///
/// Returns the trimmed URL on success.
pub fn validate_url(platform: Platform, url: &str) -> Result<String> {
    let url = url.trim();
    if url.is_empty() {
        return Err(Error::invalid_input(platform, "URL is empty"));
    }
    if url.len() > MAX_URL_LEN {
        return Err(Error::invalid_input(
            platform,
            format!("URL longer than {MAX_URL_LEN} characters"),
        ));
    }

    let grammar = match platform {
        Platform::TikTok => &*TIKTOK_URL,
        Platform::Facebook => &*FACEBOOK_URL,
        Platform::Instagram => &*INSTAGRAM_URL,
    };
    if !grammar.is_match(url) {
        return Err(Error::invalid_input(
            platform,
            format!("URL does not look like a {platform} video link"),
        ));
    }
    Ok(url.to_string())
}

/// Reduce a title to characters safe for a file name
///
/// Keeps ASCII letters, digits, `-`, `_` and whitespace, then trims and collapses
/// whitespace runs to `_`. Returns `None` when nothing usable is left.
pub fn sanitize_title(title: &str) -> Option<String> {
    let stripped = TITLE_DISALLOWED.replace_all(title, "");
    let joined = stripped.split_whitespace().collect::<Vec<_>>().join("_");
    if joined.is_empty() {
        return None;
    }
    // Keep names well under common filesystem limits
    Some(joined.chars().take(120).collect())
}

/// Canonical composition plus trim, applied to every resolved title
pub fn normalize_title(title: &str) -> String {
    title.nfc().collect::<String>().trim().to_string()
}
