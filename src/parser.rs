//! Classification of fetch tool output lines
//!
//! [`classify_line`] is a pure function over one line. [`ProgressParser`] folds the
//! lines of a single attempt: the first title, thumbnail and direct URL win, and
//! repeated progress percentages are dropped.

use crate::types::{Platform, ProgressEvent};
use crate::validation::normalize_title;
use regex::Regex;
use std::sync::LazyLock;

#[allow(clippy::expect_used)]
static PERCENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\D)(\d+)\.\d+%").expect("percent pattern"));

/// Host suffixes accepted for resolved URLs on one platform
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CdnRules {
    /// Hosts that serve thumbnails
    pub thumbnail_hosts: &'static [&'static str],
    /// Hosts that serve video files
    pub video_hosts: &'static [&'static str],
}

const TIKTOK_CDNS: &[&str] = &["tiktokcdn.com", "tiktokcdn-us.com", "muscdn.com"];

impl CdnRules {
    /// Allow-lists for a platform
    pub fn for_platform(platform: Platform) -> Self {
        match platform {
            Platform::TikTok => Self {
                thumbnail_hosts: TIKTOK_CDNS,
                video_hosts: TIKTOK_CDNS,
            },
            // -g --get-title prints no thumbnail for these platforms
            Platform::Facebook => Self {
                thumbnail_hosts: &[],
                video_hosts: &["fbcdn.net"],
            },
            Platform::Instagram => Self {
                thumbnail_hosts: &[],
                video_hosts: &["cdninstagram.com", "fbcdn.net"],
            },
        }
    }

    /// Whether `url` is an https URL on an allowed thumbnail host
    pub fn accepts_thumbnail(&self, url: &str) -> bool {
        url.starts_with("https://") && host_matches(url, self.thumbnail_hosts)
    }
}

/// What a single output line means
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LineClass {
    /// Download progress, 0 to 100
    Progress(u8),
    /// URL on a thumbnail CDN
    Thumbnail(String),
    /// Media URL on a video CDN
    DirectUrl(String),
    /// Candidate title, normalized
    Title(String),
    /// Anything else
    Noise,
}

/// Classify one line, first matching rule wins
pub fn classify_line(line: &str, rules: &CdnRules) -> LineClass {
    let line = line.trim();

    if let Some(caps) = PERCENT.captures(line) {
        // Any percentage line is consumed here; out-of-range values are dropped
        return match caps[1].parse::<u8>() {
            Ok(percent) if percent <= 100 => LineClass::Progress(percent),
            _ => LineClass::Noise,
        };
    }

    if line.starts_with("https://") {
        if host_matches(line, rules.thumbnail_hosts) {
            return LineClass::Thumbnail(line.to_string());
        }
        if is_direct_url(line, rules) {
            return LineClass::DirectUrl(line.to_string());
        }
    }

    if is_title_candidate(line) {
        return LineClass::Title(normalize_title(line));
    }
    LineClass::Noise
}

fn is_direct_url(line: &str, rules: &CdnRules) -> bool {
    line.starts_with("https://") && line.contains(".mp4") && host_matches(line, rules.video_hosts)
}

fn is_title_candidate(line: &str) -> bool {
    !line.is_empty()
        && !line.starts_with('[')
        && !line.starts_with("http://")
        && !line.starts_with("https://")
        && !line.contains("ERROR")
        && !line.to_ascii_lowercase().contains("warning")
}

fn host_matches(raw: &str, suffixes: &[&str]) -> bool {
    let Ok(parsed) = url::Url::parse(raw) else {
        return false;
    };
    let Some(host) = parsed.host_str() else {
        return false;
    };
    suffixes.iter().any(|suffix| {
        host == *suffix
            || host
                .strip_suffix(suffix)
                .is_some_and(|prefix| prefix.ends_with('.'))
    })
}

/// Metadata resolved over one attempt
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Resolution {
    /// First title candidate
    pub title: Option<String>,
    /// First thumbnail URL
    pub thumbnail_url: Option<String>,
    /// First direct media URL
    pub direct_url: Option<String>,
}

/// Per-attempt fold over output lines
#[derive(Debug)]
pub struct ProgressParser {
    rules: CdnRules,
    last_percent: Option<u8>,
    resolution: Resolution,
}

impl ProgressParser {
    /// Create a parser with the allow-lists of `platform`
    pub fn new(platform: Platform) -> Self {
        Self::with_rules(CdnRules::for_platform(platform))
    }

    /// Create a parser with explicit allow-lists
    pub fn with_rules(rules: CdnRules) -> Self {
        Self {
            rules,
            last_percent: None,
            resolution: Resolution::default(),
        }
    }

    /// Consume one line; returns the event it produces, if any
    pub fn feed(&mut self, line: &str) -> Option<ProgressEvent> {
        match classify_line(line, &self.rules) {
            LineClass::Progress(percent) => {
                if self.last_percent == Some(percent) {
                    return None;
                }
                self.last_percent = Some(percent);
                Some(ProgressEvent::Progress { percent })
            }
            LineClass::Thumbnail(url) if self.resolution.thumbnail_url.is_none() => {
                self.resolution.thumbnail_url = Some(url.clone());
                Some(resolved(None, None, Some(url)))
            }
            // A later thumbnail-host URL may still be the media file
            LineClass::Thumbnail(url) => {
                if is_direct_url(&url, &self.rules) {
                    self.resolve_direct(url)
                } else {
                    None
                }
            }
            LineClass::DirectUrl(url) => self.resolve_direct(url),
            LineClass::Title(title) if self.resolution.title.is_none() => {
                self.resolution.title = Some(title.clone());
                Some(resolved(Some(title), None, None))
            }
            LineClass::Title(_) | LineClass::Noise => None,
        }
    }

    fn resolve_direct(&mut self, url: String) -> Option<ProgressEvent> {
        if self.resolution.direct_url.is_some() {
            return None;
        }
        self.resolution.direct_url = Some(url.clone());
        Some(resolved(None, Some(url), None))
    }

    /// What has been resolved so far
    pub fn resolution(&self) -> &Resolution {
        &self.resolution
    }

    /// Finish the attempt
    pub fn into_resolution(self) -> Resolution {
        self.resolution
    }
}

fn resolved(
    title: Option<String>,
    direct_url: Option<String>,
    thumbnail_url: Option<String>,
) -> ProgressEvent {
    ProgressEvent::Resolved {
        title,
        direct_url,
        thumbnail_url,
    }
}
