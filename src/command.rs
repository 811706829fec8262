//! Argument vectors for the external fetch tool
//!
//! Builders never fail: URLs reaching this module have already passed
//! [`crate::validation::validate_url`].

use crate::types::{FetchOptions, Platform};
use std::path::Path;

const TIKTOK_REFERER: &str = "Referer:https://www.tiktok.com/";
const TIKTOK_ORIGIN: &str = "Origin:https://www.tiktok.com";
const TIKTOK_H264_FORMAT: &str = "bv*[vcodec^=avc1][ext=mp4]+ba[ext=m4a]/best";
const TIKTOK_RECODE_ARGS: &str = "-c:v libx264 -preset medium -crf 23 -c:a copy";

/// Arguments for one fetch tool invocation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandPlan {
    /// Arguments, program name excluded
    pub args: Vec<String>,
}

impl CommandPlan {
    fn new(args: Vec<String>) -> Self {
        Self { args }
    }
}

/// Whether [`download`] for `platform` hands the file to the transcode tool
///
/// TikTok output is re-encoded to H.264, so the transcode tool must be installed.
pub fn requires_transcode(platform: Platform) -> bool {
    platform == Platform::TikTok
}

/// Proxy value the tool should receive, if it parses as a URL
pub fn effective_proxy(options: &FetchOptions) -> Option<&str> {
    options
        .proxy
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty() && url::Url::parse(p).is_ok())
}

/// Download the video at `url` into `output`
pub fn download(platform: Platform, url: &str, output: &Path, options: &FetchOptions) -> CommandPlan {
    let output = output.to_string_lossy().into_owned();
    match platform {
        Platform::Facebook | Platform::Instagram => CommandPlan::new(strings(&[
            "--newline",
            "-f",
            "best",
            "-o",
            &output,
            url,
        ])),
        Platform::TikTok => {
            let mut args = tiktok_headers(options);
            args.push("--ignore-config".into());
            args.push("--newline".into());
            push_session_args(&mut args, options, true);
            args.extend(strings(&[
                "-f",
                TIKTOK_H264_FORMAT,
                "-S",
                "vcodec:avc",
                "--recode-video",
                "mp4",
                "--postprocessor-args",
                TIKTOK_RECODE_ARGS,
                "-o",
                &output,
                url,
            ]));
            CommandPlan::new(args)
        }
    }
}

/// Print only the title of the video at `url`
pub fn title_probe(url: &str) -> CommandPlan {
    CommandPlan::new(strings(&["--get-title", url]))
}

/// Print title, thumbnail and media URL without downloading
pub fn preview(platform: Platform, url: &str, options: &FetchOptions) -> CommandPlan {
    match platform {
        Platform::Facebook => CommandPlan::new(strings(&["-f", "b", "-g", "--get-title", url])),
        Platform::Instagram => {
            CommandPlan::new(strings(&["-f", "best", "-g", "--get-title", url]))
        }
        Platform::TikTok => {
            let mut args = tiktok_headers(options);
            push_session_args(&mut args, options, false);
            args.extend(strings(&[
                "--print",
                "title",
                "--print",
                "thumbnail",
                "--print",
                "url",
                url,
            ]));
            CommandPlan::new(args)
        }
    }
}

fn tiktok_headers(options: &FetchOptions) -> Vec<String> {
    let user_agent = if options.user_agent.is_empty() {
        crate::config::DEFAULT_USER_AGENT
    } else {
        options.user_agent.as_str()
    };
    strings(&[
        "--user-agent",
        user_agent,
        "--add-header",
        TIKTOK_REFERER,
        "--add-header",
        TIKTOK_ORIGIN,
        "--no-check-certificate",
        "--extractor-retries",
        "3",
    ])
}

// Cookies win over the proxy; the two never appear together.
fn push_session_args(args: &mut Vec<String>, options: &FetchOptions, no_cache_otherwise: bool) {
    if let Some(cookies) = &options.cookies_path {
        args.push("--cookies".into());
        args.push(cookies.to_string_lossy().into_owned());
    } else if let Some(proxy) = effective_proxy(options) {
        args.push("--proxy".into());
        args.push(proxy.to_string());
    } else if no_cache_otherwise {
        args.push("--no-cache-dir".into());
    }
}

fn strings(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const TIKTOK: &str = "https://www.tiktok.com/@user/video/123";

    fn opts(proxy: Option<&str>, cookies: Option<&str>) -> FetchOptions {
        FetchOptions {
            proxy: proxy.map(String::from),
            cookies_path: cookies.map(PathBuf::from),
            user_agent: String::new(),
        }
    }

    fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn facebook_download_is_minimal() {
        let plan = download(
            Platform::Facebook,
            "https://fb.watch/x/",
            Path::new("/tmp/a.mp4"),
            &FetchOptions::default(),
        );

        assert_eq!(
            plan.args,
            vec!["--newline", "-f", "best", "-o", "/tmp/a.mp4", "https://fb.watch/x/"]
        );
        assert!(!requires_transcode(Platform::Facebook));
        assert!(!requires_transcode(Platform::Instagram));
    }

    #[test]
    fn tiktok_download_requests_h264_and_ends_with_output_and_url() {
        let plan = download(
            Platform::TikTok,
            TIKTOK,
            Path::new("/tmp/b.mp4"),
            &FetchOptions::default(),
        );

        assert!(requires_transcode(Platform::TikTok));
        assert_eq!(value_after(&plan.args, "-S"), Some("vcodec:avc"));
        assert_eq!(value_after(&plan.args, "--recode-video"), Some("mp4"));
        assert_eq!(
            value_after(&plan.args, "--user-agent"),
            Some(crate::config::DEFAULT_USER_AGENT)
        );
        assert!(plan.args.contains(&"--no-cache-dir".to_string()));
        let tail = &plan.args[plan.args.len() - 3..];
        assert_eq!(tail, ["-o", "/tmp/b.mp4", TIKTOK]);
    }

    #[test]
    fn valid_proxy_is_passed_through() {
        let plan = download(
            Platform::TikTok,
            TIKTOK,
            Path::new("/tmp/c.mp4"),
            &opts(Some("http://10.0.0.1:3128"), None),
        );

        assert_eq!(value_after(&plan.args, "--proxy"), Some("http://10.0.0.1:3128"));
        assert!(!plan.args.contains(&"--no-cache-dir".to_string()));
    }

    #[test]
    fn unparseable_proxy_is_ignored() {
        let plan = preview(Platform::TikTok, TIKTOK, &opts(Some("not a proxy"), None));
        assert!(!plan.args.contains(&"--proxy".to_string()));
    }

    #[test]
    fn cookies_take_precedence_over_proxy() {
        let plan = download(
            Platform::TikTok,
            TIKTOK,
            Path::new("/tmp/d.mp4"),
            &opts(Some("http://10.0.0.1:3128"), Some("/etc/cookies.txt")),
        );

        assert_eq!(value_after(&plan.args, "--cookies"), Some("/etc/cookies.txt"));
        assert!(!plan.args.contains(&"--proxy".to_string()));
    }

    #[test]
    fn previews_print_metadata_without_downloading() {
        let fb = preview(Platform::Facebook, "https://fb.watch/x/", &FetchOptions::default());
        assert_eq!(fb.args, vec!["-f", "b", "-g", "--get-title", "https://fb.watch/x/"]);

        let tt = preview(Platform::TikTok, TIKTOK, &FetchOptions::default());
        assert_eq!(
            tt.args.iter().filter(|a| *a == "--print").count(),
            3,
            "title, thumbnail and url"
        );
        assert!(!tt.args.contains(&"-o".to_string()));
        assert_eq!(tt.args.last().map(String::as_str), Some(TIKTOK));
    }

    #[test]
    fn title_probe_only_asks_for_the_title() {
        assert_eq!(title_probe("https://fb.watch/x/").args, vec!["--get-title", "https://fb.watch/x/"]);
    }
}
