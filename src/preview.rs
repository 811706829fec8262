//! Video metadata lookup without downloading
//!
//! TikTok asks the public oEmbed endpoint first and only falls back to the fetch
//! tool when that fails. Facebook and Instagram always use the fetch tool.

use crate::command;
use crate::config::{PreviewConfig, RetryConfig};
use crate::error::{Error, Result};
use crate::parser::{CdnRules, ProgressParser};
use crate::retry::{Outcome, run_with_retry};
use crate::supervisor::{Invocation, ProcessLauncher};
use crate::types::{FetchOptions, Platform, PreviewResult, PreviewSource};
use crate::validation::normalize_title;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Title used when a source reports none
pub const UNTITLED: &str = "Untitled";

#[derive(Debug, Deserialize)]
struct OEmbedResponse {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    thumbnail_url: Option<String>,
    #[serde(default)]
    html: Option<String>,
}

/// Runs preview lookups
pub struct Previewer {
    http: reqwest::Client,
    config: PreviewConfig,
    retry: RetryConfig,
    launcher: Arc<dyn ProcessLauncher>,
    fetch_tool: PathBuf,
}

impl Previewer {
    /// Create a previewer that launches `fetch_tool` through `launcher`
    pub fn new(
        config: PreviewConfig,
        retry: RetryConfig,
        launcher: Arc<dyn ProcessLauncher>,
        fetch_tool: PathBuf,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.oembed_timeout)
            .build()?;
        Ok(Self {
            http,
            config,
            retry,
            launcher,
            fetch_tool,
        })
    }

    /// Look up metadata for an already validated URL
    pub async fn fetch(
        &self,
        platform: Platform,
        url: &str,
        options: &FetchOptions,
        cancel: &CancellationToken,
    ) -> Result<PreviewResult> {
        if platform == Platform::TikTok {
            match self.oembed(url, &options.user_agent).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    info!(error = %e, "oEmbed lookup failed, falling back to fetch tool");
                }
            }
        }
        self.via_fetch_tool(platform, url, options, cancel).await
    }

    async fn oembed(&self, url: &str, user_agent: &str) -> Result<PreviewResult> {
        let user_agent = if user_agent.is_empty() {
            crate::config::DEFAULT_USER_AGENT
        } else {
            user_agent
        };
        let endpoint = format!(
            "{}?url={}",
            self.config.oembed_endpoint,
            urlencoding::encode(url)
        );

        let response = self
            .http
            .get(&endpoint)
            .header(reqwest::header::USER_AGENT, user_agent)
            .header(reqwest::header::REFERER, "https://www.tiktok.com/")
            .send()
            .await?
            .error_for_status()?;
        let body: OEmbedResponse = response.json().await?;
        debug!(has_thumbnail = body.thumbnail_url.is_some(), "oEmbed answered");

        let rules = CdnRules::for_platform(Platform::TikTok);
        let thumbnail_url = body.thumbnail_url.filter(|t| {
            let accepted = rules.accepts_thumbnail(t);
            if !accepted {
                warn!(thumbnail = %t, "oEmbed thumbnail outside allowed hosts, dropping it");
            }
            accepted
        });

        Ok(PreviewResult {
            title: title_or_default(body.title),
            thumbnail_url,
            direct_url: None,
            embed_html: body.html,
            source: PreviewSource::OEmbed,
        })
    }

    async fn via_fetch_tool(
        &self,
        platform: Platform,
        url: &str,
        options: &FetchOptions,
        cancel: &CancellationToken,
    ) -> Result<PreviewResult> {
        let outcome = run_with_retry(&self.retry, options.clone(), cancel, |ctx| async move {
            let plan = command::preview(platform, url, &ctx.options);
            let invocation = Invocation::new(
                self.fetch_tool.clone(),
                plan.args,
                self.config.preview_timeout,
            );
            debug!(attempt = ctx.number, %platform, "running preview attempt");

            let run = self.launcher.launch(&invocation, cancel).await?;
            let mut parser = ProgressParser::new(platform);
            run.drive(|line| {
                parser.feed(line);
            })
            .await?;
            Ok(parser.into_resolution())
        })
        .await;

        match outcome {
            Outcome::Succeeded(resolution) => Ok(PreviewResult {
                title: title_or_default(resolution.title),
                thumbnail_url: resolution.thumbnail_url,
                direct_url: resolution.direct_url,
                embed_html: None,
                source: PreviewSource::FetchTool,
            }),
            Outcome::Failed(e @ (Error::ToolUnavailable { .. } | Error::InvalidInput { .. })) => {
                Err(e)
            }
            Outcome::Failed(e) | Outcome::Exhausted(e) => Err(Error::PreviewFailed {
                reason: e.to_string(),
            }),
        }
    }
}

fn title_or_default(title: Option<String>) -> String {
    title
        .map(|t| normalize_title(&t))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| UNTITLED.to_string())
}
