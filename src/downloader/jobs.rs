//! Job submission and the per-job attempt loop.

use crate::command;
use crate::error::{Error, Result};
use crate::parser::ProgressParser;
use crate::relay::{self, SessionRelay};
use crate::retry::{Outcome, run_with_retry};
use crate::supervisor::Invocation;
use crate::types::{FetchOptions, FetchRequest, JobEvent, JobId, JobRecord, JobState, Platform, ProgressEvent};
use crate::validation::validate_url;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::Ordering;
use tokio_util::sync::CancellationToken;

use super::{JobHandle, SocialDownloader};

/// Everything a queued job needs once a worker picks it up
struct JobSpec {
    id: JobId,
    platform: Platform,
    url: String,
    title_hint: Option<String>,
    options: FetchOptions,
}

/// Fans job events out to the session relay and the broadcast channel
struct EventSink<'a> {
    downloader: &'a SocialDownloader,
    job_id: JobId,
    relay: Mutex<SessionRelay>,
}

impl EventSink<'_> {
    fn emit(&self, event: ProgressEvent) {
        if let Ok(mut relay) = self.relay.lock() {
            relay.forward(event.clone());
        }
        self.downloader.emit_event(JobEvent {
            job_id: self.job_id,
            event,
        });
    }

    fn finish(&self, event: ProgressEvent) {
        if let Ok(mut relay) = self.relay.lock() {
            relay.finish(event.clone());
        }
        self.downloader.emit_event(JobEvent {
            job_id: self.job_id,
            event,
        });
    }
}

impl SocialDownloader {
    /// Submit a download job
    ///
    /// The URL is validated and the external tools are checked before anything is
    /// queued, so [`Error::InvalidInput`], [`Error::ToolUnavailable`] and
    /// [`Error::ShuttingDown`] are returned here without starting a download.
    ///
    /// The returned handle streams progress until exactly one terminal event
    /// (`done`, `error` or `fallback`) or until the platform's session ceiling.
    ///
    /// When every worker and queue slot is taken the job runs in the calling task
    /// and this returns only after it finishes; its events are still delivered
    /// through the handle.
    pub async fn submit_job(&self, request: FetchRequest) -> Result<JobHandle> {
        if !self.pool.is_accepting() {
            return Err(Error::ShuttingDown);
        }

        let url = validate_url(request.platform, &request.source_url)?;
        self.preflight(request.platform).await?;

        let options = self.merge_options(request.platform, request.options);
        let id = JobId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.registry
            .write()
            .await
            .insert(id, JobRecord::new(id, request.platform, url.clone()));

        let job_token = self.pool.child_token();
        let ceiling = self.session_ceiling(request.platform);
        let (session, events) = relay::open(ceiling, job_token.clone());

        tracing::info!(
            job_id = %id,
            platform = %request.platform,
            ceiling_secs = ceiling.as_secs(),
            "job accepted"
        );

        let spec = JobSpec {
            id,
            platform: request.platform,
            url,
            title_hint: request.title_hint,
            options,
        };
        let downloader = self.clone();
        let job = async move { downloader.run_job(spec, session, job_token).await };

        match self.pool.submit(job).await {
            Ok(submission) => Ok(JobHandle {
                id,
                submission,
                events,
            }),
            Err(e) => {
                self.registry.write().await.remove(&id);
                Err(e)
            }
        }
    }

    /// Check the tools a platform needs without launching a download
    async fn preflight(&self, platform: Platform) -> Result<()> {
        if !self.launcher.is_available(&self.tools.fetch, "--version").await {
            return Err(Error::tool_unavailable(self.tools.fetch.display()));
        }
        if command::requires_transcode(platform)
            && !self
                .launcher
                .is_available(&self.tools.transcode, "-version")
                .await
        {
            return Err(Error::tool_unavailable(self.tools.transcode.display()));
        }
        Ok(())
    }

    /// Request options with configured platform defaults filling the gaps
    fn merge_options(&self, platform: Platform, requested: FetchOptions) -> FetchOptions {
        let defaults = self.default_options(platform);
        FetchOptions {
            proxy: requested.proxy.or(defaults.proxy),
            cookies_path: requested.cookies_path.or(defaults.cookies_path),
            user_agent: if requested.user_agent.is_empty() {
                defaults.user_agent
            } else {
                requested.user_agent
            },
        }
    }

    fn session_ceiling(&self, platform: Platform) -> std::time::Duration {
        match platform {
            Platform::Facebook => self.config.download.facebook_session_ceiling,
            Platform::Instagram | Platform::TikTok => self.config.download.session_ceiling,
        }
    }

    /// Worker body: attempts, then exactly one terminal event
    async fn run_job(self, spec: JobSpec, session: SessionRelay, cancel: CancellationToken) {
        let sink = EventSink {
            downloader: &self,
            job_id: spec.id,
            relay: Mutex::new(session),
        };

        if cancel.is_cancelled() {
            self.fail(&sink, spec.id, Error::Interrupted).await;
            return;
        }
        self.transition(spec.id, JobState::Running).await;
        tracing::debug!(job_id = %spec.id, "job started");

        let title = match spec.title_hint {
            Some(title) => Some(title),
            None if spec.platform == Platform::Facebook => {
                self.probe_title(spec.id, &spec.url, &cancel).await
            }
            None => None,
        };
        let output = self.store.allocate(title.as_deref()).await;

        let (id, platform) = (spec.id, spec.platform);
        let sink_ref = &sink;
        let this = &self;
        let (url, output_ref, cancel_ref) = (spec.url.as_str(), output.as_path(), &cancel);
        let outcome = run_with_retry(&self.config.retry, spec.options, &cancel, |ctx| async move {
            this.bump_attempts(id).await;
            tracing::debug!(
                job_id = %id,
                attempt = ctx.number,
                proxied = command::effective_proxy(&ctx.options).is_some(),
                "launching fetch tool"
            );

            let plan = command::download(platform, url, output_ref, &ctx.options);
            let invocation = Invocation::new(
                this.tools.fetch.clone(),
                plan.args,
                this.config.download.attempt_timeout,
            );
            let run = this.launcher.launch(&invocation, cancel_ref).await?;

            let mut parser = ProgressParser::new(platform);
            run.drive(|line| {
                if let Some(event) = parser.feed(line) {
                    sink_ref.emit(event);
                }
            })
            .await?;

            ensure_artifact(output_ref).await
        })
        .await;

        match outcome {
            Outcome::Succeeded(path) => {
                self.store.record(id, path.clone()).await;
                if let Some(record) = self.registry.write().await.get_mut(&id) {
                    record.file_path = Some(path.clone());
                }
                self.transition(id, JobState::Succeeded).await;
                tracing::info!(job_id = %id, path = %path.display(), "job succeeded");
                sink.finish(ProgressEvent::Done { file_path: path });
            }
            Outcome::Failed(e) => {
                self.store.release(&output).await;
                self.fail(&sink, id, e).await;
            }
            Outcome::Exhausted(e) => {
                self.store.release(&output).await;
                self.transition(id, JobState::FellBack).await;
                tracing::warn!(job_id = %id, error = %e, "attempts exhausted, falling back to source URL");
                sink.finish(ProgressEvent::Fallback {
                    original_url: spec.url,
                });
            }
        }
    }

    async fn fail(&self, sink: &EventSink<'_>, id: JobId, error: Error) {
        self.transition(id, JobState::Failed).await;
        tracing::warn!(job_id = %id, error = %error, "job failed");
        sink.finish(ProgressEvent::Error {
            message: self.catalog.message(error.kind()).to_string(),
        });
    }

    async fn bump_attempts(&self, id: JobId) {
        if let Some(record) = self.registry.write().await.get_mut(&id) {
            record.attempts += 1;
        }
    }

    /// Ask the fetch tool for a title to name the artifact after
    ///
    /// Failures are logged and yield `None`; the job continues with a random name.
    async fn probe_title(&self, id: JobId, url: &str, cancel: &CancellationToken) -> Option<String> {
        let plan = command::title_probe(url);
        let invocation = Invocation::new(
            self.tools.fetch.clone(),
            plan.args,
            self.config.download.attempt_timeout,
        );
        let run = match self.launcher.launch(&invocation, cancel).await {
            Ok(run) => run,
            Err(e) => {
                tracing::warn!(job_id = %id, error = %e, "title probe could not start");
                return None;
            }
        };

        let mut parser = ProgressParser::new(Platform::Facebook);
        match run.drive(|line| {
            parser.feed(line);
        })
        .await
        {
            Ok(()) => parser.into_resolution().title,
            Err(e) => {
                tracing::warn!(job_id = %id, error = %e, "title probe failed");
                None
            }
        }
    }
}

/// A zero exit without the output file is not a success
async fn ensure_artifact(path: &Path) -> Result<PathBuf> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => Ok(path.to_path_buf()),
        _ => Err(Error::FileNotFound(path.to_path_buf())),
    }
}
