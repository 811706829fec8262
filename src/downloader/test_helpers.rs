//! Shared test helpers for creating SocialDownloader instances in tests.

use crate::config::Config;
use crate::downloader::SocialDownloader;
use crate::error::{Error, Result};
use crate::supervisor::{Invocation, ProcessLauncher, ProcessRun};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::tempdir;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

/// What one scripted launch does
#[derive(Clone, Debug)]
pub(crate) enum Script {
    /// Print `lines`, optionally write the `-o` target, then exit with `exit`
    Output {
        lines: Vec<String>,
        exit: i32,
        delay: Duration,
        create_output: bool,
    },
    /// Never exit on its own; ends as interrupted once cancelled
    Hang,
}

impl Script {
    pub(crate) fn fail(lines: &[&str]) -> Self {
        Script::Output {
            lines: lines.iter().map(|l| l.to_string()).collect(),
            exit: 1,
            delay: Duration::ZERO,
            create_output: false,
        }
    }

    pub(crate) fn succeed(lines: &[&str]) -> Self {
        Script::Output {
            lines: lines.iter().map(|l| l.to_string()).collect(),
            exit: 0,
            delay: Duration::ZERO,
            create_output: true,
        }
    }

    /// Output of a `--get-title` probe
    pub(crate) fn title(title: &str) -> Self {
        Script::Output {
            lines: vec![title.to_string()],
            exit: 0,
            delay: Duration::ZERO,
            create_output: false,
        }
    }

    pub(crate) fn slow(self, delay: Duration) -> Self {
        match self {
            Script::Output {
                lines,
                exit,
                create_output,
                ..
            } => Script::Output {
                lines,
                exit,
                delay,
                create_output,
            },
            Script::Hang => Script::Hang,
        }
    }
}

/// Launcher that plays back scripts and records every invocation
///
/// Queued scripts are used in order; once they run out `fallback` repeats.
pub(crate) struct ScriptedLauncher {
    scripts: Mutex<VecDeque<Script>>,
    fallback: Script,
    invocations: Mutex<Vec<Vec<String>>>,
    available: AtomicBool,
    // Probes with this version argument report the tool missing
    missing_probe: Mutex<Option<&'static str>>,
    running: Arc<AtomicUsize>,
    max_running: Arc<AtomicUsize>,
}

impl ScriptedLauncher {
    pub(crate) fn new(fallback: Script) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(VecDeque::new()),
            fallback,
            invocations: Mutex::new(Vec::new()),
            available: AtomicBool::new(true),
            missing_probe: Mutex::new(None),
            running: Arc::new(AtomicUsize::new(0)),
            max_running: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub(crate) fn with_scripts(scripts: Vec<Script>, fallback: Script) -> Arc<Self> {
        let launcher = Self::new(fallback);
        launcher.scripts.lock().unwrap().extend(scripts);
        launcher
    }

    pub(crate) fn unavailable(fallback: Script) -> Arc<Self> {
        let launcher = Self::new(fallback);
        launcher.available.store(false, Ordering::SeqCst);
        launcher
    }

    /// Fetch tool present, transcode tool (probed with `-version`) missing
    pub(crate) fn without_transcode(fallback: Script) -> Arc<Self> {
        let launcher = Self::new(fallback);
        *launcher.missing_probe.lock().unwrap() = Some("-version");
        launcher
    }

    pub(crate) fn launch_count(&self) -> usize {
        self.invocations.lock().unwrap().len()
    }

    pub(crate) fn invocations(&self) -> Vec<Vec<String>> {
        self.invocations.lock().unwrap().clone()
    }

    pub(crate) fn max_running(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }

    fn next_script(&self) -> Script {
        self.scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

/// Decrements the running gauge when a scripted process ends
struct RunningGuard(Arc<AtomicUsize>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ProcessLauncher for ScriptedLauncher {
    async fn launch(&self, invocation: &Invocation, cancel: &CancellationToken) -> Result<ProcessRun> {
        self.invocations
            .lock()
            .unwrap()
            .push(invocation.args.clone());
        let script = self.next_script();

        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);
        let guard = RunningGuard(self.running.clone());

        let output = invocation
            .args
            .iter()
            .position(|a| a == "-o")
            .and_then(|i| invocation.args.get(i + 1))
            .cloned();

        let (line_tx, line_rx) = mpsc::unbounded_channel();
        let (exit_tx, exit_rx) = oneshot::channel();
        let run_token = cancel.child_token();
        let token = run_token.clone();

        tokio::spawn(async move {
            let _guard = guard;
            let exit = match script {
                Script::Hang => {
                    token.cancelled().await;
                    Err(Error::Interrupted)
                }
                Script::Output {
                    lines,
                    exit,
                    delay,
                    create_output,
                } => {
                    for line in lines {
                        let _ = line_tx.send(line);
                    }
                    let cancelled = tokio::select! {
                        _ = token.cancelled() => true,
                        _ = tokio::time::sleep(delay) => false,
                    };
                    if cancelled {
                        Err(Error::Interrupted)
                    } else {
                        if create_output && exit == 0 {
                            if let Some(path) = &output {
                                tokio::fs::write(path, b"scripted video bytes").await.unwrap();
                            }
                        }
                        Ok(exit)
                    }
                }
            };
            drop(line_tx);
            let _ = exit_tx.send(exit);
        });

        Ok(ProcessRun::from_parts(line_rx, exit_rx, run_token))
    }

    async fn is_available(&self, _program: &Path, version_arg: &str) -> bool {
        let missing = *self.missing_probe.lock().unwrap() == Some(version_arg);
        self.available.load(Ordering::SeqCst) && !missing
    }
}

/// Test configuration rooted in a fresh tempdir with fast retries
pub(crate) fn test_config(temp: &Path) -> Config {
    let mut config = Config::default();
    config.download.temp_dir = temp.join("artifacts");
    config.download.pool_size = 3;
    config.download.queue_capacity = 3;
    config.download.shutdown_grace = Duration::from_secs(2);
    config.retry.backoff = Duration::from_millis(10);
    config.retry.jitter = false;
    // Nothing listens on the discard port, so oEmbed fails fast
    config.preview.oembed_endpoint = "http://127.0.0.1:9/oembed".to_string();
    config.preview.oembed_timeout = Duration::from_secs(1);
    config
}

/// Helper to create a test SocialDownloader driven by `launcher`.
/// Returns the downloader and the tempdir (which must be kept alive).
pub(crate) async fn create_test_downloader(
    launcher: Arc<ScriptedLauncher>,
) -> (SocialDownloader, tempfile::TempDir) {
    let temp_dir = tempdir().unwrap();
    let config = test_config(temp_dir.path());
    create_test_downloader_with_config(config, launcher, temp_dir).await
}

/// Same as [`create_test_downloader`] with a caller-adjusted config
pub(crate) async fn create_test_downloader_with_config(
    config: Config,
    launcher: Arc<ScriptedLauncher>,
    temp_dir: tempfile::TempDir,
) -> (SocialDownloader, tempfile::TempDir) {
    let downloader = SocialDownloader::with_launcher(config, launcher)
        .await
        .unwrap();
    (downloader, temp_dir)
}
