//! External process supervision
//!
//! One [`ProcessRun`] serves exactly one subprocess: stdout and stderr are merged
//! into a single line stream, a silent process is killed after the idle timeout,
//! and cancellation kills it immediately.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Number of trailing output lines kept for failure diagnostics
const TAIL_LINES: usize = 5;

/// What to run and how long it may stay silent
#[derive(Clone, Debug)]
pub struct Invocation {
    /// Executable
    pub program: PathBuf,
    /// Arguments, program excluded
    pub args: Vec<String>,
    /// Kill the process when no line arrives and it does not exit within this window
    pub idle_timeout: Duration,
}

impl Invocation {
    /// Create an invocation
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>, idle_timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            idle_timeout,
        }
    }
}

/// A running (or finished) subprocess
///
/// Lines are yielded in arrival order until both output streams close; the exit
/// code is available afterwards. Not restartable.
pub struct ProcessRun {
    lines: mpsc::UnboundedReceiver<String>,
    exit: oneshot::Receiver<Result<i32>>,
    cancel: CancellationToken,
}

impl ProcessRun {
    /// Assemble a run from its channels
    ///
    /// Custom [`ProcessLauncher`]s use this; the producer must send every line
    /// before sending the exit result.
    pub fn from_parts(
        lines: mpsc::UnboundedReceiver<String>,
        exit: oneshot::Receiver<Result<i32>>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            lines,
            exit,
            cancel,
        }
    }

    /// A run that replays fixed output and exits with `exit`
    pub fn scripted<I, S>(lines: I, exit: Result<i32>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let (line_tx, line_rx) = mpsc::unbounded_channel();
        for line in lines {
            let _ = line_tx.send(line.into());
        }
        let (exit_tx, exit_rx) = oneshot::channel();
        let _ = exit_tx.send(exit);
        Self::from_parts(line_rx, exit_rx, CancellationToken::new())
    }

    /// Next merged output line, or `None` once the process closed its output
    pub async fn next_line(&mut self) -> Option<String> {
        self.lines.recv().await
    }

    /// Wait for the process to end
    ///
    /// Returns the exit code (-1 when killed by a signal), [`Error::ProcessTimeout`]
    /// when the idle timeout fired, or [`Error::Interrupted`] when cancelled.
    pub async fn exit_code(self) -> Result<i32> {
        match self.exit.await {
            Ok(result) => result,
            Err(_) => Err(Error::Interrupted),
        }
    }

    /// Feed every line to `on_line`, then map the exit into a result
    ///
    /// A non-zero exit becomes [`Error::ProcessFailure`] carrying the last few lines.
    /// Dropping the returned future before it completes kills the process.
    pub async fn drive<F>(mut self, mut on_line: F) -> Result<()>
    where
        F: FnMut(&str),
    {
        let kill_on_abandon = self.cancel.clone().drop_guard();
        let mut tail: VecDeque<String> = VecDeque::with_capacity(TAIL_LINES);
        while let Some(line) = self.next_line().await {
            on_line(&line);
            if tail.len() == TAIL_LINES {
                tail.pop_front();
            }
            tail.push_back(line);
        }

        let exit = self.exit_code().await;
        let _ = kill_on_abandon.disarm();
        match exit? {
            0 => Ok(()),
            exit_code => Err(Error::ProcessFailure {
                exit_code,
                tail: tail.into_iter().collect::<Vec<_>>().join("\n"),
            }),
        }
    }
}

/// Starts subprocesses
///
/// The orchestrator only talks to this trait, so tests can script process output
/// and count spawns.
#[async_trait]
pub trait ProcessLauncher: Send + Sync {
    /// Start one process; it is killed when `cancel` (or the run's own token) fires
    async fn launch(&self, invocation: &Invocation, cancel: &CancellationToken)
    -> Result<ProcessRun>;

    /// Whether `<program> <version_arg>` exits successfully
    async fn is_available(&self, program: &Path, version_arg: &str) -> bool;
}

/// [`ProcessLauncher`] backed by `tokio::process`
#[derive(Clone, Debug)]
pub struct TokioProcessLauncher {
    probe_timeout: Duration,
}

impl TokioProcessLauncher {
    /// Create a launcher whose availability probes give up after `probe_timeout`
    pub fn new(probe_timeout: Duration) -> Self {
        Self { probe_timeout }
    }
}

impl Default for TokioProcessLauncher {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

#[async_trait]
impl ProcessLauncher for TokioProcessLauncher {
    async fn launch(
        &self,
        invocation: &Invocation,
        cancel: &CancellationToken,
    ) -> Result<ProcessRun> {
        // stdout and stderr share one pipe so lines arrive in the order they were written
        let (reader, writer) = std::io::pipe()?;
        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(writer.try_clone()?)
            .stderr(writer)
            .kill_on_drop(true);
        let spawned = command.spawn();
        // Our copies of the write end must close, or the reader never sees EOF
        drop(command);

        let child = spawned.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                Error::tool_unavailable(invocation.program.display())
            }
            _ => Error::Io(e),
        })?;

        debug!(
            program = %invocation.program.display(),
            pid = ?child.id(),
            "spawned subprocess"
        );

        let (merged_tx, merged_rx) = mpsc::unbounded_channel();
        tokio::task::spawn_blocking(move || pump_lines(reader, merged_tx));

        let (line_tx, line_rx) = mpsc::unbounded_channel();
        let (exit_tx, exit_rx) = oneshot::channel();
        let run_cancel = cancel.child_token();

        tokio::spawn(supervise(
            child,
            merged_rx,
            line_tx,
            exit_tx,
            run_cancel.clone(),
            invocation.idle_timeout,
        ));

        Ok(ProcessRun::from_parts(line_rx, exit_rx, run_cancel))
    }

    async fn is_available(&self, program: &Path, version_arg: &str) -> bool {
        let probe = Command::new(program)
            .arg(version_arg)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status();

        match tokio::time::timeout(self.probe_timeout, probe).await {
            Ok(Ok(status)) => status.success(),
            Ok(Err(e)) => {
                debug!(program = %program.display(), error = %e, "availability probe failed");
                false
            }
            Err(_) => {
                warn!(program = %program.display(), "availability probe timed out");
                false
            }
        }
    }
}

/// Resolve a tool: explicit path, else PATH lookup, else the bare name
pub fn resolve_program(explicit: Option<&Path>, search_path: bool, name: &str) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    if search_path {
        if let Ok(found) = which::which(name) {
            return found;
        }
    }
    PathBuf::from(name)
}

fn pump_lines(reader: std::io::PipeReader, tx: mpsc::UnboundedSender<String>) {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(['\n', '\r']);
                if tx.send(line.to_string()).is_err() {
                    break;
                }
            }
            Err(e) => {
                debug!(error = %e, "subprocess output read failed");
                break;
            }
        }
    }
}

async fn supervise(
    mut child: Child,
    mut merged: mpsc::UnboundedReceiver<String>,
    lines: mpsc::UnboundedSender<String>,
    exit: oneshot::Sender<Result<i32>>,
    cancel: CancellationToken,
    idle_timeout: Duration,
) {
    // Forward output until both streams close
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                kill(&mut child, "cancelled").await;
                let _ = exit.send(Err(Error::Interrupted));
                return;
            }
            next = tokio::time::timeout(idle_timeout, merged.recv()) => match next {
                Ok(Some(line)) => {
                    // Consumer may have stopped listening; keep draining so the child never blocks on a full pipe
                    let _ = lines.send(line);
                }
                Ok(None) => break,
                Err(_) => {
                    kill(&mut child, "idle timeout").await;
                    let _ = exit.send(Err(Error::ProcessTimeout { after: idle_timeout }));
                    return;
                }
            }
        }
    }
    drop(lines);

    let result = tokio::select! {
        _ = cancel.cancelled() => {
            kill(&mut child, "cancelled").await;
            Err(Error::Interrupted)
        }
        waited = tokio::time::timeout(idle_timeout, child.wait()) => match waited {
            Ok(Ok(status)) => Ok(status.code().unwrap_or(-1)),
            Ok(Err(e)) => Err(Error::Io(e)),
            Err(_) => {
                kill(&mut child, "exit wait timeout").await;
                Err(Error::ProcessTimeout { after: idle_timeout })
            }
        }
    };
    let _ = exit.send(result);
}

async fn kill(child: &mut Child, reason: &str) {
    if let Err(e) = child.kill().await {
        warn!(error = %e, reason, "failed to kill subprocess");
    } else {
        debug!(reason, "killed subprocess");
    }
}
