//! Artifact storage under a single temp root, and age-based reaping
//!
//! Every path handed out or resolved here lies directly under the root. Names come
//! from sanitized titles or random ids, never from raw client input.

use crate::config::ReaperConfig;
use crate::error::{Error, Result};
use crate::types::JobId;
use crate::validation::sanitize_title;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Extension of every artifact
pub const ARTIFACT_EXTENSION: &str = "mp4";

/// Result of one reaping sweep
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReapReport {
    /// Files removed
    pub deleted: usize,
    /// Files that were due but could not be removed
    pub failed: usize,
}

/// Maps jobs to files under the temp root
#[derive(Debug)]
pub struct ArtifactStore {
    root: PathBuf,
    index: RwLock<HashMap<JobId, PathBuf>>,
    // Paths handed to in-flight jobs whose file may not exist yet
    reserved: RwLock<HashSet<PathBuf>>,
}

impl ArtifactStore {
    /// Open (creating if needed) the temp root
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self {
            root,
            index: RwLock::new(HashMap::new()),
            reserved: RwLock::new(HashSet::new()),
        })
    }

    /// The temp root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reserve a fresh output path, named after `name_hint` when it sanitizes to something
    ///
    /// The path stays reserved until [`release`](Self::release) or until the reaper
    /// removes its file, so concurrent jobs for the same title never share a file.
    pub async fn allocate(&self, name_hint: Option<&str>) -> PathBuf {
        let stem = name_hint.and_then(sanitize_title);
        let mut reserved = self.reserved.write().await;

        let mut candidate = match &stem {
            Some(stem) => self.root.join(format!("{stem}.{ARTIFACT_EXTENSION}")),
            None => self.root.join(format!("{}.{ARTIFACT_EXTENSION}", random_id())),
        };
        while reserved.contains(&candidate) || candidate.exists() {
            let id = random_id();
            candidate = match &stem {
                Some(stem) => self
                    .root
                    .join(format!("{stem}_{}.{ARTIFACT_EXTENSION}", &id[..8])),
                None => self.root.join(format!("{id}.{ARTIFACT_EXTENSION}")),
            };
        }

        reserved.insert(candidate.clone());
        candidate
    }

    /// Give up a reservation from [`allocate`](Self::allocate) whose job produced no artifact
    pub async fn release(&self, path: &Path) {
        self.reserved.write().await.remove(path);
    }

    /// Remember the artifact of a finished job
    pub async fn record(&self, job_id: JobId, path: PathBuf) {
        self.index.write().await.insert(job_id, path);
    }

    /// Artifact recorded for a job
    pub async fn path_for(&self, job_id: JobId) -> Option<PathBuf> {
        self.index.read().await.get(&job_id).cloned()
    }

    /// Map a client-supplied name to an existing file under the root
    ///
    /// Only the final path component is used, so `../x` and absolute paths elsewhere
    /// cannot escape the root.
    pub async fn resolve(&self, filename: &str) -> Result<PathBuf> {
        let Some(name) = Path::new(filename.trim()).file_name() else {
            return Err(Error::FileNotFound(PathBuf::from(filename)));
        };
        let path = self.root.join(name);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(path),
            _ => Err(Error::FileNotFound(path)),
        }
    }

    /// Read an artifact; repeated reads return the same bytes
    pub async fn read(&self, filename: &str) -> Result<Vec<u8>> {
        let path = self.resolve(filename).await?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::FileNotFound(path)),
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Delete artifacts whose modification time is at least `retention` old
    ///
    /// Per-file failures are logged and counted, never returned.
    pub async fn reap(&self, retention: Duration) -> ReapReport {
        let mut report = ReapReport::default();
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(root = ?self.root, error = %e, "cannot scan temp root");
                return report;
            }
        };

        let now = SystemTime::now();
        let mut removed = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "temp root listing interrupted");
                    break;
                }
            };
            let path = entry.path();
            if !is_artifact(&path) {
                continue;
            }

            let modified = match entry.metadata().await.and_then(|m| m.modified()) {
                Ok(modified) => modified,
                Err(e) => {
                    warn!(?path, error = %e, "cannot read artifact age");
                    report.failed += 1;
                    continue;
                }
            };
            let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
            if age < retention {
                continue;
            }

            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    debug!(?path, age_secs = age.as_secs(), "reaped artifact");
                    report.deleted += 1;
                    removed.push(path);
                }
                Err(e) => {
                    warn!(?path, error = %e, "failed to delete artifact");
                    report.failed += 1;
                }
            }
        }

        if !removed.is_empty() {
            self.index
                .write()
                .await
                .retain(|_, path| !removed.contains(path));
            self.reserved
                .write()
                .await
                .retain(|path| !removed.contains(path));
        }
        report
    }
}

fn is_artifact(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ARTIFACT_EXTENSION))
}

fn random_id() -> String {
    format!("{:032x}", rand::random::<u128>())
}

/// Periodic artifact sweep
pub struct Reaper;

impl Reaper {
    /// Sweep every `config.interval` until `cancel` fires
    pub fn spawn(
        store: Arc<ArtifactStore>,
        config: ReaperConfig,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                interval_secs = config.interval.as_secs(),
                retention_secs = config.retention.as_secs(),
                "artifact reaper started"
            );
            let start = tokio::time::Instant::now() + config.interval;
            let mut ticker = tokio::time::interval_at(start, config.interval);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let report = store.reap(config.retention).await;
                        if report.deleted > 0 || report.failed > 0 {
                            info!(deleted = report.deleted, failed = report.failed, "artifact sweep finished");
                        }
                    }
                }
            }
            info!("artifact reaper stopped");
        })
    }
}
