//! Bounded worker pool with caller-runs overflow
//!
//! At most `pool_size` jobs execute at once. Up to `queue_capacity` more wait for a
//! worker; beyond that the submitting task runs the job itself, so no submission is
//! ever rejected while the pool is accepting work.

use crate::error::{Error, Result};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Semaphore, TryAcquireError};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// Worker count used when the configured value is unusable
pub const DEFAULT_POOL_SIZE: usize = 10;

/// How long shutdown waits for force-cancelled jobs to unwind
const CANCEL_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Where a submitted job ended up
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Submission {
    /// A worker was free; the job started immediately
    Started,
    /// The job waits in the queue for a worker
    Queued,
    /// Pool and queue were full; the job ran to completion in the caller
    RanInline,
}

/// Fixed-size job executor
#[derive(Clone)]
pub struct WorkerPool {
    workers: Arc<Semaphore>,
    queue_slots: Arc<Semaphore>,
    pool_size: usize,
    queue_capacity: usize,
    tracker: TaskTracker,
    root: CancellationToken,
    accepting: Arc<AtomicBool>,
}

impl WorkerPool {
    /// Create a pool; a non-positive `pool_size` falls back to [`DEFAULT_POOL_SIZE`]
    pub fn new(pool_size: i64, queue_capacity: usize) -> Self {
        let pool_size = match usize::try_from(pool_size) {
            Ok(size) if size > 0 => size,
            _ => {
                warn!(
                    configured = pool_size,
                    fallback = DEFAULT_POOL_SIZE,
                    "invalid pool size, using default"
                );
                DEFAULT_POOL_SIZE
            }
        };

        Self {
            workers: Arc::new(Semaphore::new(pool_size)),
            queue_slots: Arc::new(Semaphore::new(queue_capacity)),
            pool_size,
            queue_capacity,
            tracker: TaskTracker::new(),
            root: CancellationToken::new(),
            accepting: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Number of workers
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Jobs currently holding a worker
    pub fn running(&self) -> usize {
        self.pool_size - self.workers.available_permits()
    }

    /// Jobs waiting for a worker
    pub fn queued(&self) -> usize {
        self.queue_capacity - self.queue_slots.available_permits()
    }

    /// Whether new submissions are accepted
    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }

    /// A token cancelled when shutdown force-cancels remaining work
    pub fn child_token(&self) -> CancellationToken {
        self.root.child_token()
    }

    /// Submit a job
    ///
    /// Returns [`Error::ShuttingDown`] once [`shutdown`](Self::shutdown) has begun.
    /// When the job runs inline this call returns only after it completes.
    pub async fn submit<F>(&self, job: F) -> Result<Submission>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if !self.is_accepting() {
            return Err(Error::ShuttingDown);
        }

        match self.workers.clone().try_acquire_owned() {
            Ok(permit) => {
                self.tracker.spawn(async move {
                    let _permit = permit;
                    job.await;
                });
                return Ok(Submission::Started);
            }
            Err(TryAcquireError::Closed) => return Err(Error::ShuttingDown),
            Err(TryAcquireError::NoPermits) => {}
        }

        if let Ok(slot) = self.queue_slots.clone().try_acquire_owned() {
            let workers = self.workers.clone();
            let root = self.root.clone();
            self.tracker.spawn(async move {
                let permit = tokio::select! {
                    permit = workers.acquire_owned() => permit.ok(),
                    // Run it anyway so the job can observe the cancellation and report it
                    _ = root.cancelled() => None,
                };
                drop(slot);
                let _permit = permit;
                job.await;
            });
            return Ok(Submission::Queued);
        }

        debug!(
            pool_size = self.pool_size,
            queue_capacity = self.queue_capacity,
            "pool and queue saturated, running job in caller"
        );
        let _counted = self.tracker.token();
        let _permit = self
            .workers
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| Error::ShuttingDown)?;
        job.await;
        Ok(Submission::RanInline)
    }

    /// Stop accepting work, wait up to `grace`, then cancel what is left
    pub async fn shutdown(&self, grace: Duration) {
        self.accepting.store(false, Ordering::SeqCst);
        self.tracker.close();
        info!(
            running = self.running(),
            queued = self.queued(),
            "worker pool stopped accepting jobs"
        );

        if tokio::time::timeout(grace, self.tracker.wait()).await.is_ok() {
            info!("all jobs completed gracefully");
            return;
        }

        warn!(
            grace_secs = grace.as_secs(),
            "timeout waiting for jobs, cancelling the rest"
        );
        self.root.cancel();
        if tokio::time::timeout(CANCEL_DRAIN_TIMEOUT, self.tracker.wait())
            .await
            .is_err()
        {
            warn!("cancelled jobs did not finish in time");
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct Gauge {
        current: AtomicUsize,
        max: AtomicUsize,
        finished: AtomicUsize,
    }

    fn gated_job(gauge: Arc<Gauge>, gate: CancellationToken) -> impl Future<Output = ()> {
        async move {
            let now = gauge.current.fetch_add(1, Ordering::SeqCst) + 1;
            gauge.max.fetch_max(now, Ordering::SeqCst);
            gate.cancelled().await;
            tokio::time::sleep(Duration::from_millis(10)).await;
            gauge.current.fetch_sub(1, Ordering::SeqCst);
            gauge.finished.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn non_positive_pool_size_falls_back_to_default() {
        for configured in [0, -1, i64::MIN] {
            let pool = WorkerPool::new(configured, 5);
            assert_eq!(pool.pool_size(), DEFAULT_POOL_SIZE, "configured {configured}");
        }
    }

    #[tokio::test]
    async fn overflow_runs_inline_without_exceeding_pool_size() {
        let pool = WorkerPool::new(2, 2);
        let gauge = Arc::new(Gauge::default());
        let gate = CancellationToken::new();

        let mut placements = Vec::new();
        for _ in 0..4 {
            placements.push(
                pool.submit(gated_job(gauge.clone(), gate.clone()))
                    .await
                    .unwrap(),
            );
        }
        assert_eq!(
            placements,
            vec![
                Submission::Started,
                Submission::Started,
                Submission::Queued,
                Submission::Queued
            ]
        );
        assert_eq!(pool.running(), 2);

        let opener = gate.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            opener.cancel();
        });

        let inline = pool
            .submit(gated_job(gauge.clone(), gate.clone()))
            .await
            .unwrap();
        assert_eq!(inline, Submission::RanInline);

        pool.shutdown(Duration::from_secs(5)).await;
        assert_eq!(gauge.finished.load(Ordering::SeqCst), 5);
        assert!(gauge.max.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn submissions_after_shutdown_are_rejected() {
        let pool = WorkerPool::new(1, 1);
        pool.shutdown(Duration::from_millis(10)).await;

        let result = pool.submit(async {}).await;
        assert!(matches!(result, Err(Error::ShuttingDown)));
    }

    #[tokio::test]
    async fn shutdown_cancels_jobs_that_outlive_the_grace_period() {
        let pool = WorkerPool::new(1, 0);
        let token = pool.child_token();
        let observed = Arc::new(AtomicBool::new(false));
        let flag = observed.clone();

        pool.submit(async move {
            token.cancelled().await;
            flag.store(true, Ordering::SeqCst);
        })
        .await
        .unwrap();

        pool.shutdown(Duration::from_millis(50)).await;
        assert!(observed.load(Ordering::SeqCst));
    }
}
