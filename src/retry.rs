//! Attempt loop with fixed backoff and fallback on exhaustion
//!
//! A job gets at most `max_attempts` subprocess launches. Transient failures are
//! retried after a fixed delay; once a failed attempt used a proxy, the proxy is
//! dropped for the rest of the job. Terminal errors stop the loop immediately.
//!
//! # Example
//!
//! ```no_run
//! use social_dl::config::RetryConfig;
//! use social_dl::retry::{Outcome, run_with_retry};
//! use social_dl::types::FetchOptions;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() {
//! let config = RetryConfig::default();
//! let outcome = run_with_retry(
//!     &config,
//!     FetchOptions::default(),
//!     &CancellationToken::new(),
//!     |ctx| async move {
//!         // launch one subprocess with ctx.options
//!         Ok::<_, social_dl::Error>(ctx.number)
//!     },
//! )
//! .await;
//! assert!(matches!(outcome, Outcome::Succeeded(1)));
//! # }
//! ```

use crate::command::effective_proxy;
use crate::config::RetryConfig;
use crate::error::Error;
use crate::types::FetchOptions;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Trait for errors that can be classified as retryable or not
///
/// Failed or silent subprocesses are transient. Cancellation, missing tools and
/// rejected input are not: retrying them only repeats the same outcome.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::ProcessFailure { .. } | Error::ProcessTimeout { .. } => true,
            Error::Io(_) => true,
            Error::Network(e) => e.is_timeout() || e.is_connect(),
            Error::InvalidInput { .. }
            | Error::ToolUnavailable { .. }
            | Error::Interrupted
            | Error::ClientDisconnected
            | Error::FileNotFound(_)
            | Error::PreviewFailed { .. }
            | Error::Config { .. }
            | Error::Serialization(_)
            | Error::ShuttingDown
            | Error::ApiServerError(_) => false,
        }
    }
}

/// Inputs for one attempt
#[derive(Clone, Debug)]
pub struct AttemptContext {
    /// 1-based attempt number
    pub number: u32,
    /// Options for this attempt (proxy removed after a failed proxied attempt)
    pub options: FetchOptions,
}

/// How the attempt loop ended
#[derive(Debug)]
pub enum Outcome<T> {
    /// An attempt succeeded
    Succeeded(T),
    /// A non-retryable error stopped the loop
    Failed(Error),
    /// Every attempt failed with a retryable error; carries the last one
    Exhausted(Error),
}

/// Run `attempt` until it succeeds, fails terminally, or attempts run out
///
/// Cancellation during the backoff delay ends the loop with [`Error::Interrupted`].
pub async fn run_with_retry<F, Fut, T>(
    config: &RetryConfig,
    mut options: FetchOptions,
    cancel: &CancellationToken,
    mut attempt: F,
) -> Outcome<T>
where
    F: FnMut(AttemptContext) -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut number = 1;

    loop {
        let used_proxy = effective_proxy(&options).is_some() && options.cookies_path.is_none();
        let ctx = AttemptContext {
            number,
            options: options.clone(),
        };

        match attempt(ctx).await {
            Ok(value) => {
                if number > 1 {
                    tracing::info!(attempts = number, "attempt succeeded after retry");
                }
                return Outcome::Succeeded(value);
            }
            Err(e) if !e.is_retryable() => {
                tracing::warn!(error = %e, attempt = number, "attempt failed with non-retryable error");
                return Outcome::Failed(e);
            }
            Err(e) if number >= max_attempts => {
                tracing::warn!(
                    error = %e,
                    attempts = number,
                    "all attempts failed, falling back"
                );
                return Outcome::Exhausted(e);
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    attempt = number,
                    max_attempts,
                    delay_ms = config.backoff.as_millis(),
                    "attempt failed, retrying"
                );

                if used_proxy {
                    tracing::info!("dropping proxy for remaining attempts");
                    options.proxy = None;
                }

                let delay = if config.jitter {
                    add_jitter(config.backoff)
                } else {
                    config.backoff
                };
                tokio::select! {
                    _ = cancel.cancelled() => return Outcome::Failed(Error::Interrupted),
                    _ = tokio::time::sleep(delay) => {}
                }
                number += 1;
            }
        }
    }
}

/// Add random jitter to a delay to prevent thundering herd
///
/// The actual delay will be between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    let jittered_secs = delay.as_secs_f64() * (1.0 + jitter_factor);
    Duration::from_secs_f64(jittered_secs)
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Platform;
    use std::sync::{Arc, Mutex};

    fn fast_config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            backoff: Duration::from_millis(10),
            jitter: false,
        }
    }

    fn failure() -> Error {
        Error::ProcessFailure {
            exit_code: 1,
            tail: "ERROR".into(),
        }
    }

    fn proxied() -> FetchOptions {
        FetchOptions {
            proxy: Some("http://10.0.0.1:3128".into()),
            ..FetchOptions::default()
        }
    }

    #[tokio::test]
    async fn success_on_first_attempt_runs_once() {
        let calls = Arc::new(Mutex::new(0));
        let counter = calls.clone();

        let outcome = run_with_retry(
            &fast_config(3),
            FetchOptions::default(),
            &CancellationToken::new(),
            |_| {
                let counter = counter.clone();
                async move {
                    *counter.lock().unwrap() += 1;
                    Ok::<_, Error>(42)
                }
            },
        )
        .await;

        assert!(matches!(outcome, Outcome::Succeeded(42)));
        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn transient_failures_retry_then_succeed() {
        let outcome = run_with_retry(
            &fast_config(3),
            FetchOptions::default(),
            &CancellationToken::new(),
            |ctx| async move {
                if ctx.number < 3 {
                    Err(Error::ProcessTimeout {
                        after: Duration::from_secs(1),
                    })
                } else {
                    Ok(ctx.number)
                }
            },
        )
        .await;

        assert!(matches!(outcome, Outcome::Succeeded(3)));
    }

    #[tokio::test]
    async fn always_failing_attempts_exhaust_and_drop_the_proxy_once() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();

        let outcome = run_with_retry(&fast_config(3), proxied(), &CancellationToken::new(), |ctx| {
            let log = log.clone();
            async move {
                log.lock().unwrap().push(ctx.options.proxy.clone());
                Err::<(), _>(failure())
            }
        })
        .await;

        assert!(matches!(outcome, Outcome::Exhausted(Error::ProcessFailure { .. })));
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3, "exactly max_attempts launches");
        assert!(seen[0].is_some(), "first attempt uses the proxy");
        assert!(seen[1..].iter().all(Option::is_none), "proxy never restored");
    }

    #[tokio::test]
    async fn terminal_errors_stop_immediately() {
        for terminal in [
            Error::Interrupted,
            Error::tool_unavailable("yt-dlp"),
            Error::invalid_input(Platform::TikTok, "bad"),
        ] {
            let calls = Arc::new(Mutex::new(0));
            let counter = calls.clone();
            let mut pending = Some(terminal);

            let outcome = run_with_retry(
                &fast_config(3),
                FetchOptions::default(),
                &CancellationToken::new(),
                |_| {
                    *counter.lock().unwrap() += 1;
                    let err = pending.take().unwrap();
                    async move { Err::<(), _>(err) }
                },
            )
            .await;

            assert!(matches!(outcome, Outcome::Failed(_)));
            assert_eq!(*calls.lock().unwrap(), 1);
        }
    }

    #[tokio::test]
    async fn cancellation_during_backoff_interrupts() {
        let config = RetryConfig {
            max_attempts: 3,
            backoff: Duration::from_secs(30),
            jitter: false,
        };
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let outcome = run_with_retry(&config, FetchOptions::default(), &cancel, |_| async {
            Err::<(), _>(failure())
        })
        .await;

        assert!(matches!(outcome, Outcome::Failed(Error::Interrupted)));
    }

    #[test]
    fn retryable_classification() {
        assert!(failure().is_retryable());
        assert!(
            Error::Io(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe")).is_retryable()
        );
        assert!(!Error::Interrupted.is_retryable());
        assert!(!Error::ShuttingDown.is_retryable());
        assert!(!Error::FileNotFound("a.mp4".into()).is_retryable());
    }

    #[test]
    fn jitter_stays_within_double_the_delay() {
        let base = Duration::from_millis(100);
        for _ in 0..50 {
            let jittered = add_jitter(base);
            assert!(jittered >= base && jittered <= base * 2);
        }
    }
}
