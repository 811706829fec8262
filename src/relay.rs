//! Per-session live event channel
//!
//! The producing job holds a [`SessionRelay`]; the client side reads a
//! [`SessionStream`]. Sends never block and a vanished client never fails the job.
//! A hard ceiling closes the stream and cancels the job regardless of its state.

use crate::error::{Error, Result};
use crate::types::ProgressEvent;
use futures::Stream;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, Sleep};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, warn};

/// Open a relay whose session lasts at most `ceiling`
///
/// When the ceiling elapses before a terminal event, `job_cancel` is cancelled.
pub fn open(ceiling: Duration, job_cancel: CancellationToken) -> (SessionRelay, SessionStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    let deadline = Instant::now() + ceiling;

    let closed = CancellationToken::new();
    let watchdog_closed = closed.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = watchdog_closed.cancelled() => {}
            _ = tokio::time::sleep_until(deadline) => {
                warn!(ceiling_secs = ceiling.as_secs(), "session ceiling reached, cancelling job");
                job_cancel.cancel();
            }
        }
    });

    let relay = SessionRelay {
        tx: Some(tx),
        _watchdog: Some(closed.drop_guard()),
        disconnected: false,
    };
    let stream = SessionStream {
        rx,
        deadline: Box::pin(tokio::time::sleep_until(deadline)),
        done: false,
    };
    (relay, stream)
}

/// Producer half of a session
pub struct SessionRelay {
    tx: Option<mpsc::UnboundedSender<ProgressEvent>>,
    // Stops the ceiling watchdog once the session finishes or the relay drops
    _watchdog: Option<DropGuard>,
    disconnected: bool,
}

impl SessionRelay {
    /// Send an event, reporting a gone client as [`Error::ClientDisconnected`]
    ///
    /// Events after [`finish`](Self::finish) are dropped silently.
    pub fn try_forward(&mut self, event: ProgressEvent) -> Result<()> {
        let Some(tx) = &self.tx else {
            return Ok(());
        };
        tx.send(event).map_err(|_| Error::ClientDisconnected)
    }

    /// Send an event; a gone client is logged once and otherwise ignored
    pub fn forward(&mut self, event: ProgressEvent) {
        if let Err(e) = self.try_forward(event) {
            if !self.disconnected {
                debug!(error = %e, "client went away, continuing without it");
                self.disconnected = true;
            }
        }
    }

    /// Send the terminal event and close the session
    pub fn finish(&mut self, event: ProgressEvent) {
        if self.tx.is_none() {
            return;
        }
        self.forward(event);
        self.tx = None;
        self._watchdog = None;
    }

    /// Whether the client side is still reading
    pub fn is_connected(&self) -> bool {
        self.tx.as_ref().is_some_and(|tx| !tx.is_closed())
    }

    /// Whether a terminal event has been sent
    pub fn is_finished(&self) -> bool {
        self.tx.is_none()
    }
}

/// Consumer half of a session
///
/// Ends after a terminal event, at the ceiling, or when the producer drops.
pub struct SessionStream {
    rx: mpsc::UnboundedReceiver<ProgressEvent>,
    deadline: Pin<Box<Sleep>>,
    done: bool,
}

impl Stream for SessionStream {
    type Item = ProgressEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }
        if self.deadline.as_mut().poll(cx).is_ready() {
            self.done = true;
            self.rx.close();
            return Poll::Ready(None);
        }
        match self.rx.poll_recv(cx) {
            Poll::Ready(Some(event)) => {
                if event.is_terminal() {
                    self.done = true;
                    self.rx.close();
                }
                Poll::Ready(Some(event))
            }
            Poll::Ready(None) => {
                self.done = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn done() -> ProgressEvent {
        ProgressEvent::Done {
            file_path: "/tmp/x.mp4".into(),
        }
    }

    #[tokio::test]
    async fn events_arrive_in_order_and_stop_after_terminal() {
        let (mut relay, stream) = open(Duration::from_secs(60), CancellationToken::new());

        relay.forward(ProgressEvent::Progress { percent: 10 });
        relay.forward(ProgressEvent::Progress { percent: 20 });
        relay.finish(done());
        relay.forward(ProgressEvent::Progress { percent: 30 });
        relay.finish(ProgressEvent::Error {
            message: "late".into(),
        });

        let events: Vec<_> = stream.collect().await;
        assert_eq!(
            events,
            vec![
                ProgressEvent::Progress { percent: 10 },
                ProgressEvent::Progress { percent: 20 },
                done(),
            ]
        );
        assert!(relay.is_finished());
    }

    #[tokio::test]
    async fn dropped_client_does_not_fail_the_producer() {
        let (mut relay, stream) = open(Duration::from_secs(60), CancellationToken::new());
        drop(stream);

        assert!(!relay.is_connected());
        assert!(matches!(
            relay.try_forward(ProgressEvent::Progress { percent: 1 }),
            Err(Error::ClientDisconnected)
        ));
        relay.forward(ProgressEvent::Progress { percent: 2 });
        relay.finish(done());
        assert!(relay.is_finished());
    }

    #[tokio::test]
    async fn ceiling_closes_stream_and_cancels_job() {
        let job = CancellationToken::new();
        let (mut relay, mut stream) = open(Duration::from_millis(100), job.clone());

        relay.forward(ProgressEvent::Progress { percent: 5 });
        assert_eq!(
            stream.next().await,
            Some(ProgressEvent::Progress { percent: 5 })
        );
        assert_eq!(stream.next().await, None);

        tokio::time::timeout(Duration::from_secs(2), job.cancelled())
            .await
            .expect("job must be cancelled at the ceiling");
    }

    #[tokio::test]
    async fn finishing_before_the_ceiling_keeps_job_alive() {
        let job = CancellationToken::new();
        let (mut relay, stream) = open(Duration::from_millis(50), job.clone());

        relay.finish(done());
        let events: Vec<_> = stream.collect().await;
        assert_eq!(events.len(), 1);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(!job.is_cancelled());
    }

    #[tokio::test]
    async fn producer_drop_ends_the_stream() {
        let (relay, stream) = open(Duration::from_secs(60), CancellationToken::new());
        drop(relay);

        let events: Vec<_> = stream.collect().await;
        assert!(events.is_empty());
    }
}
