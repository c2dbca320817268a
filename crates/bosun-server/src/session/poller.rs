//! Recurring telemetry poller.
//!
//! Runs an async snapshot function once immediately and then on a fixed
//! interval, pushing each serialized frame into the owning session's
//! outbound channel. A failed tick is logged and skipped; only `stop` (or
//! dropping the poller) ends the loop.

use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use bosun_core::BosunResult;

/// Handle to one running poll loop. Each session owns its own poller;
/// snapshots are never shared between sessions of the same kind.
pub struct Poller {
    cancel: CancellationToken,
}

impl Poller {
    /// Start polling. The first snapshot fires immediately, then every
    /// `interval` until [`Poller::stop`] or the receiver side goes away.
    pub fn start<F, Fut>(
        name: &'static str,
        interval: Duration,
        tx: mpsc::Sender<String>,
        snapshot: F,
    ) -> Self
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = BosunResult<String>> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        tokio::spawn(async move {
            // The first tick of a tokio interval completes at once.
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => match snapshot().await {
                        Ok(frame) => {
                            if tx.send(frame).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            warn!(poller = name, error = %e, "snapshot failed, tick skipped");
                        }
                    },
                }
            }
        });

        Self { cancel }
    }

    /// Cancel the recurring timer. Idempotent.
    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bosun_core::BosunError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn fires_immediately_then_on_interval() {
        let (tx, mut rx) = mpsc::channel(16);
        let counter = Arc::new(AtomicUsize::new(0));
        let ticks = counter.clone();
        let poller = Poller::start("test", Duration::from_secs(2), tx, move || {
            let n = ticks.fetch_add(1, Ordering::SeqCst);
            async move { Ok(format!("tick-{n}")) }
        });

        assert_eq!(rx.recv().await.unwrap(), "tick-0");
        assert_eq!(rx.recv().await.unwrap(), "tick-1");
        assert_eq!(rx.recv().await.unwrap(), "tick-2");
        poller.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn failed_tick_is_skipped_not_fatal() {
        let (tx, mut rx) = mpsc::channel(16);
        let counter = Arc::new(AtomicUsize::new(0));
        let ticks = counter.clone();
        let poller = Poller::start("test", Duration::from_secs(2), tx, move || {
            let n = ticks.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 1 {
                    Err(BosunError::Snapshot("flaky".into()))
                } else {
                    Ok(format!("tick-{n}"))
                }
            }
        });

        assert_eq!(rx.recv().await.unwrap(), "tick-0");
        // tick-1 failed and was skipped; the loop carries on
        assert_eq!(rx.recv().await.unwrap(), "tick-2");
        poller.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent_and_ends_the_stream() {
        let (tx, mut rx) = mpsc::channel(16);
        let poller = Poller::start("test", Duration::from_secs(2), tx, || async {
            Ok("tick".to_string())
        });

        assert_eq!(rx.recv().await.unwrap(), "tick");
        poller.stop();
        poller.stop();
        // Sender side dropped once the task observes cancellation.
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn drop_cancels_the_timer() {
        let (tx, mut rx) = mpsc::channel(16);
        let poller = Poller::start("test", Duration::from_secs(2), tx, || async {
            Ok("tick".to_string())
        });
        assert_eq!(rx.recv().await.unwrap(), "tick");
        drop(poller);
        assert!(rx.recv().await.is_none());
    }
}
