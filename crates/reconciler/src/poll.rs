//! Polling a remote resource until it reaches a terminal state.
//!
//! Every wait on the remote system goes through [`poll_until`]. A poll fetches
//! immediately, classifies the observation, and sleeps a fixed interval between
//! attempts until the observation is terminal or the deadline passes. Waits can
//! be cut short with a [`CancellationToken`]; an in-flight fetch is always
//! allowed to finish first.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// How often and for how long to poll.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PollOptions {
    /// Delay between attempts.
    pub interval: Duration,

    /// Give up once this much time has passed since the first attempt.
    pub timeout: Duration,
}

impl PollOptions {
    /// Create poll options.
    #[must_use]
    pub const fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }
}

/// Classification of one poll observation.
#[derive(Debug)]
pub enum Poll<T> {
    /// Terminal success; stop polling and return the value.
    Ready(T),

    /// Not terminal yet. Carries a short description of what was observed.
    Pending(String),

    /// Terminal failure; stop polling and return the error.
    Failed(Error),
}

/// Identifies what a poll is waiting for, for logs and errors.
#[derive(Clone, Copy, Debug)]
pub struct PollTarget<'a> {
    /// Operation being waited on, e.g. "creation".
    pub operation: &'a str,

    /// Resource being polled, e.g. "service svc-1".
    pub resource: &'a str,
}

/// Repeatedly `fetch` and `classify` until the classification is terminal.
///
/// The first fetch happens immediately. Returns
/// [`Error::ConvergenceTimeout`] with the last observation once
/// `options.timeout` has elapsed, and [`Error::Cancelled`] if `cancel` fires
/// while sleeping between attempts.
pub async fn poll_until<T, O, F, Fut, K>(
    target: PollTarget<'_>,
    options: &PollOptions,
    cancel: &CancellationToken,
    mut fetch: F,
    mut classify: K,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = O>,
    K: FnMut(O) -> Poll<T>,
{
    let started = Instant::now();
    let deadline = started + options.timeout;
    let mut attempt = 0u32;

    loop {
        if cancel.is_cancelled() {
            return Err(cancelled(target));
        }

        attempt += 1;
        let last_observed = match classify(fetch().await) {
            Poll::Ready(value) => {
                info!(
                    "{} of {} converged after {} attempt(s)",
                    target.operation, target.resource, attempt
                );
                return Ok(value);
            }
            Poll::Failed(error) => return Err(error),
            Poll::Pending(observed) => observed,
        };

        let now = Instant::now();
        if now >= deadline {
            return Err(Error::ConvergenceTimeout {
                operation: target.operation.to_string(),
                resource: target.resource.to_string(),
                waited: now - started,
                last_observed,
            });
        }

        let wait = options.interval.min(deadline - now);
        debug!(
            "waiting for {} of {} (attempt {}): {}; next check in {:?}",
            target.operation, target.resource, attempt, last_observed, wait
        );

        tokio::select! {
            () = cancel.cancelled() => return Err(cancelled(target)),
            () = tokio::time::sleep(wait) => {}
        }
    }
}

fn cancelled(target: PollTarget<'_>) -> Error {
    Error::Cancelled {
        operation: target.operation.to_string(),
        resource: target.resource.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::error::ErrorKind;

    const TARGET: PollTarget<'static> = PollTarget {
        operation: "creation",
        resource: "service svc-1",
    };

    fn options(interval: u64, timeout: u64) -> PollOptions {
        PollOptions::new(Duration::from_secs(interval), Duration::from_secs(timeout))
    }

    fn counting() -> (Arc<AtomicU32>, impl FnMut() -> std::future::Ready<u32>) {
        let count = Arc::new(AtomicU32::new(0));
        let c = count.clone();
        (count, move || {
            std::future::ready(c.fetch_add(1, Ordering::SeqCst) + 1)
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_on_first_fetch_does_not_sleep() {
        let (count, fetch) = counting();
        let started = Instant::now();

        let value = poll_until(TARGET, &options(10, 60), &CancellationToken::new(), fetch, Poll::Ready)
            .await
            .unwrap();

        assert_eq!(value, 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(Instant::now(), started);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_then_ready_sleeps_one_interval() {
        let (count, fetch) = counting();
        let started = Instant::now();

        let value = poll_until(TARGET, &options(2, 60), &CancellationToken::new(), fetch, |n| {
            if n < 2 {
                Poll::Pending(format!("attempt {n}"))
            } else {
                Poll::Ready(n)
            }
        })
        .await
        .unwrap();

        assert_eq!(value, 2);
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(Instant::now() - started, Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_reports_last_observation() {
        let (count, fetch) = counting();

        let error = poll_until(TARGET, &options(10, 25), &CancellationToken::new(), fetch, |n| {
            Poll::<u32>::Pending(format!("status pending_create ({n})"))
        })
        .await
        .unwrap_err();

        // Fetches at 0s, 10s, 20s and a final one at the 25s deadline.
        assert_eq!(count.load(Ordering::SeqCst), 4);
        assert_eq!(error.kind(), ErrorKind::ConvergenceTimeout);
        match error {
            Error::ConvergenceTimeout {
                waited,
                last_observed,
                ..
            } => {
                assert_eq!(waited, Duration::from_secs(25));
                assert_eq!(last_observed, "status pending_create (4)");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_classification_stops_immediately() {
        let (count, fetch) = counting();

        let error = poll_until(TARGET, &options(1, 60), &CancellationToken::new(), fetch, |_| {
            Poll::<u32>::Failed(Error::precondition("status", "is failed"))
        })
        .await
        .unwrap_err();

        assert_eq!(error.kind(), ErrorKind::Validation);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_sleep_returns_cancelled() {
        let (count, fetch) = counting();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(15)).await;
            trigger.cancel();
        });

        let error = poll_until(TARGET, &options(10, 600), &cancel, fetch, |_| {
            Poll::<u32>::Pending("pending".to_string())
        })
        .await
        .unwrap_err();

        assert_eq!(error.kind(), ErrorKind::Cancelled);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_already_cancelled_does_not_fetch() {
        let (count, fetch) = counting();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let error = poll_until(TARGET, &options(1, 60), &cancel, fetch, Poll::Ready)
            .await
            .unwrap_err();

        assert_eq!(error.kind(), ErrorKind::Cancelled);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
