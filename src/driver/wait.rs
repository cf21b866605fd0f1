//! Bounded wait-and-poll
//!
//! A wait checks a condition immediately, then every poll interval until
//! the condition holds or the timeout elapses. Running out of time is an
//! outcome, not an error: the caller decides whether it matters.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::common::{Error, Result};

/// Result of a bounded wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Condition observed after `elapsed`
    Ready { elapsed: Duration },
    /// Condition not observed within `timeout`
    TimedOut { timeout: Duration },
}

impl WaitOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }

    /// Turn a timeout into [`Error::WaitTimeout`] for callers that need the condition
    pub fn into_result(self, what: &str) -> Result<Duration> {
        match self {
            Self::Ready { elapsed } => Ok(elapsed),
            Self::TimedOut { timeout } => Err(Error::WaitTimeout {
                what: what.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            }),
        }
    }
}

/// Poll `condition` until it returns `true` or `timeout` elapses
///
/// The condition is always checked at least once, even with a zero timeout. Errors
/// from the condition end the wait immediately.
pub async fn wait_until<F, Fut>(
    timeout: Duration,
    poll_interval: Duration,
    mut condition: F,
) -> Result<WaitOutcome>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let start = Instant::now();
    let deadline = start + timeout;

    loop {
        if condition().await? {
            return Ok(WaitOutcome::Ready {
                elapsed: start.elapsed(),
            });
        }

        let now = Instant::now();
        if now >= deadline {
            return Ok(WaitOutcome::TimedOut { timeout });
        }

        // Never sleep past the deadline, but always check once more at it
        tokio::time::sleep(poll_interval.min(deadline - now)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[tokio::test]
    async fn test_ready_immediately() {
        let outcome = wait_until(Duration::from_millis(0), Duration::from_millis(10), || async {
            Ok(true)
        })
        .await
        .unwrap();
        assert!(outcome.is_ready());
    }

    #[tokio::test]
    async fn test_ready_after_some_polls() {
        let calls = Cell::new(0);
        let outcome = wait_until(Duration::from_secs(5), Duration::from_millis(1), || {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move { Ok(n >= 3) }
        })
        .await
        .unwrap();
        assert!(outcome.is_ready());
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn test_times_out_without_error() {
        let outcome = wait_until(Duration::from_millis(30), Duration::from_millis(5), || async {
            Ok(false)
        })
        .await
        .unwrap();
        assert_eq!(
            outcome,
            WaitOutcome::TimedOut {
                timeout: Duration::from_millis(30)
            }
        );
        let err = outcome.into_result("launcher").unwrap_err();
        assert_eq!(err.to_string(), "Timed out after 30 ms waiting for launcher");
    }

    #[tokio::test]
    async fn test_condition_error_stops_wait() {
        let calls = Cell::new(0);
        let result = wait_until(Duration::from_secs(5), Duration::from_millis(1), || {
            calls.set(calls.get() + 1);
            async { Err(Error::Device("adb went away".to_string())) }
        })
        .await;
        assert!(matches!(result, Err(Error::Device(_))));
        assert_eq!(calls.get(), 1);
    }
}
