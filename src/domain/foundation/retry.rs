//! Bounded retry-poll for eventually-consistent lookups.
//!
//! A writer we do not coordinate with (another webhook delivery) may not have
//! committed yet when we look for its row. [`poll_until_found`] re-runs the
//! lookup a fixed number of times with a fixed delay and reports `None` when
//! the budget runs out, so the caller decides what "not there" means.

use std::future::Future;
use std::time::Duration;

use tokio_retry::strategy::FixedInterval;
use tokio_retry::RetryIf;

/// Attempts and delay for a bounded poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of lookups, including the first one.
    pub max_attempts: u32,
    /// Sleep between two consecutive lookups.
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Worst-case wall-clock time spent sleeping.
    pub fn max_wait(&self) -> Duration {
        self.delay * self.max_attempts.saturating_sub(1)
    }
}

impl Default for RetryPolicy {
    /// 5 attempts, 1 second apart.
    fn default() -> Self {
        Self::new(5, Duration::from_secs(1))
    }
}

enum PollOutcome<E> {
    Pending,
    Failed(E),
}

/// Runs `lookup` until it yields `Some`, at most `policy.max_attempts` times.
///
/// Returns `Ok(None)` when every attempt came back empty. A lookup error is
/// returned immediately and is never retried here.
pub async fn poll_until_found<T, E, F, Fut>(
    policy: &RetryPolicy,
    mut lookup: F,
) -> Result<Option<T>, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
{
    let retries = policy.max_attempts.saturating_sub(1) as usize;
    let strategy = FixedInterval::new(policy.delay).take(retries);
    let mut attempt: u32 = 0;

    let action = || {
        attempt += 1;
        let current = attempt;
        let pending = lookup();
        async move {
            match pending.await {
                Ok(Some(found)) => Ok(found),
                Ok(None) => {
                    tracing::debug!(attempt = current, "Lookup returned nothing yet");
                    Err(PollOutcome::Pending)
                }
                Err(e) => Err(PollOutcome::Failed(e)),
            }
        }
    };

    let outcome = RetryIf::start(strategy, action, |e: &PollOutcome<E>| {
        matches!(e, PollOutcome::Pending)
    })
    .await;

    match outcome {
        Ok(found) => Ok(Some(found)),
        Err(PollOutcome::Pending) => Ok(None),
        Err(PollOutcome::Failed(e)) => Err(e),
    }
}
