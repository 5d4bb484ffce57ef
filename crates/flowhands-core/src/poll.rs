//! The single polling primitive shared by every wait point.
//!
//! Upload slot discovery, upload confirmation, project creation and
//! generation completion all wait through [`poll`], so their interval and
//! bound come from configuration instead of literals at the call site.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

/// Interval and hard upper bound of a wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_wait: Duration,
}

impl PollPolicy {
    pub fn new(interval: Duration, max_wait: Duration) -> Self {
        Self { interval, max_wait }
    }

    /// At most `attempts` probes, `interval` apart, the first one immediate.
    /// Zero attempts still probes once.
    pub fn attempts(interval: Duration, attempts: u32) -> Self {
        Self {
            interval,
            max_wait: interval * attempts.saturating_sub(1),
        }
    }
}

/// Probe until it yields a value or the bound is reached.
///
/// The bound is enforced by comparing elapsed wall-clock time; a probe that
/// is already running is never cancelled. Returns `Ok(None)` when the bound
/// is exhausted and propagates the first probe error.
pub async fn poll<T, E, F, Fut>(policy: PollPolicy, mut probe: F) -> Result<Option<T>, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
{
    let start = Instant::now();
    loop {
        if let Some(value) = probe().await? {
            return Ok(Some(value));
        }
        if policy.interval.is_zero() || start.elapsed() + policy.interval > policy.max_wait {
            return Ok(None);
        }
        tokio::time::sleep(policy.interval).await;
    }
}

/// [`poll`] for probes that cannot fail.
pub async fn poll_until<T, F, Fut>(policy: PollPolicy, mut probe: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let result: Result<Option<T>, std::convert::Infallible> =
        poll(policy, || {
            let fut = probe();
            async move { Ok(fut.await) }
        })
        .await;
    match result {
        Ok(value) => value,
        Err(never) => match never {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_poll_ready_immediately() {
        let policy = PollPolicy::attempts(Duration::from_secs(1), 5);
        let start = Instant::now();
        let value = poll_until(policy, || async { Some(7) }).await;
        assert_eq!(value, Some(7));
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_ready_after_some_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = PollPolicy::attempts(Duration::from_secs(1), 20);
        let start = Instant::now();

        let value = poll_until(policy, || {
            let calls = calls.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                (n == 3).then_some(n)
            }
        })
        .await;

        assert_eq!(value, Some(3));
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempts_bound_the_probe_count() {
        for (attempts, expected) in [(20, 20), (1, 1), (0, 1)] {
            let calls = Arc::new(AtomicU32::new(0));
            let policy = PollPolicy::attempts(Duration::from_secs(1), attempts);
            let start = Instant::now();

            let value: Option<()> = poll_until(policy, || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    None
                }
            })
            .await;

            assert!(value.is_none());
            assert_eq!(calls.load(Ordering::SeqCst), expected);
            assert_eq!(start.elapsed(), Duration::from_secs(u64::from(expected - 1)));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_exhausts_at_bound() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = PollPolicy::new(Duration::from_secs(2), Duration::from_secs(10));
        let start = Instant::now();

        let value: Option<()> = poll_until(policy, || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                None
            }
        })
        .await;

        assert!(value.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 6);
        assert_eq!(start.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_propagates_probe_error() {
        let policy = PollPolicy::attempts(Duration::from_secs(1), 3);
        let result: Result<Option<u8>, &str> = poll(policy, || async { Err("boom") }).await;
        assert_eq!(result, Err("boom"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_zero_interval_probes_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = PollPolicy::attempts(Duration::ZERO, 10);
        let value: Option<()> = poll_until(policy, || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                None
            }
        })
        .await;
        assert!(value.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
