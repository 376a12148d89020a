//! Bounded polling for reads that may lag a preceding write.
//!
//! The order store may serve reads from replicas. A [`RetryPolicy`] is a
//! schedule of delays; [`RetryPolicy::poll`] sleeps for each delay in turn
//! and runs one lookup after it, stopping at the first hit. Exhausting the
//! schedule is not an error: the caller decides what a miss means.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

/// A schedule of delays, one lookup attempt per delay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    delays: Vec<Duration>,
}

impl RetryPolicy {
    /// One attempt per delay; the first delay precedes the first attempt.
    #[must_use]
    pub fn from_delays(delays: impl IntoIterator<Item = Duration>) -> Self {
        Self {
            delays: delays.into_iter().collect(),
        }
    }

    /// `attempts` tries with `delay` between consecutive tries and none
    /// before the first.
    #[must_use]
    pub fn fixed(attempts: usize, delay: Duration) -> Self {
        Self::from_delays(
            (0..attempts).map(|i| if i == 0 { Duration::ZERO } else { delay }),
        )
    }

    /// Number of attempts the schedule allows.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.delays.len()
    }

    /// The delay preceding each attempt.
    #[must_use]
    pub fn delays(&self) -> &[Duration] {
        &self.delays
    }

    /// Run `lookup` until it yields `Some`, sleeping per the schedule.
    ///
    /// Returns the hit and the 1-based attempt it came from, or `None` once
    /// every attempt has missed. Lookup errors count as misses.
    pub async fn poll<T, E, F, Fut>(&self, mut lookup: F) -> Option<(T, usize)>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>, E>>,
        E: std::fmt::Display,
    {
        for (index, delay) in self.delays.iter().enumerate() {
            let attempt = index + 1;
            if !delay.is_zero() {
                tokio::time::sleep(*delay).await;
            }
            match lookup().await {
                Ok(Some(found)) => return Some((found, attempt)),
                Ok(None) => debug!(attempt, "lookup missed"),
                Err(e) => debug!(attempt, error = %e, "lookup failed"),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::time::Instant;

    use super::*;

    #[test]
    fn test_fixed_schedule() {
        let policy = RetryPolicy::fixed(3, Duration::from_millis(500));
        assert_eq!(
            policy.delays(),
            &[
                Duration::ZERO,
                Duration::from_millis(500),
                Duration::from_millis(500)
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_stops_at_first_hit() {
        let calls = AtomicUsize::new(0);
        let policy = RetryPolicy::fixed(5, Duration::from_millis(100));

        let result = policy
            .poll(|| async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                Ok::<_, String>((n == 2).then_some("found"))
            })
            .await;

        assert_eq!(result, Some(("found", 2)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_sleeps_full_schedule_on_miss() {
        let policy = RetryPolicy::from_delays(
            [0, 500, 1000, 1500, 2000].map(Duration::from_millis),
        );
        let start = Instant::now();

        let result: Option<((), usize)> = policy
            .poll(|| async { Err::<Option<()>, _>("replica unavailable") })
            .await;

        assert!(result.is_none());
        assert_eq!(start.elapsed(), Duration::from_millis(5000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_attempt_is_immediate() {
        let start = Instant::now();
        let result = RetryPolicy::fixed(3, Duration::from_secs(1))
            .poll(|| async { Ok::<_, String>(Some(7)) })
            .await;
        assert_eq!(result, Some((7, 1)));
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
