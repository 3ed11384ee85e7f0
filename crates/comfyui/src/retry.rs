//! Retry policy for engine and vision-model calls.
//!
//! A [`RetryPolicy`] is a plain value: attempt budget plus a backoff
//! function. [`retry`] drives an async operation under a policy and
//! sleeps with `tokio::time`, so tests can run it on a paused clock.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

/// Attempt budget and backoff parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Always at least 1.
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    pub initial_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
    /// Factor by which the delay grows after each failure (1.0 = fixed).
    pub multiplier: f64,
    /// Upper bound of uniform random jitter added to each delay.
    pub jitter: Duration,
}

impl RetryPolicy {
    /// Same delay between every attempt.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay: delay,
            max_delay: delay,
            multiplier: 1.0,
            jitter: Duration::ZERO,
        }
    }

    /// Doubling delay starting at `base`, with up to one second of jitter.
    pub fn exponential(max_attempts: u32, base: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay: base,
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: Duration::from_secs(1),
        }
    }

    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Backoff (without jitter) after failed attempt `attempt` (1-based).
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let mut delay = self.initial_delay;
        for _ in 1..attempt {
            delay = self.grow(delay);
        }
        delay
    }

    /// Scale `current` by the multiplier, capped at `max_delay`.
    ///
    /// Upload retries use a multiplier of 1.0 and keep `current`; the
    /// vision-model policy doubles it up to its 30 second ceiling.
    fn grow(&self, current: Duration) -> Duration {
        current.mul_f64(self.multiplier).min(self.max_delay)
    }

    /// Backoff after failed attempt `attempt`, jitter included.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        if self.jitter.is_zero() {
            return base;
        }
        let jitter_ms = rand::rng().random_range(0..=self.jitter.as_millis() as u64);
        base + Duration::from_millis(jitter_ms)
    }
}

impl Default for RetryPolicy {
    /// Three attempts, two seconds apart.
    fn default() -> Self {
        Self::fixed(3, Duration::from_secs(2))
    }
}

/// The last error after the attempt budget ran out.
#[derive(Debug)]
pub struct Exhausted<E> {
    pub attempts: u32,
    pub last_error: E,
}

/// Run `operation` until it succeeds or the policy's attempts are used up.
///
/// Each failure is logged at warn with `label`; no sleep follows the last
/// attempt.
pub async fn retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut operation: F,
) -> Result<T, Exhausted<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 1u32;

    loop {
        match operation(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(operation = label, attempt, "Succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if attempt >= policy.max_attempts => {
                tracing::error!(
                    operation = label,
                    attempts = attempt,
                    error = %e,
                    "All attempts failed",
                );
                return Err(Exhausted {
                    attempts: attempt,
                    last_error: e,
                });
            }
            Err(e) => {
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    operation = label,
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Attempt failed, retrying",
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn fixed_policy_never_grows() {
        let policy = RetryPolicy::fixed(3, Duration::from_secs(2));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(5), Duration::from_secs(2));
    }

    #[test]
    fn exponential_base_doubles() {
        let policy = RetryPolicy::exponential(3, Duration::from_secs(1));
        assert_eq!(policy.base_delay(1), Duration::from_secs(1));
        assert_eq!(policy.base_delay(2), Duration::from_secs(2));
        assert_eq!(policy.base_delay(3), Duration::from_secs(4));
    }

    #[test]
    fn exponential_jitter_is_bounded() {
        let policy = RetryPolicy::exponential(3, Duration::from_secs(1));
        for _ in 0..50 {
            let d = policy.delay_for(2);
            assert!(d >= Duration::from_secs(2));
            assert!(d <= Duration::from_secs(3));
        }
    }

    #[test]
    fn exponential_growth_stops_at_the_ceiling() {
        let policy = RetryPolicy {
            max_delay: Duration::from_secs(10),
            ..RetryPolicy::exponential(8, Duration::from_secs(1))
        };
        let delays: Vec<u64> = (1..=6).map(|n| policy.base_delay(n).as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 10, 10]);
    }

    #[test]
    fn fixed_growth_keeps_sub_second_delays() {
        let policy = RetryPolicy::fixed(4, Duration::from_millis(250));
        assert_eq!(policy.base_delay(4), Duration::from_millis(250));
    }

    #[test]
    fn zero_attempts_becomes_one() {
        assert_eq!(RetryPolicy::fixed(0, Duration::ZERO).max_attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_third_attempt_after_two_delays() {
        let policy = RetryPolicy::fixed(3, Duration::from_secs(2));
        let calls = AtomicU32::new(0);
        let start = tokio::time::Instant::now();

        let result = retry(&policy, "upload", |_| {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 3 {
                    Err(format!("boom {n}"))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_reports_last_error_without_trailing_sleep() {
        let policy = RetryPolicy::fixed(3, Duration::from_secs(2));
        let start = tokio::time::Instant::now();

        let result: Result<(), _> =
            retry(&policy, "upload", |attempt| async move { Err(format!("fail {attempt}")) }).await;

        let exhausted = result.unwrap_err();
        assert_eq!(exhausted.attempts, 3);
        assert_eq!(exhausted.last_error, "fail 3");
        assert_eq!(start.elapsed(), Duration::from_secs(4));
    }
}
