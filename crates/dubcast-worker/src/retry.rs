//! Retry utilities with exponential backoff.
//!
//! [`BackoffPolicy::delay`] is a pure function of the attempt number, so the
//! schedule can be tested without sleeping; [`retry_async`] applies it to
//! any fallible async operation.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::metrics;

/// Exponential backoff: `base * 2^attempt`, capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    base: Duration,
    max: Duration,
    max_retries: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(5),
            max: Duration::from_secs(80),
            max_retries: 4,
        }
    }
}

impl BackoffPolicy {
    pub fn new(base: Duration, max: Duration, max_retries: u32) -> Self {
        Self {
            base,
            max: max.max(base),
            max_retries,
        }
    }

    /// Retries allowed after the first attempt.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Wait before retrying after the `attempt`-th failure (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.max)
    }
}

/// Result of a retry operation.
#[derive(Debug)]
pub enum RetryResult<T, E> {
    Success { value: T, attempts: u32 },
    Failed { error: E, attempts: u32 },
}

impl<T, E> RetryResult<T, E> {
    pub fn is_success(&self) -> bool {
        matches!(self, RetryResult::Success { .. })
    }

    /// Attempts made, including the first.
    pub fn attempts(&self) -> u32 {
        match self {
            RetryResult::Success { attempts, .. } | RetryResult::Failed { attempts, .. } => {
                *attempts
            }
        }
    }

    pub fn into_result(self) -> Result<T, E> {
        match self {
            RetryResult::Success { value, .. } => Ok(value),
            RetryResult::Failed { error, .. } => Err(error),
        }
    }
}

/// Run `operation` until it succeeds, `should_retry` rejects its error, or
/// the policy's retries are used up.
pub async fn retry_async<F, Fut, T, E, P>(
    policy: &BackoffPolicy,
    operation_name: &str,
    should_retry: P,
    mut operation: F,
) -> RetryResult<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut attempt = 0u32;

    loop {
        match operation().await {
            Ok(value) => {
                return RetryResult::Success {
                    value,
                    attempts: attempt + 1,
                }
            }
            Err(e) if attempt < policy.max_retries && should_retry(&e) => {
                let delay = policy.delay(attempt);
                attempt += 1;
                metrics::record_retry(operation_name);
                debug!(
                    operation = operation_name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Retrying after failure"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                if attempt > 0 {
                    warn!(
                        operation = operation_name,
                        attempts = attempt + 1,
                        error = %e,
                        "Giving up after retries"
                    );
                }
                return RetryResult::Failed {
                    error: e,
                    attempts: attempt + 1,
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast(max_retries: u32) -> BackoffPolicy {
        BackoffPolicy::new(Duration::from_millis(1), Duration::from_millis(4), max_retries)
    }

    #[test]
    fn test_delay_doubles_and_caps() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay(0), Duration::from_secs(5));
        assert_eq!(policy.delay(1), Duration::from_secs(10));
        assert_eq!(policy.delay(3), Duration::from_secs(40));
        assert_eq!(policy.delay(4), Duration::from_secs(80));
        assert_eq!(policy.delay(10), Duration::from_secs(80));
        assert_eq!(policy.delay(40), Duration::from_secs(80));
    }

    #[tokio::test]
    async fn test_k_failures_take_k_plus_one_attempts() {
        for k in 0..4u32 {
            let calls = Arc::new(AtomicU32::new(0));
            let counter = calls.clone();

            let result = retry_async(&fast(4), "flaky", |_: &String| true, || {
                let counter = counter.clone();
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst);
                    if n < k {
                        Err(format!("failure {}", n))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

            assert!(result.is_success());
            assert_eq!(result.attempts(), k + 1);
            assert_eq!(calls.load(Ordering::SeqCst), k + 1);
        }
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: RetryResult<(), String> =
            retry_async(&fast(2), "always_fails", |_| true, || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err("nope".to_string()) }
            })
            .await;

        assert_eq!(result.attempts(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(result.into_result().unwrap_err(), "nope");
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: RetryResult<(), String> =
            retry_async(&fast(5), "permanent", |e: &String| e != "fatal", || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err("fatal".to_string()) }
            })
            .await;

        assert_eq!(result.attempts(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
