//! Retry with capped exponential backoff

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use super::errors::{BackendError, RetryExhausted};

/// How often and how patiently a backend call is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay: max_delay.max(base_delay),
        }
    }

    /// Single attempt, no retries
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO, Duration::ZERO)
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Retries plus the first attempt
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Upper bound of the wait before retry number `retry` (1-based):
    /// `base * 2^(retry-1)`, capped at `max_delay`.
    pub fn ceiling_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Wait before retry number `retry`: uniformly between half the
    /// ceiling and the ceiling.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let ceiling = self.ceiling_for(retry);
        let floor = ceiling / 2;
        let spread = (ceiling - floor).as_millis() as u64;
        let jitter = rand::thread_rng().gen_range(0..=spread);
        floor + Duration::from_millis(jitter)
    }
}

/// Runs `op` until it succeeds, fails with a non-retryable error, or the
/// policy runs out of retries. `on_retry` sees each failure that will be
/// retried, with the number of the upcoming retry.
pub async fn retry<T, F, Fut, R>(policy: &RetryPolicy, mut op: F, mut on_retry: R) -> Result<T, RetryExhausted>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BackendError>>,
    R: FnMut(u32, &BackendError),
{
    let mut attempts = 0;
    loop {
        attempts += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                if !error.is_retryable() || attempts >= policy.max_attempts() {
                    return Err(RetryExhausted { error, attempts });
                }
                on_retry(attempts, &error);
                tokio::time::sleep(policy.delay_for(attempts)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(max_retries, Duration::from_millis(100), Duration::from_millis(1000))
    }

    #[test]
    fn test_ceiling_doubles_and_caps() {
        let p = policy(10);
        assert_eq!(p.ceiling_for(1), Duration::from_millis(100));
        assert_eq!(p.ceiling_for(2), Duration::from_millis(200));
        assert_eq!(p.ceiling_for(4), Duration::from_millis(800));
        assert_eq!(p.ceiling_for(5), Duration::from_millis(1000));
        assert_eq!(p.ceiling_for(40), Duration::from_millis(1000));
    }

    #[test]
    fn test_delay_within_bounds() {
        let p = policy(10);
        for retry in 1..8 {
            let delay = p.delay_for(retry);
            assert!(delay <= p.ceiling_for(retry));
            assert!(delay >= p.ceiling_for(retry) / 2);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_until_success() {
        let calls = AtomicU32::new(0);
        let mut retries = Vec::new();

        let result = retry(
            &policy(3),
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(BackendError::Unavailable("down".into()))
                    } else {
                        Ok(n)
                    }
                }
            },
            |retry, _| retries.push(retry),
        )
        .await;

        assert_eq!(result, Ok(2));
        assert_eq!(retries, vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_exhausted() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry(
            &policy(2),
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(BackendError::Timeout("slow".into())) }
            },
            |_, _| {},
        )
        .await;

        assert_eq!(result.unwrap_err().attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_rejection_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry(
            &policy(5),
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(BackendError::Rejected("bad mapping".into())) }
            },
            |_, _| {},
        )
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.attempts, 1);
        assert!(matches!(err.error, BackendError::Rejected(_)));
    }
}
