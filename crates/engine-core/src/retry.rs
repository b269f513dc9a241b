use std::{fmt, future::Future, time::Duration};
use tokio::time::sleep;
use tracing::warn;

/// What the retry loop does with a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDisposition {
    Retry,
    Stop,
}

/// Why a call under [`RetryPolicy::run`] gave up.
#[derive(Debug)]
pub enum RetryError<E> {
    /// Classified as not worth retrying; returned after the first attempt.
    Permanent(E),
    /// Every allowed attempt failed with a retryable error.
    Exhausted { attempts: usize, last: E },
}

impl<E> RetryError<E> {
    pub fn last_error(&self) -> &E {
        match self {
            RetryError::Permanent(err) | RetryError::Exhausted { last: err, .. } => err,
        }
    }

    pub fn attempts(&self) -> usize {
        match self {
            RetryError::Permanent(_) => 1,
            RetryError::Exhausted { attempts, .. } => *attempts,
        }
    }
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryError::Permanent(err) => write!(f, "{err}"),
            RetryError::Exhausted { attempts, last } => {
                write!(f, "{last} (gave up after {attempts} attempts)")
            }
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for RetryError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.last_error())
    }
}

/// Exponential backoff: `base_delay * 2^n`, capped at `max_delay`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(200), Duration::from_secs(5))
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: max_delay.max(base_delay),
        }
    }

    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO)
    }

    /// Calls `op` until it succeeds, `classify` says stop, or the attempts
    /// run out. Each retry is logged under `label`.
    pub async fn run<F, Fut, T, E, C>(
        &self,
        label: &str,
        mut op: F,
        classify: C,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
        C: Fn(&E) -> RetryDisposition,
    {
        let mut attempt = 1;
        loop {
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            if classify(&err) == RetryDisposition::Stop {
                return Err(RetryError::Permanent(err));
            }
            if attempt >= self.max_attempts {
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last: err,
                });
            }

            let delay = self.delay_before(attempt + 1);
            warn!(
                call = label,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Call failed, retrying"
            );
            sleep(delay).await;
            attempt += 1;
        }
    }

    /// Pause before the given attempt; attempt 2 waits `base_delay`.
    fn delay_before(&self, attempt: usize) -> Duration {
        let doublings = attempt.saturating_sub(2).min(16) as u32;
        self.base_delay
            .saturating_mul(2u32.pow(doublings))
            .min(self.max_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn backoff_doubles_up_to_cap() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100), Duration::from_millis(350));
        assert_eq!(policy.delay_before(2), Duration::from_millis(100));
        assert_eq!(policy.delay_before(3), Duration::from_millis(200));
        assert_eq!(policy.delay_before(4), Duration::from_millis(350));
        assert_eq!(RetryPolicy::no_retry().delay_before(2), Duration::ZERO);
    }

    #[tokio::test]
    async fn stops_after_max_attempts() {
        let calls = AtomicUsize::new(0);
        let policy = RetryPolicy::new(3, Duration::ZERO, Duration::ZERO);

        let result: Result<(), _> = policy
            .run(
                "flaky",
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err::<(), _>("boom".to_string()) }
                },
                |_| RetryDisposition::Retry,
            )
            .await;

        let err = result.unwrap_err();
        assert!(matches!(err, RetryError::Exhausted { attempts: 3, .. }));
        assert_eq!(err.to_string(), "boom (gave up after 3 attempts)");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let calls = AtomicUsize::new(0);
        let result: Result<(), _> = RetryPolicy::default()
            .run(
                "bad-request",
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err::<(), _>("bad request".to_string()) }
                },
                |_| RetryDisposition::Stop,
            )
            .await;

        let err = result.unwrap_err();
        assert!(matches!(err, RetryError::Permanent(_)));
        assert_eq!(err.attempts(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn recovers_once_the_error_clears() {
        let calls = AtomicUsize::new(0);
        let policy = RetryPolicy::new(4, Duration::from_millis(1), Duration::from_millis(2));
        let result = policy
            .run(
                "recovering",
                || {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    async move { if n < 2 { Err("busy".to_string()) } else { Ok(n) } }
                },
                |_| RetryDisposition::Retry,
            )
            .await;

        assert_eq!(result.unwrap(), 2);
    }
}
