//! Bounded fixed-delay retry for session refresh.

use super::error::AuthError;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Default number of attempts, the first one included.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default pause between attempts (milliseconds).
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1_000;

/// Retry policy for credential renewal.
///
/// Transient errors are retried after a fixed delay until `max_attempts`
/// calls have been made. Terminal errors end the loop on the spot.
///
/// ```
/// use flowdo::auth::RetryPolicy;
///
/// let policy = RetryPolicy::default();
/// assert_eq!(policy.max_attempts, 3);
/// assert_eq!(policy.delay_ms, 1000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first (0 is treated as 1).
    pub max_attempts: u32,
    /// Fixed delay between attempts in milliseconds.
    pub delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay_ms: DEFAULT_RETRY_DELAY_MS,
        }
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Run `op` until it succeeds, fails terminally, or attempts run out.
    ///
    /// A terminal error is returned as-is. Running out of attempts yields
    /// [`AuthError::RetriesExhausted`] wrapping the last transient error.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, AuthError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AuthError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1u32;

        loop {
            match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(attempt, "refresh succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) if !error.is_retryable() => {
                    debug!(attempt, code = error.code(), "terminal refresh error, not retrying");
                    return Err(error);
                }
                Err(error) if attempt >= max_attempts => {
                    warn!(attempts = attempt, error = %error, "refresh retries exhausted");
                    return Err(AuthError::RetriesExhausted {
                        attempts: attempt,
                        last: Box::new(error),
                    });
                }
                Err(error) => {
                    warn!(
                        attempt,
                        max_attempts,
                        delay_ms = self.delay_ms,
                        error = %error,
                        "transient refresh error, retrying"
                    );
                }
            }

            attempt = attempt.saturating_add(1);
            tokio::time::sleep(self.delay()).await;
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn counting_op(
        calls: &Arc<AtomicU32>,
        outcome: impl Fn(u32) -> Result<u32, AuthError>,
    ) -> impl FnMut() -> std::pin::Pin<Box<dyn Future<Output = Result<u32, AuthError>> + Send>>
    {
        let calls = Arc::clone(calls);
        move || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            let result = outcome(n);
            Box::pin(async move { result })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn success_on_first_attempt_does_not_sleep() {
        let calls = Arc::new(AtomicU32::new(0));
        let start = tokio::time::Instant::now();
        let result = RetryPolicy::default()
            .run(counting_op(&calls, |n| Ok(n)))
            .await;
        assert_eq!(result.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn unauthorized_is_never_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let result = RetryPolicy::default()
            .run(counting_op(&calls, |_| {
                Err(AuthError::Unauthorized {
                    status: 401,
                    detail: "expired".into(),
                })
            }))
            .await;
        assert!(result.unwrap_err().is_unauthorized());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn network_errors_exhaust_after_three_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let start = tokio::time::Instant::now();
        let result = RetryPolicy::default()
            .run(counting_op(&calls, |_| Err(AuthError::Network("refused".into()))))
            .await;

        match result.unwrap_err() {
            AuthError::RetriesExhausted { attempts, last } => {
                assert_eq!(attempts, 3);
                assert_eq!(*last, AuthError::Network("refused".into()));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Two fixed one-second pauses between three attempts.
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(2), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_millis(2_100), "elapsed {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_when_a_later_attempt_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let result = RetryPolicy::default()
            .run(counting_op(&calls, |n| {
                if n < 3 {
                    Err(AuthError::Server {
                        status: 503,
                        detail: "unavailable".into(),
                    })
                } else {
                    Ok(n)
                }
            }))
            .await;
        assert_eq!(result.unwrap(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_error_after_transient_stops_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let result = RetryPolicy::new()
            .with_max_attempts(5)
            .run(counting_op(&calls, |n| {
                if n == 1 {
                    Err(AuthError::Network("reset".into()))
                } else {
                    Err(AuthError::Unauthorized {
                        status: 403,
                        detail: "revoked".into(),
                    })
                }
            }))
            .await;
        assert!(result.unwrap_err().is_unauthorized());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_attempts_still_tries_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let result = RetryPolicy::new()
            .with_max_attempts(0)
            .run(counting_op(&calls, |_| Err(AuthError::Network("down".into()))))
            .await;
        assert!(matches!(
            result.unwrap_err(),
            AuthError::RetriesExhausted { attempts: 1, .. }
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
