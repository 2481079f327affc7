//! Bounded exponential backoff.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

const MAX_DELAY: Duration = Duration::from_secs(30);

/// Retry policy for transient storage failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

/// Final failure of a retried operation.
#[derive(Debug)]
pub struct RetryExhausted<E> {
    pub last_error: E,
    pub attempts: u32,
}

impl RetryPolicy {
    /// `max_attempts` is clamped to at least one.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay after failed attempt `attempt` (1-based): base, 2x base, 4x base...
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        self.base_delay
            .checked_mul(1 << shift)
            .unwrap_or(MAX_DELAY)
            .min(MAX_DELAY)
    }

    /// Runs `op` until it succeeds or attempts run out. `op` receives the
    /// 1-based attempt number. Returns the value and the attempts used.
    pub async fn run<T, E, F, Fut>(
        &self,
        operation: &str,
        mut op: F,
    ) -> Result<(T, u32), RetryExhausted<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok((value, attempt)),
                Err(e) if attempt < self.max_attempts => {
                    let backoff = self.delay_after(attempt);
                    warn!(attempt, error = %e, "{operation} failed, retrying in {backoff:?}");
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!(attempt, error = %e, "{operation} failed, giving up");
                    return Err(RetryExhausted {
                        last_error: e,
                        attempts: attempt,
                    });
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(500))
    }
}
