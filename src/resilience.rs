use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::PipelineError;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BACKOFF_MS: u64 = 1000;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Delay unit; attempt `n` waits `backoff * n` before attempt `n + 1`.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: Duration::from_millis(DEFAULT_BACKOFF_MS),
        }
    }
}

impl RetryPolicy {
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(attempt)
    }
}

/// Run `op` until it succeeds or the policy runs out of attempts.
/// `op` receives the 1-based attempt number. On exhaustion the last error is
/// returned.
pub async fn retry<T, E, F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let attempts = policy.attempts();
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(v) => return Ok(v),
            Err(e) if attempt >= attempts => return Err(e),
            Err(e) => {
                let backoff = policy.delay_after(attempt);
                warn!(
                    "{} failed (attempt {}/{}): {}, backing off {:.1}s",
                    label,
                    attempt,
                    attempts,
                    e,
                    backoff.as_secs_f64()
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
        }
    }
}

/// Await a fallible stage and swap any error for a degraded value.
pub async fn degrade<T, E, Fut>(label: &str, fut: Fut, fallback: impl FnOnce(&E) -> T) -> T
where
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    match fut.await {
        Ok(v) => v,
        Err(e) => {
            warn!("{} degraded: {}", label, e);
            fallback(&e)
        }
    }
}

/// Bound a whole stage chain. Dropping the inner future on expiry releases
/// its socket; nothing else is held.
pub async fn with_deadline<T, Fut>(deadline: Duration, fut: Fut) -> Result<T, PipelineError>
where
    Fut: Future<Output = Result<T, PipelineError>>,
{
    tokio::time::timeout(deadline, fut)
        .await
        .unwrap_or(Err(PipelineError::DeadlineExceeded(deadline)))
}
