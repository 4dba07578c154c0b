//! Randomised exponential backoff for completion calls.
//!
//! The wait after the n-th failed attempt is drawn uniformly from
//! `[0, min(max_wait, multiplier * 2^n)]` ("full jitter").

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::backend::LlmError;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub multiplier: Duration,
    pub max_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            multiplier: Duration::from_secs(1),
            max_wait: Duration::from_secs(40),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no waiting.
    pub fn none() -> Self {
        Self { max_attempts: 1, ..Self::default() }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Upper bound of the wait that follows failed attempt number `attempt`.
    pub fn ceiling(&self, attempt: u32) -> Duration {
        self.multiplier
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_wait)
    }

    pub fn wait_before(&self, attempt: u32) -> Duration {
        let ceiling_ms = self.ceiling(attempt).as_millis() as u64;
        if ceiling_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=ceiling_ms))
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// policy's attempts are used up. The last error is returned.
pub async fn with_backoff<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, LlmError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LlmError>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < policy.max_attempts && e.is_retryable() => {
                let wait = policy.wait_before(attempt);
                warn!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    wait_ms = wait.as_millis() as u64,
                    error = %e,
                    "LLM request failed, retrying"
                );
                tokio::time::sleep(wait).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
