//! Retry with exponential backoff
//!
//! Wraps a fallible async operation. Delay before retry `n` (0-based) is
//! `min(base * multiplier^n, max) + jitter`. Permanent errors stop the loop
//! immediately.

use std::future::Future;
use std::time::Duration;

use ring::rand::{SecureRandom, SystemRandom};
use tokio::time::sleep;

use crate::config::RetryConfig;
use crate::error::{PipelineError, Result};

/// Result of a retried operation together with the number of attempts made
#[derive(Debug)]
pub struct RetryOutcome<T> {
    pub result: Result<T>,
    pub attempts: u32,
}

impl<T> RetryOutcome<T> {
    /// Attempts beyond the first
    pub fn retries(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }
}

/// Run `op` until it succeeds, returns a permanent error, or the configured
/// attempts are exhausted. `op` receives the 0-based attempt number.
pub async fn retry_with_backoff<T, F, Fut>(config: &RetryConfig, mut op: F) -> RetryOutcome<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match op(attempt).await {
            Ok(value) => {
                return RetryOutcome {
                    result: Ok(value),
                    attempts: attempt + 1,
                }
            }
            Err(e) => {
                let exhausted = attempt + 1 >= max_attempts;
                if exhausted || is_permanent_error(&e) {
                    tracing::warn!(
                        attempt = attempt,
                        permanent = is_permanent_error(&e),
                        error = %e,
                        "Giving up on operation"
                    );
                    return RetryOutcome {
                        result: Err(e),
                        attempts: attempt + 1,
                    };
                }

                let delay_ms = config
                    .backoff_ms(attempt)
                    .saturating_add(jitter_ms(config.max_jitter_ms));
                tracing::debug!(
                    attempt = attempt,
                    backoff_ms = delay_ms,
                    error = %e,
                    "Retrying after failure"
                );
                sleep(Duration::from_millis(delay_ms)).await;
                attempt += 1;
            }
        }
    }
}

/// Contract violations are deterministic; retrying cannot fix them
fn is_permanent_error(error: &PipelineError) -> bool {
    matches!(error, PipelineError::Validation { .. } | PipelineError::Config(_))
}

/// Random delay in `0..=max_ms`; zero if the system RNG is unavailable
fn jitter_ms(max_ms: u64) -> u64 {
    if max_ms == 0 {
        return 0;
    }
    let mut bytes = [0u8; 8];
    match SystemRandom::new().fill(&mut bytes) {
        Ok(()) => match max_ms.checked_add(1) {
            Some(span) => u64::from_le_bytes(bytes) % span,
            None => u64::from_le_bytes(bytes),
        },
        Err(_) => 0,
    }
}
