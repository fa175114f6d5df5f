use std::future::Future;
use std::time::Duration;

use crate::errors::{BandarmologyError, Result};

/// Exponential backoff: `initial_backoff * 2^attempt`, capped at `max_backoff`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: 2,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
        RetryPolicy {
            max_retries,
            initial_backoff,
            max_backoff,
        }
    }

    pub fn none() -> Self {
        RetryPolicy {
            max_retries: 0,
            ..RetryPolicy::default()
        }
    }

    /// Delay before retry number `attempt` (0-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(16));
        self.initial_backoff.saturating_mul(factor).min(self.max_backoff)
    }

    /// Retries transient failures (see [`BandarmologyError::is_transient`]).
    pub async fn retry<T, F, Fut>(&self, what: &str, op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.retry_when(what, BandarmologyError::is_transient, op).await
    }

    pub async fn retry_when<T, F, Fut, P>(&self, what: &str, retryable: P, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
        P: Fn(&BandarmologyError) -> bool,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if !retryable(&e) => return Err(e),
                Err(e) if attempt >= self.max_retries => {
                    if self.max_retries == 0 {
                        return Err(e);
                    }
                    return Err(BandarmologyError::RetriesExhausted {
                        attempts: attempt + 1,
                        last_error: e.to_string(),
                    });
                }
                Err(e) => {
                    let backoff = self.backoff_for(attempt);
                    tracing::warn!(what, attempt = attempt + 1, backoff_ms = backoff.as_millis() as u64, error = %e, "retrying");
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
            }
        }
    }
}
