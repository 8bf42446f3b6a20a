//! Bounded retry with a fixed delay between attempts.
//!
//! Used for geocoding lookups and notification delivery so an unreachable
//! service degrades the batch instead of stalling it.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Attempts and fixed backoff for an external call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay between attempts
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Policy with `max_attempts` (at least 1) and a fixed `backoff`
    #[must_use]
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Run `attempt` until it succeeds or attempts run out, retrying every error.
    pub async fn run<T, E, F, Fut>(&self, operation: &str, attempt: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.run_if(operation, attempt, |_| true).await
    }

    /// Like [`RetryPolicy::run`], but stops early on errors `retryable` rejects.
    pub async fn run_if<T, E, F, Fut, R>(
        &self,
        operation: &str,
        mut attempt: F,
        retryable: R,
    ) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
        R: Fn(&E) -> bool,
    {
        let mut tries = 1;
        loop {
            match attempt(tries).await {
                Ok(value) => return Ok(value),
                Err(e) if tries < self.max_attempts && retryable(&e) => {
                    warn!(
                        operation,
                        attempt = tries,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "Attempt failed, retrying in {:?}",
                        self.backoff
                    );
                    tokio::time::sleep(self.backoff).await;
                    tries += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
