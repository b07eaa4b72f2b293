//! Timeout and bounded retry around external calls.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::config::RagConfig;
use crate::error::{RagError, Result};

/// Base delay between retries. Delays double per attempt: 500ms, 1s, 2s, …
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// Upper bound on a single backoff delay.
const RETRY_MAX_DELAY: Duration = Duration::from_secs(10);

/// How embedding and language-model calls are bounded.
///
/// Every attempt runs under `timeout`; an attempt that fails with a
/// retryable error is repeated up to `max_retries` times with exponential
/// backoff. With `max_retries == 0` a call is attempted exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallPolicy {
    /// Limit on each attempt.
    pub timeout: Duration,
    /// Additional attempts after a retryable failure.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self { timeout: Duration::from_secs(60), max_retries: 0, base_delay: RETRY_BASE_DELAY }
    }
}

impl CallPolicy {
    /// Policy from the configured timeout and retry count.
    pub fn from_config(config: &RagConfig) -> Self {
        Self {
            timeout: config.request_timeout,
            max_retries: config.max_retries,
            base_delay: RETRY_BASE_DELAY,
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(1 << attempt.min(16)).min(RETRY_MAX_DELAY)
    }

    /// Run `call` under this policy.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Timeout`] when the final attempt times out, or the
    /// final attempt's own error.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            let outcome = match tokio::time::timeout(self.timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(RagError::Timeout {
                    operation: operation.to_string(),
                    after: self.timeout,
                }),
            };

            match outcome {
                Err(err) if err.is_retryable() && attempt < self.max_retries => {
                    let wait = self.backoff(attempt);
                    warn!(
                        operation,
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        wait_ms = wait.as_millis() as u64,
                        error = %err,
                        "retryable failure, backing off"
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}
