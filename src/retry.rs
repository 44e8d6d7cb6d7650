//! Transport retry with exponential backoff.
//!
//! Only connection failures are retried. Any HTTP response, whatever its
//! status, is handed straight back to the caller.

use std::time::Duration;

/// Fixed retry policy shared by every outbound call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the initial request
    pub max_retries: u32,
    /// First backoff delay, doubled on every further retry
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    /// Three retries waiting 0.5s, 1s and 2s.
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    fn delay(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Send a request, retrying connection failures with backoff.
    ///
    /// The closure is called up to `max_retries + 1` times.
    pub async fn send<F, Fut>(&self, f: F) -> Result<reqwest::Response, reqwest::Error>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<reqwest::Response, reqwest::Error>>,
    {
        for attempt in 0..self.max_retries {
            match f().await {
                Ok(resp) => return Ok(resp),
                Err(e) if e.is_connect() => {
                    let delay = self.delay(attempt);
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        "connection failed, retrying in {delay:?}: {e}"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
        f().await
    }
}
