//! Exponential backoff for (re)connecting to brokers and the search engine.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

/// Reconnect policy.
///
/// Reconnect `n` (for `n` in `0..=max_retries`) waits `base * 2^n / 2`, so the default
/// waits 1, 2, 4, 8, 16 and 32 seconds before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectBackoff {
    pub base: Duration,
    pub max_retries: u32,
}

impl Default for ReconnectBackoff {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(2),
            max_retries: 5,
        }
    }
}

impl ReconnectBackoff {
    /// Wait before reconnect `attempt`.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base * 2u32.saturating_pow(attempt) / 2
    }

    /// Run `connect` until it succeeds or the reconnects are exhausted.
    ///
    /// # Arguments
    ///
    /// * `target` - What is being connected to, for logging
    /// * `connect` - Produces one connection attempt
    ///
    /// # Returns
    ///
    /// * `Ok(T)` - The first successful connection
    /// * `Err(E)` - The error of the last attempt
    pub async fn retry<T, E, F, Fut>(&self, target: &str, mut connect: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut attempt = 0;
        loop {
            match connect().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt > self.max_retries => return Err(e),
                Err(e) => {
                    let delay = self.delay(attempt);
                    warn!(
                        target_name = %target,
                        error = %e,
                        attempt = attempt,
                        retry_in_ms = delay.as_millis() as u64,
                        "Connection failed, retrying..."
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
