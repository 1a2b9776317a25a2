//! Retry logic with exponential backoff
//!
//! [`RetryPolicy`] wraps a single network operation. When the operation
//! completes with a transient outcome (HTTP 404 or 429), it waits and tries
//! again, doubling the delay each time (1, 2, 4, … minutes with the default
//! configuration). Once retries are exhausted, or the outcome is anything
//! other than transient, the last outcome is handed back unchanged: callers
//! inspect the status themselves.
//!
//! Transport errors (`Err`) are never retried here; they are returned
//! immediately.
//!
//! # Example
//!
//! ```no_run
//! use content_export::config::RetryConfig;
//! use content_export::retry::RetryPolicy;
//!
//! # async fn example(client: reqwest::Client) -> Result<(), reqwest::Error> {
//! let policy = RetryPolicy::new(RetryConfig::default());
//! let response = policy
//!     .execute(|| client.get("https://example.com/media/a.png").send())
//!     .await?;
//! if !response.status().is_success() {
//!     // still 404/429 after all retries, or some other failure status
//! }
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use rand::Rng;
use reqwest::StatusCode;
use std::future::Future;
use std::time::Duration;

/// Trait for outcomes that can be classified as transient or final
pub trait IsRetryable {
    /// Returns true if the outcome is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

/// Statuses worth waiting out: the API answers 404 while content is being
/// indexed and 429 when the client is throttled.
pub fn is_transient_status(status: StatusCode) -> bool {
    matches!(status, StatusCode::NOT_FOUND | StatusCode::TOO_MANY_REQUESTS)
}

impl IsRetryable for StatusCode {
    fn is_retryable(&self) -> bool {
        is_transient_status(*self)
    }
}

impl IsRetryable for reqwest::Response {
    fn is_retryable(&self) -> bool {
        is_transient_status(self.status())
    }
}

/// Bounded retry with exponential backoff, independent of any endpoint
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    /// Create a policy from configuration
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Maximum number of retries after the first attempt
    pub fn max_retries(&self) -> u32 {
        self.config.max_retries
    }

    /// Delay before retry number `retry` (1-based), before jitter
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.config.initial_delay.as_secs_f64()
            * self.config.backoff_multiplier.powi(exponent);
        if !secs.is_finite() || secs >= self.config.max_delay.as_secs_f64() {
            return self.config.max_delay;
        }
        Duration::from_secs_f64(secs)
    }

    /// Run `operation`, retrying transient outcomes up to `max_retries` times
    ///
    /// # Arguments
    ///
    /// * `operation` - Closure producing a fresh attempt each time it is called
    ///
    /// # Returns
    ///
    /// The first non-transient outcome, the last transient outcome once
    /// retries are exhausted, or the first transport error.
    pub async fn execute<F, Fut, T, E>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        T: IsRetryable,
    {
        let mut retry = 0;

        loop {
            let outcome = operation().await?;

            if !outcome.is_retryable() {
                if retry > 0 {
                    tracing::info!(attempts = retry + 1, "Request completed after retry");
                }
                return Ok(outcome);
            }

            if retry >= self.config.max_retries {
                tracing::error!(
                    attempts = retry + 1,
                    "Request still failing with a transient status, giving up"
                );
                return Ok(outcome);
            }

            retry += 1;
            let delay = self.backoff_delay(retry);
            let delay = if self.config.jitter {
                add_jitter(delay)
            } else {
                delay
            };

            tracing::warn!(
                retry,
                max_retries = self.config.max_retries,
                delay_secs = delay.as_secs_f64(),
                "Transient status, backing off before retry"
            );

            tokio::time::sleep(delay).await;
        }
    }
}

/// Add random jitter to a delay
///
/// The actual delay will be between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor))
}
