//! Retryable fetch driver
//!
//! One call drives a single job through its attempts:
//!
//! | Step | Waits on | Cancellation |
//! |------|----------|--------------|
//! | Rate permit | shared limiter | aborts with `Cancelled` |
//! | Attempt | fetcher, bounded by the attempt timeout | aborts with `Cancelled` |
//! | Backoff | timer, `unit * 2^(failures - 1)` | aborts with `Cancelled` |
//!
//! A retryable failure on the last allowed attempt ends in `Exhausted`; a
//! non-retryable failure ends in `Fatal` straight away.

use crate::config::{HttpConfig, RetryConfig};
use crate::fetch::{FetchError, FetchSuccess, Fetcher};
use crate::limiter::RateLimiter;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Retry and backoff settings for a single job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; a job gets at most `max_retries + 1` attempts
    pub max_retries: u32,

    /// Delay after the first failure
    pub backoff_unit: Duration,

    /// Ceiling for a single delay; `None` keeps doubling
    pub max_backoff: Option<Duration>,

    /// Draw each delay uniformly from `0..=nominal`
    pub jitter: bool,

    /// Bound on one attempt, independent of cancellation
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default(), &HttpConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(retry: &RetryConfig, http: &HttpConfig) -> Self {
        Self {
            max_retries: retry.max_retries,
            backoff_unit: Duration::from_millis(retry.backoff_unit_ms),
            max_backoff: retry.max_backoff_ms.map(Duration::from_millis),
            jitter: retry.jitter,
            attempt_timeout: Duration::from_millis(http.attempt_timeout_ms),
        }
    }

    /// Total attempts allowed for one job
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before the next attempt once `failures` attempts have failed
    ///
    /// Strict doubling from `backoff_unit`, capped by `max_backoff` when set.
    pub fn nominal_backoff(&self, failures: u32) -> Duration {
        let factor = 1u32
            .checked_shl(failures.saturating_sub(1))
            .unwrap_or(u32::MAX);
        let delay = self.backoff_unit.saturating_mul(factor);

        match self.max_backoff {
            Some(max) => delay.min(max),
            None => delay,
        }
    }

    /// Delay actually slept, with jitter applied when enabled
    pub fn backoff(&self, failures: u32) -> Duration {
        let nominal = self.nominal_backoff(failures);
        if !self.jitter {
            return nominal;
        }

        let nanos = u64::try_from(nominal.as_nanos()).unwrap_or(u64::MAX);
        Duration::from_nanos(fastrand::u64(0..=nanos))
    }
}

/// Terminal failure of a retryable fetch
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RetryError {
    #[error("Gave up after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: FetchError },

    #[error("Failed without retry after {attempts} attempts: {error}")]
    Fatal { attempts: u32, error: FetchError },

    #[error("Cancelled after {attempts} attempts")]
    Cancelled { attempts: u32 },
}

impl RetryError {
    /// Number of fetch attempts that were started
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Exhausted { attempts, .. }
            | Self::Fatal { attempts, .. }
            | Self::Cancelled { attempts } => *attempts,
        }
    }
}

/// Fetches `url`, retrying transient failures with exponential backoff
///
/// Each attempt first takes a permit from `limiter`. Every wait is raced
/// against `cancel`, and once it fires no further attempt is started.
///
/// # Returns
///
/// * `Ok((FetchSuccess, attempts))` - An attempt succeeded
/// * `Err(RetryError)` - Retries ran out, the error was not retryable, or the run was cancelled
pub async fn fetch_with_retry<F>(
    fetcher: &F,
    url: &Url,
    policy: &RetryPolicy,
    limiter: &RateLimiter,
    cancel: &CancellationToken,
) -> Result<(FetchSuccess, u32), RetryError>
where
    F: Fetcher + ?Sized,
{
    let mut attempts = 0;

    loop {
        if !limiter.acquire_or_cancel(cancel).await {
            return Err(RetryError::Cancelled { attempts });
        }

        attempts += 1;
        tracing::trace!(url = %url, attempt = attempts, "Starting fetch attempt");

        let result = tokio::select! {
            biased;

            _ = cancel.cancelled() => return Err(RetryError::Cancelled { attempts }),
            result = tokio::time::timeout(policy.attempt_timeout, fetcher.fetch(url)) => {
                result.unwrap_or(Err(FetchError::Timeout { after: policy.attempt_timeout }))
            }
        };

        let error = match result {
            Ok(success) => {
                if attempts > 1 {
                    tracing::debug!(url = %url, attempts, "Fetch succeeded after retry");
                }
                return Ok((success, attempts));
            }
            Err(FetchError::Cancelled) => return Err(RetryError::Cancelled { attempts }),
            Err(error) if !error.is_retryable() => {
                return Err(RetryError::Fatal { attempts, error });
            }
            Err(error) => error,
        };

        if attempts >= policy.max_attempts() {
            tracing::warn!(url = %url, attempts, error = %error, "Fetch failed after retries");
            return Err(RetryError::Exhausted {
                attempts,
                last_error: error,
            });
        }

        let delay = policy.backoff(attempts);
        tracing::warn!(
            url = %url,
            attempts,
            error = %error,
            "Fetch failed, retrying in {:?}",
            delay
        );

        tokio::select! {
            biased;

            _ = cancel.cancelled() => return Err(RetryError::Cancelled { attempts }),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
