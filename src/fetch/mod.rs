//! Fetching with retry
//!
//! This module contains:
//! - The [`Fetcher`] capability workers call for every attempt
//! - A reqwest-backed implementation, [`HttpFetcher`]
//! - The retry policy and the retryable fetch driver

mod client;
mod retry;

pub use client::{Fetcher, HttpFetcher};
pub use retry::{fetch_with_retry, RetryError, RetryPolicy};

use std::time::Duration;
use thiserror::Error;

/// Successful response for one job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSuccess {
    /// HTTP status code
    pub status: u16,

    /// URL after redirects
    pub final_url: String,

    /// Content-Length header, when present
    pub content_length: Option<u64>,
}

/// Error from a single fetch attempt
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("HTTP status {status}")]
    Status { status: u16 },

    #[error("Attempt timed out after {after:?}")]
    Timeout { after: Duration },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Fetch cancelled")]
    Cancelled,
}

impl FetchError {
    /// Returns true if another attempt could succeed
    ///
    /// Non-success statuses, timeouts and network failures are transient.
    /// A malformed job or a cancelled run never is.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Status { .. } | Self::Timeout { .. } | Self::Network(_)
        )
    }

    /// Classifies a reqwest error
    pub fn from_reqwest(error: &reqwest::Error) -> Self {
        if error.is_builder() {
            Self::InvalidUrl(error.to_string())
        } else if error.is_timeout() {
            Self::Network(format!("Request timeout: {}", error))
        } else if error.is_connect() {
            Self::Network(format!("Connection failed: {}", error))
        } else {
            Self::Network(error.to_string())
        }
    }
}
