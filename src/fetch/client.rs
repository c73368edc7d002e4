//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the pipeline:
//! - Building the reqwest client with the configured user agent and timeouts
//! - Issuing one GET per attempt
//! - Mapping responses and transport errors onto [`FetchError`]

use crate::config::{HttpConfig, UserAgentConfig};
use crate::fetch::{FetchError, FetchSuccess};
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client};
use std::time::Duration;
use url::Url;

/// The fetch capability a worker calls once per attempt
///
/// Implementations do not retry and do not need their own deadline: the
/// retry driver bounds each attempt with a timeout and drops the future when
/// the run is cancelled.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<FetchSuccess, FetchError>;
}

/// reqwest-backed [`Fetcher`]
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    accept_any_status: bool,
}

impl HttpFetcher {
    /// Builds an HTTP fetcher with proper configuration
    ///
    /// The client timeout matches the per-attempt timeout so an attempt that
    /// outlives the retry driver's timer still releases its connection.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use fetch_pool::config::{HttpConfig, UserAgentConfig};
    /// use fetch_pool::fetch::HttpFetcher;
    ///
    /// let http = HttpConfig::default();
    /// let fetcher = HttpFetcher::new(&http, &UserAgentConfig::default()).unwrap();
    /// ```
    pub fn new(http: &HttpConfig, user_agent: &UserAgentConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(user_agent.header_value())
            .timeout(Duration::from_millis(http.attempt_timeout_ms))
            .connect_timeout(Duration::from_millis(http.connect_timeout_ms))
            .redirect(Policy::limited(10))
            .https_only(http.https_only)
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self {
            client,
            accept_any_status: http.accept_any_status,
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchSuccess, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(&e))?;

        let status = response.status();
        if !status.is_success() && !self.accept_any_status {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        Ok(FetchSuccess {
            status: status.as_u16(),
            final_url: response.url().to_string(),
            content_length: response.content_length(),
        })
    }
}
