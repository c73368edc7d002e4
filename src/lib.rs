//! Fetch-Pool: a bounded-concurrency fetch pipeline
//!
//! This crate feeds a finite list of URLs through a fixed pool of workers.
//! Every fetch attempt is gated by a shared rate limiter, retried with
//! exponential backoff, and raced against a single cancellation signal.
//! Exactly one result is produced for every job.

pub mod config;
pub mod fetch;
pub mod job;
pub mod limiter;
pub mod output;
pub mod pipeline;

use thiserror::Error;

/// Main error type for Fetch-Pool operations
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("Supervisor task failed: {0}")]
    Supervisor(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Fetch-Pool operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use fetch::{FetchError, FetchSuccess, Fetcher, HttpFetcher, RetryPolicy};
pub use job::{Job, JobId};
pub use limiter::{RateLimiter, RateStrategy};
pub use output::{JobFailure, JobOutcome, JobResult, ResultSink, RunSummary};
pub use pipeline::{Pipeline, PipelineHandle};
