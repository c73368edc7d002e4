use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Fetch-Pool
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default, rename = "rate-limit")]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default, rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
}

/// Worker pool sizing and overall deadline
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Number of concurrent workers
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Capacity of the jobs channel (defaults to the worker count)
    #[serde(default, rename = "job-buffer")]
    pub job_buffer: Option<usize>,

    /// Capacity of the results channel
    #[serde(default = "default_result_buffer", rename = "result-buffer")]
    pub result_buffer: usize,

    /// Overall deadline for the whole run, in seconds
    #[serde(default, rename = "deadline-secs")]
    pub deadline_secs: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            job_buffer: None,
            result_buffer: default_result_buffer(),
            deadline_secs: None,
        }
    }
}

impl PipelineConfig {
    pub fn job_buffer(&self) -> usize {
        self.job_buffer.unwrap_or(self.workers).max(1)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }
}

/// How permits are handed out between ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RateStrategyKind {
    /// Fixed ticks; a tick nobody waits for is dropped
    #[default]
    Ticker,

    /// Permits accumulate up to `burst` while idle
    TokenBucket,
}

/// Aggregate rate limit shared by all workers
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Interval between permits in milliseconds (0 disables rate limiting)
    #[serde(default = "default_interval_ms", rename = "interval-ms")]
    pub interval_ms: u64,

    #[serde(default)]
    pub strategy: RateStrategyKind,

    /// Token bucket capacity
    #[serde(default = "default_burst")]
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            strategy: RateStrategyKind::default(),
            burst: default_burst(),
        }
    }
}

/// Per-job retry and backoff behavior
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt
    #[serde(default = "default_max_retries", rename = "max-retries")]
    pub max_retries: u32,

    /// First backoff delay in milliseconds; doubles after every failure
    #[serde(default = "default_backoff_unit_ms", rename = "backoff-unit-ms")]
    pub backoff_unit_ms: u64,

    /// Optional ceiling on a single backoff delay
    #[serde(default, rename = "max-backoff-ms")]
    pub max_backoff_ms: Option<u64>,

    /// Randomize each delay between zero and its nominal value
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_unit_ms: default_backoff_unit_ms(),
            max_backoff_ms: None,
            jitter: false,
        }
    }
}

/// HTTP client behavior
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Timeout for a single fetch attempt in milliseconds
    #[serde(default = "default_attempt_timeout_ms", rename = "attempt-timeout-ms")]
    pub attempt_timeout_ms: u64,

    #[serde(default = "default_connect_timeout_ms", rename = "connect-timeout-ms")]
    pub connect_timeout_ms: u64,

    /// Refuse plain http URLs
    #[serde(default, rename = "https-only")]
    pub https_only: bool,

    /// Count any HTTP status as a successful fetch
    #[serde(default, rename = "accept-any-status")]
    pub accept_any_status: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            attempt_timeout_ms: default_attempt_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            https_only: false,
            accept_any_status: false,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    #[serde(default = "default_agent_name")]
    pub name: String,

    #[serde(default = "default_agent_version")]
    pub version: String,

    /// URL with information about the client
    #[serde(default, rename = "contact-url")]
    pub contact_url: Option<String>,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            version: default_agent_version(),
            contact_url: None,
        }
    }
}

impl UserAgentConfig {
    /// Formats the header value: `Name/Version` or `Name/Version (+ContactURL)`
    pub fn header_value(&self) -> String {
        match &self.contact_url {
            Some(url) => format!("{}/{} (+{})", self.name, self.version, url),
            None => format!("{}/{}", self.name, self.version),
        }
    }
}

/// The job list
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobsConfig {
    #[serde(default)]
    pub urls: Vec<String>,
}

fn default_workers() -> usize {
    3
}

fn default_result_buffer() -> usize {
    16
}

fn default_interval_ms() -> u64 {
    1000
}

fn default_burst() -> u32 {
    1
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_unit_ms() -> u64 {
    1000
}

fn default_attempt_timeout_ms() -> u64 {
    10_000
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

fn default_agent_name() -> String {
    "fetch-pool".to_string()
}

fn default_agent_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
