use crate::config::types::{
    Config, HttpConfig, PipelineConfig, RateLimitConfig, RateStrategyKind, RetryConfig,
    UserAgentConfig,
};
use crate::{ConfigError, ConfigResult};
use url::Url;

/// Upper bound on the worker pool size
const MAX_WORKERS: usize = 256;

/// Validates the entire configuration
///
/// Job URLs are deliberately not checked here: a malformed job becomes a
/// failed result at run time instead of rejecting the whole list.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_pipeline_config(&config.pipeline)?;
    validate_rate_limit_config(&config.rate_limit)?;
    validate_retry_config(&config.retry)?;
    validate_http_config(&config.http)?;
    validate_user_agent_config(&config.user_agent)?;
    Ok(())
}

fn validate_pipeline_config(config: &PipelineConfig) -> ConfigResult<()> {
    if config.workers < 1 || config.workers > MAX_WORKERS {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and {}, got {}",
            MAX_WORKERS, config.workers
        )));
    }

    if config.job_buffer == Some(0) {
        return Err(ConfigError::Validation(
            "job-buffer must be >= 1".to_string(),
        ));
    }

    if config.result_buffer < 1 {
        return Err(ConfigError::Validation(
            "result-buffer must be >= 1".to_string(),
        ));
    }

    if config.deadline_secs == Some(0) {
        return Err(ConfigError::Validation(
            "deadline-secs must be >= 1 when set".to_string(),
        ));
    }

    Ok(())
}

fn validate_rate_limit_config(config: &RateLimitConfig) -> ConfigResult<()> {
    if config.strategy == RateStrategyKind::TokenBucket && config.burst < 1 {
        return Err(ConfigError::Validation(format!(
            "burst must be >= 1 for the token-bucket strategy, got {}",
            config.burst
        )));
    }

    Ok(())
}

fn validate_retry_config(config: &RetryConfig) -> ConfigResult<()> {
    if config.backoff_unit_ms < 1 {
        return Err(ConfigError::Validation(
            "backoff-unit-ms must be >= 1".to_string(),
        ));
    }

    if let Some(max) = config.max_backoff_ms {
        if max < config.backoff_unit_ms {
            return Err(ConfigError::Validation(format!(
                "max-backoff-ms ({}) must be >= backoff-unit-ms ({})",
                max, config.backoff_unit_ms
            )));
        }
    }

    Ok(())
}

fn validate_http_config(config: &HttpConfig) -> ConfigResult<()> {
    if config.attempt_timeout_ms < 1 {
        return Err(ConfigError::Validation(
            "attempt-timeout-ms must be >= 1".to_string(),
        ));
    }

    if config.connect_timeout_ms < 1 {
        return Err(ConfigError::Validation(
            "connect-timeout-ms must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_user_agent_config(config: &UserAgentConfig) -> ConfigResult<()> {
    // Name: non-empty, token characters only
    if config.name.is_empty() {
        return Err(ConfigError::Validation(
            "user-agent name cannot be empty".to_string(),
        ));
    }

    if !config
        .name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(ConfigError::Validation(format!(
            "user-agent name must contain only alphanumeric characters, '-', '_' or '.', got '{}'",
            config.name
        )));
    }

    if config.version.is_empty() {
        return Err(ConfigError::Validation(
            "user-agent version cannot be empty".to_string(),
        ));
    }

    if let Some(contact_url) = &config.contact_url {
        Url::parse(contact_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact-url: {}", e)))?;
    }

    Ok(())
}
