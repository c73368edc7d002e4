//! Configuration module for Fetch-Pool
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use fetch_pool::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("fetch-pool.toml")).unwrap();
//! println!("Pipeline will use {} workers", config.pipeline.workers);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, HttpConfig, JobsConfig, PipelineConfig, RateLimitConfig, RateStrategyKind,
    RetryConfig, UserAgentConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;
