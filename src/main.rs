//! Fetch-Pool main entry point
//!
//! This is the command-line interface for the Fetch-Pool fetch pipeline.

use anyhow::Context;
use clap::Parser;
use fetch_pool::config::{load_config_with_hash, validate, Config};
use fetch_pool::output::{ConsoleSink, FanoutSink, LogSink};
use fetch_pool::pipeline::{cancel_on_ctrl_c, Pipeline};
use fetch_pool::Job;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Fetch-Pool: a bounded-concurrency URL fetcher
///
/// Fetches every URL with a fixed pool of workers, a shared rate limit,
/// exponential-backoff retries and an optional overall deadline. Prints one
/// line per URL and a summary.
#[derive(Parser, Debug)]
#[command(name = "fetch-pool")]
#[command(version)]
#[command(about = "A bounded-concurrency URL fetcher", long_about = None)]
struct Cli {
    /// URLs to fetch, appended to the configured job list
    #[arg(value_name = "URL")]
    urls: Vec<String>,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// File with one URL per line ('#' starts a comment)
    #[arg(long, value_name = "FILE")]
    urls_file: Option<PathBuf>,

    /// Number of workers
    #[arg(short, long)]
    workers: Option<usize>,

    /// Cancel the whole run after this many seconds
    #[arg(long)]
    deadline_secs: Option<u64>,

    /// Milliseconds between rate permits (0 disables rate limiting)
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Retries per URL after the first attempt
    #[arg(long)]
    max_retries: Option<u32>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Show the resolved configuration and job list without fetching
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let config = resolve_config(&cli)?;
    let jobs = Job::from_urls(config.jobs.urls.iter().cloned());

    if cli.dry_run {
        handle_dry_run(&config, &jobs);
        return Ok(ExitCode::SUCCESS);
    }

    if jobs.is_empty() {
        tracing::warn!("No URLs to fetch");
        return Ok(ExitCode::SUCCESS);
    }

    handle_run(&config, jobs, cli.quiet).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("fetch_pool=info,warn"),
            1 => EnvFilter::new("fetch_pool=debug,info"),
            2 => EnvFilter::new("fetch_pool=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Loads the config file (if any), then applies command-line overrides
fn resolve_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("Failed to load configuration {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => Config::default(),
    };

    if let Some(path) = &cli.urls_file {
        config.jobs.urls.extend(read_urls_file(path)?);
    }
    config.jobs.urls.extend(cli.urls.iter().cloned());

    if let Some(workers) = cli.workers {
        config.pipeline.workers = workers;
    }
    if let Some(deadline) = cli.deadline_secs {
        config.pipeline.deadline_secs = Some(deadline);
    }
    if let Some(interval) = cli.interval_ms {
        config.rate_limit.interval_ms = interval;
    }
    if let Some(retries) = cli.max_retries {
        config.retry.max_retries = retries;
    }

    validate(&config).context("Invalid command-line override")?;
    Ok(config)
}

/// Reads one URL per line, skipping blanks and comments
fn read_urls_file(path: &Path) -> anyhow::Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read URL list {}", path.display()))?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// Handles the --dry-run mode: shows what would be fetched
fn handle_dry_run(config: &Config, jobs: &[Job]) {
    println!("=== Fetch-Pool Dry Run ===\n");

    println!("Pipeline:");
    println!("  Workers: {}", config.pipeline.workers);
    println!("  Job buffer: {}", config.pipeline.job_buffer());
    println!("  Result buffer: {}", config.pipeline.result_buffer);
    match config.pipeline.deadline_secs {
        Some(secs) => println!("  Deadline: {}s", secs),
        None => println!("  Deadline: none"),
    }

    println!("\nRate Limit:");
    if config.rate_limit.interval_ms == 0 {
        println!("  Disabled");
    } else {
        println!("  Interval: {}ms", config.rate_limit.interval_ms);
        println!("  Strategy: {:?}", config.rate_limit.strategy);
        println!("  Burst: {}", config.rate_limit.burst);
    }

    println!("\nRetry:");
    println!("  Max retries: {}", config.retry.max_retries);
    println!("  Backoff unit: {}ms", config.retry.backoff_unit_ms);
    match config.retry.max_backoff_ms {
        Some(max) => println!("  Max backoff: {}ms", max),
        None => println!("  Max backoff: uncapped"),
    }
    println!("  Jitter: {}", config.retry.jitter);
    println!("  Attempt timeout: {}ms", config.http.attempt_timeout_ms);

    println!("\nUser Agent: {}", config.user_agent.header_value());

    println!("\nJobs ({}):", jobs.len());
    for job in jobs {
        let marker = if job.parse_url().is_ok() { "*" } else { "!" };
        println!("  {} {}", marker, job);
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the main fetch run
async fn handle_run(config: &Config, jobs: Vec<Job>, quiet: bool) -> anyhow::Result<ExitCode> {
    let pipeline = Pipeline::from_config(config).context("Failed to build HTTP client")?;
    let _interrupt = cancel_on_ctrl_c(pipeline.cancellation_token());

    let mut sink = FanoutSink::new().with(LogSink);
    if !quiet {
        sink = sink.with(ConsoleSink::stdout());
    }

    let summary = pipeline.run(jobs, &mut sink).await?;

    if summary.cancelled {
        tracing::warn!("Run cancelled: {} of {} jobs succeeded", summary.succeeded, summary.total);
    }

    if summary.failed() > 0 {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
