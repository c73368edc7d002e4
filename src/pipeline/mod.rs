//! Pipeline orchestration
//!
//! Wires the pieces together:
//!
//! ```text
//! job source ──► jobs channel ──► workers ──► results channel ──► sink
//!                 (bounded)      (N tasks,     (closed after the
//!                                 rate-limited, last worker exits)
//!                                 cancellable)
//! ```
//!
//! A single [`CancellationToken`] is shared by the source, every worker, every
//! rate-limit wait, every attempt and every backoff. The optional deadline
//! and Ctrl-C only ever fire that token.

mod shutdown;
mod supervisor;
mod worker;

pub use shutdown::{cancel_on_ctrl_c, spawn_deadline};
pub use supervisor::SupervisorReport;

use crate::config::Config;
use crate::fetch::{Fetcher, HttpFetcher, RetryPolicy};
use crate::job::{spawn_job_source, Job};
use crate::limiter::{RateLimiter, RateStrategy};
use crate::output::{drain_results, JobResult, ResultSink, RunSummary};
use crate::{PipelineError, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use supervisor::Supervisor;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use worker::{run_worker, WorkerContext};

/// Resolved pipeline parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    pub workers: usize,
    pub job_buffer: usize,
    pub result_buffer: usize,
    pub deadline: Option<Duration>,
    pub rate: RateStrategy,
    pub retry: RetryPolicy,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            workers: config.pipeline.workers.max(1),
            job_buffer: config.pipeline.job_buffer(),
            result_buffer: config.pipeline.result_buffer.max(1),
            deadline: config.pipeline.deadline(),
            rate: RateStrategy::from_config(&config.rate_limit),
            retry: RetryPolicy::from_config(&config.retry, &config.http),
        }
    }
}

/// A configured pipeline, ready to run one job list
pub struct Pipeline {
    settings: PipelineSettings,
    fetcher: Arc<dyn Fetcher>,
    cancel: CancellationToken,
}

impl Pipeline {
    pub fn new(settings: PipelineSettings, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            settings,
            fetcher,
            cancel: CancellationToken::new(),
        }
    }

    /// Builds a pipeline with a reqwest fetcher from the configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let fetcher = HttpFetcher::new(&config.http, &config.user_agent)?;
        Ok(Self::new(
            PipelineSettings::from_config(config),
            Arc::new(fetcher),
        ))
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Starts the source, the workers and the supervisor
    ///
    /// Zero worker or buffer sizes are raised to one. Must be called from
    /// within a Tokio runtime.
    pub fn spawn(self, jobs: Vec<Job>) -> PipelineHandle {
        let Pipeline {
            settings,
            fetcher,
            cancel,
        } = self;
        let total = jobs.len();
        let worker_count = settings.workers.max(1);

        tracing::info!(
            "Starting pipeline: {} jobs, {} workers, rate {:?}, max retries {}",
            total,
            worker_count,
            settings.rate,
            settings.retry.max_retries
        );

        let (job_tx, job_rx) = async_channel::bounded(settings.job_buffer.max(1));
        let (result_tx, results) = mpsc::channel(settings.result_buffer.max(1));
        let limiter = Arc::new(RateLimiter::new(settings.rate));
        let active = Arc::new(AtomicUsize::new(worker_count));

        let source = spawn_job_source(jobs, job_tx, result_tx.clone(), cancel.clone());

        let context = WorkerContext {
            job_rx: job_rx.clone(),
            result_tx: result_tx.clone(),
            fetcher,
            limiter: limiter.clone(),
            policy: Arc::new(settings.retry.clone()),
            cancel: cancel.clone(),
            active: active.clone(),
        };

        let mut workers = JoinSet::new();
        for id in 0..worker_count {
            workers.spawn(run_worker(id, context.clone()));
        }
        drop(context);

        let deadline = settings
            .deadline
            .map(|deadline| spawn_deadline(cancel.clone(), deadline));

        let supervisor = Supervisor {
            workers,
            source,
            deadline,
            job_rx,
            result_tx,
        }
        .spawn();

        PipelineHandle {
            results,
            cancel,
            total,
            active,
            limiter,
            supervisor,
        }
    }

    /// Runs `jobs` to completion, handing every result to `sink`
    pub async fn run<S>(self, jobs: Vec<Job>, sink: &mut S) -> Result<RunSummary>
    where
        S: ResultSink + ?Sized,
    {
        self.spawn(jobs).drain(sink).await
    }
}

/// A running pipeline
pub struct PipelineHandle {
    results: mpsc::Receiver<JobResult>,
    cancel: CancellationToken,
    total: usize,
    active: Arc<AtomicUsize>,
    limiter: Arc<RateLimiter>,
    supervisor: JoinHandle<SupervisorReport>,
}

impl PipelineHandle {
    /// Fires the cancellation signal; irreversible
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Workers that have not exited yet
    pub fn active_workers(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Rate permits handed out so far
    pub fn permits_granted(&self) -> u64 {
        self.limiter.granted()
    }

    /// Next result, or `None` once every result has been delivered
    pub async fn recv(&mut self) -> Option<JobResult> {
        self.results.recv().await
    }

    /// Waits for the pool to wind down, discarding undelivered results
    pub async fn join(self) -> Result<SupervisorReport> {
        let PipelineHandle {
            results,
            supervisor,
            ..
        } = self;
        drop(results);

        supervisor
            .await
            .map_err(|e| PipelineError::Supervisor(e.to_string()))
    }

    /// Drains every result into `sink`, then finishes the run summary
    ///
    /// If the sink fails the run is cancelled and the error returned once the
    /// pool has stopped.
    pub async fn drain<S>(mut self, sink: &mut S) -> Result<RunSummary>
    where
        S: ResultSink + ?Sized,
    {
        let drained = drain_results(&mut self.results, sink, self.total).await;

        let mut summary = match drained {
            Ok(summary) => summary,
            Err(e) => {
                tracing::error!("Result sink failed, cancelling run: {}", e);
                self.cancel();
                self.join().await?;
                return Err(e.into());
            }
        };

        summary.finish(self.is_cancelled());
        let report = self.join().await?;

        if !summary.is_complete() {
            tracing::error!(
                "Expected {} results but received {} ({:?})",
                summary.total,
                summary.received,
                report
            );
        }

        sink.finish(&summary)?;
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{FetchError, FetchSuccess};
    use crate::output::{CollectSink, JobFailure};
    use async_trait::async_trait;
    use tokio::time::Instant;
    use url::Url;

    /// Succeeds for every path except `/fail` and `/hang`; `/slow` takes a second
    struct PathFetcher;

    #[async_trait]
    impl Fetcher for PathFetcher {
        async fn fetch(&self, url: &Url) -> std::result::Result<FetchSuccess, FetchError> {
            if url.path().starts_with("/fail") {
                return Err(FetchError::Status { status: 500 });
            }
            if url.path().starts_with("/hang") {
                return std::future::pending().await;
            }
            if url.path().starts_with("/slow") {
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
            Ok(FetchSuccess {
                status: 200,
                final_url: url.to_string(),
                content_length: None,
            })
        }
    }

    fn settings(workers: usize) -> PipelineSettings {
        PipelineSettings {
            workers,
            job_buffer: workers,
            result_buffer: 4,
            deadline: None,
            rate: RateStrategy::Unlimited,
            retry: RetryPolicy {
                max_retries: 2,
                backoff_unit: Duration::from_secs(1),
                max_backoff: None,
                jitter: false,
                attempt_timeout: Duration::from_secs(5),
            },
        }
    }

    fn mixed_jobs() -> Vec<Job> {
        Job::from_urls([
            "https://example.com/a",
            "https://example.com/fail/1",
            "https://example.com/b",
            "https://example.com/fail/2",
            "https://example.com/c",
        ])
    }

    #[test]
    fn test_settings_from_config() {
        let mut config = Config::default();
        config.pipeline.workers = 4;
        config.pipeline.deadline_secs = Some(30);
        config.rate_limit.interval_ms = 0;

        let settings = PipelineSettings::from_config(&config);
        assert_eq!(settings.workers, 4);
        assert_eq!(settings.job_buffer, 4);
        assert_eq!(settings.deadline, Some(Duration::from_secs(30)));
        assert_eq!(settings.rate, RateStrategy::Unlimited);
    }

    #[tokio::test(start_paused = true)]
    async fn test_three_workers_five_jobs_two_failing() {
        let pipeline = Pipeline::new(settings(3), Arc::new(PathFetcher));
        let mut sink = CollectSink::default();

        let summary = pipeline.run(mixed_jobs(), &mut sink).await.unwrap();

        assert_eq!(sink.results.len(), 5);
        assert_eq!(summary.succeeded, 3);
        assert_eq!(summary.failures_of("exhausted"), 2);
        assert!(!summary.cancelled);

        for result in sink.results.iter().filter(|r| !r.is_success()) {
            // max_retries + 1
            assert_eq!(result.attempts, 3);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_job_yields_one_result_for_any_pool_size() {
        for workers in 1..=6 {
            for count in [0, 1, 5, 13] {
                let urls: Vec<String> = (0..count)
                    .map(|i| format!("https://example.com/{}", i))
                    .collect();
                let pipeline = Pipeline::new(settings(workers), Arc::new(PathFetcher));
                let mut sink = CollectSink::default();

                pipeline.run(Job::from_urls(urls), &mut sink).await.unwrap();

                let mut ids: Vec<usize> = sink.results.iter().map(|r| r.job.id().0).collect();
                ids.sort_unstable();
                assert_eq!(ids, (0..count).collect::<Vec<_>>(), "workers={}", workers);
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_rerun_gives_same_classifications() {
        let mut runs = Vec::new();
        for _ in 0..2 {
            let pipeline = Pipeline::new(settings(3), Arc::new(PathFetcher));
            let mut sink = CollectSink::default();
            pipeline.run(mixed_jobs(), &mut sink).await.unwrap();

            let mut labels: Vec<(usize, &'static str)> = sink
                .results
                .iter()
                .map(|r| (r.job.id().0, r.outcome.label()))
                .collect();
            labels.sort_unstable();
            runs.push(labels);
        }

        assert_eq!(runs[0], runs[1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_gates_throughput() {
        let mut settings = settings(3);
        settings.rate = RateStrategy::Ticker {
            interval: Duration::from_secs(1),
        };
        let pipeline = Pipeline::new(settings, Arc::new(PathFetcher));
        let jobs = Job::from_urls([
            "https://example.com/1",
            "https://example.com/2",
            "https://example.com/3",
        ]);

        let start = Instant::now();
        let mut handle = pipeline.spawn(jobs);
        let mut received = 0;
        while handle.recv().await.is_some() {
            received += 1;
        }

        assert_eq!(received, 3);
        assert!(start.elapsed() >= Duration::from_secs(2));
        assert_eq!(handle.permits_granted(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_workers_fetch_concurrently() {
        let pipeline = Pipeline::new(settings(3), Arc::new(PathFetcher));
        let jobs = Job::from_urls((0..6).map(|i| format!("https://example.com/slow/{}", i)));

        let start = Instant::now();
        let mut sink = CollectSink::default();
        let summary = pipeline.run(jobs, &mut sink).await.unwrap();

        assert_eq!(summary.succeeded, 6);
        // Two rounds of three one-second fetches
        assert!(start.elapsed() >= Duration::from_secs(2));
        assert!(start.elapsed() < Duration::from_secs(3));

        let mut workers: Vec<usize> = sink.results.iter().filter_map(|r| r.worker).collect();
        workers.sort_unstable();
        workers.dedup();
        assert_eq!(workers, vec![0, 1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_rate_runs_unlimited() {
        let mut settings = settings(2);
        settings.rate = RateStrategy::Ticker {
            interval: Duration::ZERO,
        };
        let pipeline = Pipeline::new(settings, Arc::new(PathFetcher));
        let mut sink = CollectSink::default();

        let summary = pipeline.run(mixed_jobs(), &mut sink).await.unwrap();

        assert_eq!(summary.succeeded, 3);
        assert_eq!(summary.failures_of("exhausted"), 2);
        assert_eq!(summary.failures_of("panicked"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_sizes_are_raised_to_one() {
        let mut settings = settings(3);
        settings.workers = 0;
        settings.job_buffer = 0;
        settings.result_buffer = 0;
        let pipeline = Pipeline::new(settings, Arc::new(PathFetcher));
        let mut sink = CollectSink::default();

        let summary = pipeline.run(mixed_jobs(), &mut sink).await.unwrap();

        assert_eq!(summary.received, 5);
        assert_eq!(summary.succeeded, 3);
        assert!(sink.results.iter().all(|r| r.worker == Some(0)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_cancels_hanging_fetches() {
        let mut settings = settings(3);
        settings.deadline = Some(Duration::from_secs(30));
        settings.retry.attempt_timeout = Duration::from_secs(3600);
        let pipeline = Pipeline::new(settings, Arc::new(PathFetcher));
        let jobs = Job::from_urls((0..5).map(|i| format!("https://example.com/hang/{}", i)));

        let start = Instant::now();
        let mut sink = CollectSink::default();
        let summary = pipeline.run(jobs, &mut sink).await.unwrap();

        assert!(summary.cancelled);
        assert_eq!(summary.received, 5);
        // Three in flight, the rest never reached a worker
        assert_eq!(summary.failures_of("cancelled"), 3);
        assert_eq!(summary.failures_of("abandoned"), 2);
        assert!(start.elapsed() >= Duration::from_secs(30));
        assert!(start.elapsed() < Duration::from_secs(31));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_all_workers() {
        let pipeline = Pipeline::new(settings(2), Arc::new(PathFetcher));
        let jobs = Job::from_urls((0..10).map(|i| format!("https://example.com/hang/{}", i)));
        let mut handle = pipeline.spawn(jobs);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(handle.active_workers(), 2);
        handle.cancel();

        let mut results = Vec::new();
        while let Some(result) = handle.recv().await {
            results.push(result);
        }

        assert_eq!(results.len(), 10);
        assert!(results
            .iter()
            .all(|r| r.outcome.failure().is_some_and(JobFailure::is_cancellation)));
        assert_eq!(handle.active_workers(), 0);

        let report = handle.join().await.unwrap();
        assert_eq!(report.worker_failures, 0);
        assert_eq!(report.processed, 2);
    }

    #[tokio::test]
    async fn test_sink_error_cancels_run() {
        use crate::output::{OutputError, OutputResult};

        struct FailingSink;

        impl ResultSink for FailingSink {
            fn on_result(&mut self, _result: &JobResult) -> OutputResult<()> {
                Err(OutputError::Write("broken pipe".to_string()))
            }
        }

        let pipeline = Pipeline::new(settings(2), Arc::new(PathFetcher));
        let jobs = Job::from_urls((0..20).map(|i| format!("https://example.com/{}", i)));

        let err = pipeline.run(jobs, &mut FailingSink).await.unwrap_err();
        assert!(matches!(err, PipelineError::Output(_)));
    }
}
