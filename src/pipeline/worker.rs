//! Pool worker
//!
//! Each worker loops: take a job (or observe cancellation), run the
//! retryable fetch, send the result. The rate permit is taken inside the
//! fetch driver, once per attempt.

use crate::fetch::{fetch_with_retry, Fetcher, RetryPolicy};
use crate::job::Job;
use crate::limiter::RateLimiter;
use crate::output::{JobFailure, JobOutcome, JobResult};
use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Everything a worker shares with the rest of the pool
#[derive(Clone)]
pub(super) struct WorkerContext {
    pub job_rx: async_channel::Receiver<Job>,
    pub result_tx: mpsc::Sender<JobResult>,
    pub fetcher: Arc<dyn Fetcher>,
    pub limiter: Arc<RateLimiter>,
    pub policy: Arc<RetryPolicy>,
    pub cancel: CancellationToken,
    pub active: Arc<AtomicUsize>,
}

/// What one worker did before exiting
#[derive(Debug, Clone, Copy)]
pub(super) struct WorkerReport {
    pub id: usize,
    pub processed: usize,
}

/// Decrements the live worker count on every exit path, unwinding included
struct CompletionGuard {
    id: usize,
    active: Arc<AtomicUsize>,
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        let left = self.active.fetch_sub(1, Ordering::AcqRel).saturating_sub(1);
        tracing::debug!("Worker {} exited, {} still active", self.id, left);
    }
}

/// Runs one worker until the jobs channel drains, the run is cancelled, or
/// the results receiver goes away
///
/// The caller must have counted this worker in `ctx.active` already.
pub(super) async fn run_worker(id: usize, ctx: WorkerContext) -> WorkerReport {
    let _guard = CompletionGuard {
        id,
        active: ctx.active.clone(),
    };
    let mut processed = 0;

    loop {
        let job = tokio::select! {
            biased;

            _ = ctx.cancel.cancelled() => {
                tracing::debug!("Worker {} observed cancellation", id);
                break;
            }
            job = ctx.job_rx.recv() => match job {
                Ok(job) => job,
                Err(_) => break,
            }
        };

        tracing::debug!("Worker {} took job {}", id, job);
        let result = process_job(id, &ctx, job).await;
        processed += 1;

        if ctx.result_tx.send(result).await.is_err() {
            tracing::warn!("Worker {}: results receiver dropped, stopping", id);
            break;
        }
    }

    WorkerReport { id, processed }
}

/// Turns one job into its result; never fails
async fn process_job(id: usize, ctx: &WorkerContext, job: Job) -> JobResult {
    let started = Instant::now();

    let url = match job.parse_url() {
        Ok(url) => url,
        Err(error) => {
            return JobResult {
                worker: Some(id),
                job,
                outcome: JobOutcome::Failed(JobFailure::Fatal { error }),
                attempts: 0,
                elapsed: started.elapsed(),
            };
        }
    };

    // The fetch runs in its own task so a panic inside a fetcher becomes a
    // result instead of taking the worker down
    let fetch = {
        let fetcher = ctx.fetcher.clone();
        let limiter = ctx.limiter.clone();
        let policy = ctx.policy.clone();
        let cancel = ctx.cancel.clone();
        tokio::spawn(async move {
            fetch_with_retry(fetcher.as_ref(), &url, &policy, &limiter, &cancel).await
        })
    };

    let (outcome, attempts) = match fetch.await {
        Ok(Ok((success, attempts))) => (JobOutcome::Success(success), attempts),
        Ok(Err(error)) => {
            let attempts = error.attempts();
            (JobOutcome::from(error), attempts)
        }
        Err(join_error) => {
            let message = if join_error.is_panic() {
                panic_message(join_error.into_panic())
            } else {
                join_error.to_string()
            };
            tracing::warn!(
                "Worker {}: fetch for job {} panicked: {}",
                id,
                job,
                message
            );
            (JobOutcome::Failed(JobFailure::Panicked { message }), 0)
        }
    };

    JobResult {
        worker: Some(id),
        job,
        outcome,
        attempts,
        elapsed: started.elapsed(),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
