//! Job source task
//!
//! Feeds jobs into the bounded jobs channel. Sending blocks while no worker
//! is ready, which is what keeps admission in step with the pool.

use crate::job::Job;
use crate::output::JobResult;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Spawns the job source
///
/// Jobs are sent in input order. The jobs channel closes when the returned
/// task finishes, because the task owns the only sender.
///
/// If the run is cancelled, or every worker has gone away, the jobs that were
/// never handed off are reported as abandoned results so that each job still
/// yields exactly one result.
///
/// # Returns
///
/// A handle resolving to the number of jobs handed to the jobs channel
pub fn spawn_job_source(
    jobs: Vec<Job>,
    job_tx: async_channel::Sender<Job>,
    result_tx: mpsc::Sender<JobResult>,
    cancel: CancellationToken,
) -> JoinHandle<usize> {
    tokio::spawn(async move {
        let total = jobs.len();
        let mut dispatched = 0;
        let mut pending = jobs.into_iter();

        while let Some(job) = pending.next() {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    tracing::debug!("Job source cancelled after {} of {} jobs", dispatched, total);
                    abandon(std::iter::once(job).chain(pending), &result_tx).await;
                    break;
                }
                sent = job_tx.send(job.clone()) => match sent {
                    Ok(()) => {
                        tracing::trace!("Dispatched job {}", job);
                        dispatched += 1;
                    }
                    Err(_) => {
                        tracing::warn!(
                            "Jobs channel closed with {} jobs unsent",
                            total - dispatched
                        );
                        abandon(std::iter::once(job).chain(pending), &result_tx).await;
                        break;
                    }
                }
            }
        }

        tracing::debug!("Job source finished: {} jobs dispatched", dispatched);
        job_tx.close();
        dispatched
    })
}

async fn abandon(jobs: impl Iterator<Item = Job>, result_tx: &mpsc::Sender<JobResult>) {
    for job in jobs {
        if result_tx.send(JobResult::abandoned(job)).await.is_err() {
            // Nobody is draining results anymore
            return;
        }
    }
}
