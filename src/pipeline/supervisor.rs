//! Pool supervisor
//!
//! Waits for every worker to exit, then settles whatever is left in the
//! jobs channel. The results channel closes when the supervisor and the job
//! source drop their senders, which can only happen after the last worker
//! has finished.

use crate::job::Job;
use crate::output::JobResult;
use crate::pipeline::worker::WorkerReport;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};

/// How the pool wound down
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SupervisorReport {
    /// Jobs the source handed to the jobs channel
    pub dispatched: usize,

    /// Jobs workers turned into results
    pub processed: usize,

    /// Jobs left in the channel after the workers stopped
    pub stranded: usize,

    /// Workers that died abnormally
    pub worker_failures: usize,
}

pub(super) struct Supervisor {
    pub workers: JoinSet<WorkerReport>,
    pub source: JoinHandle<usize>,
    pub deadline: Option<JoinHandle<()>>,
    pub job_rx: async_channel::Receiver<Job>,
    pub result_tx: mpsc::Sender<JobResult>,
}

impl Supervisor {
    pub(super) fn spawn(self) -> JoinHandle<SupervisorReport> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) -> SupervisorReport {
        let mut report = SupervisorReport::default();

        while let Some(joined) = self.workers.join_next().await {
            match joined {
                Ok(worker) => {
                    tracing::trace!("Worker {} processed {} jobs", worker.id, worker.processed);
                    report.processed += worker.processed;
                }
                Err(e) => {
                    tracing::error!("Worker task failed: {}", e);
                    report.worker_failures += 1;
                }
            }
        }

        if let Some(deadline) = self.deadline.take() {
            deadline.abort();
        }

        // No worker will read again; unblock the source and settle leftovers
        self.job_rx.close();
        while let Ok(job) = self.job_rx.try_recv() {
            report.stranded += 1;
            if self.result_tx.send(JobResult::abandoned(job)).await.is_err() {
                break;
            }
        }

        report.dispatched = match self.source.await {
            Ok(dispatched) => dispatched,
            Err(e) => {
                tracing::error!("Job source task failed: {}", e);
                0
            }
        };

        tracing::debug!(
            "Pool stopped: {} dispatched, {} processed, {} stranded",
            report.dispatched,
            report.processed,
            report.stranded
        );
        report
    }
}
