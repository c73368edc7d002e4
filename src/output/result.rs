//! Result records
//!
//! Every job produces exactly one [`JobResult`], built by the worker that
//! processed it or, for jobs no worker ever received, by the pipeline itself.

use crate::fetch::{FetchError, FetchSuccess, RetryError};
use crate::job::Job;
use std::fmt;
use std::time::Duration;

/// Why a job did not succeed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobFailure {
    /// Transient errors on every allowed attempt
    Exhausted { last_error: FetchError },

    /// An error retrying cannot fix, such as a malformed URL
    Fatal { error: FetchError },

    /// The run was cancelled while this job was in flight
    Cancelled,

    /// The run was cancelled before any worker took this job
    Abandoned,

    /// The fetch panicked; the worker survived
    Panicked { message: String },
}

impl JobFailure {
    /// Short label used in logs and summaries
    pub fn label(&self) -> &'static str {
        match self {
            Self::Exhausted { .. } => "exhausted",
            Self::Fatal { .. } => "fatal",
            Self::Cancelled => "cancelled",
            Self::Abandoned => "abandoned",
            Self::Panicked { .. } => "panicked",
        }
    }

    /// Returns true if the pipeline shutting down caused this failure
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Abandoned)
    }
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exhausted { last_error } => write!(f, "retries exhausted: {}", last_error),
            Self::Fatal { error } => write!(f, "{}", error),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Abandoned => write!(f, "abandoned before dispatch"),
            Self::Panicked { message } => write!(f, "fetch panicked: {}", message),
        }
    }
}

/// Success or failure of one job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Success(FetchSuccess),
    Failed(JobFailure),
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn failure(&self) -> Option<&JobFailure> {
        match self {
            Self::Success(_) => None,
            Self::Failed(failure) => Some(failure),
        }
    }

    /// Classification label: `success` or the failure label
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::Failed(failure) => failure.label(),
        }
    }
}

impl From<RetryError> for JobOutcome {
    fn from(error: RetryError) -> Self {
        let failure = match error {
            RetryError::Exhausted { last_error, .. } => JobFailure::Exhausted { last_error },
            RetryError::Fatal { error, .. } => JobFailure::Fatal { error },
            RetryError::Cancelled { .. } => JobFailure::Cancelled,
        };
        Self::Failed(failure)
    }
}

/// The recorded outcome of exactly one job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobResult {
    /// Worker that processed the job; `None` if it never reached one
    pub worker: Option<usize>,

    pub job: Job,

    pub outcome: JobOutcome,

    /// Fetch attempts started for this job
    pub attempts: u32,

    /// Time from the worker taking the job to the result being built
    pub elapsed: Duration,
}

impl JobResult {
    /// Result for a job that was never handed to a worker
    pub fn abandoned(job: Job) -> Self {
        Self {
            worker: None,
            job,
            outcome: JobOutcome::Failed(JobFailure::Abandoned),
            attempts: 0,
            elapsed: Duration::ZERO,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }
}

impl fmt::Display for JobResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let worker = match self.worker {
            Some(id) => format!("worker {}", id),
            None => "no worker".to_string(),
        };
        match &self.outcome {
            JobOutcome::Success(success) => write!(
                f,
                "{} -> {} ({}, {} attempts, {:?})",
                self.job, success.status, worker, self.attempts, self.elapsed
            ),
            JobOutcome::Failed(failure) => write!(
                f,
                "{} -> {} ({}, {} attempts, {:?})",
                self.job, failure, worker, self.attempts, self.elapsed
            ),
        }
    }
}
