//! Run summary
//!
//! Counts results by classification as the sink drains them.

use crate::output::JobResult;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::io::Write;
use std::time::{Duration, Instant};

/// Totals for one pipeline run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,

    /// Jobs submitted
    pub total: usize,

    /// Results received so far
    pub received: usize,

    pub succeeded: usize,

    /// Failure label -> count
    pub failures: BTreeMap<&'static str, usize>,

    /// Fetch attempts across all jobs
    pub attempts: u64,

    /// Whether the cancellation signal fired during the run
    pub cancelled: bool,

    pub elapsed: Duration,

    clock: Instant,
}

impl RunSummary {
    pub fn start(total: usize) -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            total,
            received: 0,
            succeeded: 0,
            failures: BTreeMap::new(),
            attempts: 0,
            cancelled: false,
            elapsed: Duration::ZERO,
            clock: Instant::now(),
        }
    }

    pub fn record(&mut self, result: &JobResult) {
        self.received += 1;
        self.attempts += u64::from(result.attempts);

        match result.outcome.failure() {
            None => self.succeeded += 1,
            Some(failure) => *self.failures.entry(failure.label()).or_insert(0) += 1,
        }
    }

    pub fn finish(&mut self, cancelled: bool) {
        self.finished_at = Some(Utc::now());
        self.elapsed = self.clock.elapsed();
        self.cancelled = cancelled;
    }

    pub fn failed(&self) -> usize {
        self.failures.values().sum()
    }

    /// Count for one failure label
    pub fn failures_of(&self, label: &str) -> usize {
        self.failures.get(label).copied().unwrap_or(0)
    }

    /// True when every submitted job produced exactly one result
    pub fn is_complete(&self) -> bool {
        self.received == self.total
    }

    pub fn write_to<W: Write + ?Sized>(&self, out: &mut W) -> std::io::Result<()> {
        writeln!(out, "=== Run Summary ===")?;
        writeln!(out, "  Started:   {}", self.started_at.to_rfc3339())?;
        if let Some(finished) = self.finished_at {
            writeln!(out, "  Finished:  {}", finished.to_rfc3339())?;
        }
        writeln!(out, "  Elapsed:   {:.2}s", self.elapsed.as_secs_f64())?;
        writeln!(out, "  Jobs:      {}", self.total)?;
        writeln!(out, "  Results:   {}", self.received)?;
        writeln!(out, "  Succeeded: {}", self.succeeded)?;
        writeln!(out, "  Failed:    {}", self.failed())?;
        for (label, count) in &self.failures {
            writeln!(out, "    {}: {}", label, count)?;
        }
        writeln!(out, "  Attempts:  {}", self.attempts)?;
        if self.cancelled {
            writeln!(out, "  Run was cancelled before completion")?;
        }

        let rate = if self.received > 0 {
            (self.succeeded as f64 / self.received as f64) * 100.0
        } else {
            0.0
        };
        writeln!(out, "Success Rate: {:.1}%", rate)
    }
}
