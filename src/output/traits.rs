//! Result sink trait and the built-in sinks
//!
//! A sink receives every result exactly once, in arrival order, and the run
//! summary once the results channel has closed.

use crate::output::{JobResult, RunSummary};
use std::io::Write;
use thiserror::Error;

/// Errors that can occur while handling results
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Caller-defined handling for pipeline results
pub trait ResultSink: Send {
    /// Called once per job result
    fn on_result(&mut self, result: &JobResult) -> OutputResult<()>;

    /// Called once after the last result
    fn finish(&mut self, _summary: &RunSummary) -> OutputResult<()> {
        Ok(())
    }
}

impl<F> ResultSink for F
where
    F: FnMut(&JobResult) + Send,
{
    fn on_result(&mut self, result: &JobResult) -> OutputResult<()> {
        self(result);
        Ok(())
    }
}

/// Logs each result through `tracing`
///
/// Successes and cancellations log at debug level, other failures at warn.
#[derive(Debug, Default)]
pub struct LogSink;

impl ResultSink for LogSink {
    fn on_result(&mut self, result: &JobResult) -> OutputResult<()> {
        match result.outcome.failure() {
            None => tracing::debug!(
                job = %result.job.id(),
                worker = ?result.worker,
                attempts = result.attempts,
                "{}",
                result
            ),
            Some(failure) if failure.is_cancellation() => tracing::debug!(
                job = %result.job.id(),
                worker = ?result.worker,
                "{}",
                result
            ),
            Some(_) => tracing::warn!(
                job = %result.job.id(),
                worker = ?result.worker,
                attempts = result.attempts,
                "{}",
                result
            ),
        }
        Ok(())
    }

    fn finish(&mut self, summary: &RunSummary) -> OutputResult<()> {
        tracing::info!(
            "Run finished: {} of {} jobs succeeded in {:?}",
            summary.succeeded,
            summary.total,
            summary.elapsed
        );
        Ok(())
    }
}

/// Writes one line per result, then the summary, to any writer
pub struct ConsoleSink<W: Write + Send> {
    writer: W,
}

impl ConsoleSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> ConsoleSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> ResultSink for ConsoleSink<W> {
    fn on_result(&mut self, result: &JobResult) -> OutputResult<()> {
        let marker = if result.is_success() { "ok  " } else { "FAIL" };
        writeln!(self.writer, "{} {}", marker, result)?;
        Ok(())
    }

    fn finish(&mut self, summary: &RunSummary) -> OutputResult<()> {
        writeln!(self.writer)?;
        summary.write_to(&mut self.writer)?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Keeps every result in memory
#[derive(Debug, Default)]
pub struct CollectSink {
    pub results: Vec<JobResult>,
}

impl ResultSink for CollectSink {
    fn on_result(&mut self, result: &JobResult) -> OutputResult<()> {
        self.results.push(result.clone());
        Ok(())
    }
}

/// Fans each result out to several sinks in order
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Box<dyn ResultSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl ResultSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }
}

impl ResultSink for FanoutSink {
    fn on_result(&mut self, result: &JobResult) -> OutputResult<()> {
        for sink in &mut self.sinks {
            sink.on_result(result)?;
        }
        Ok(())
    }

    fn finish(&mut self, summary: &RunSummary) -> OutputResult<()> {
        for sink in &mut self.sinks {
            sink.finish(summary)?;
        }
        Ok(())
    }
}
