//! Output module for pipeline results
//!
//! This module handles:
//! - The result record produced for every job
//! - Sinks that receive results as they arrive
//! - The run summary and its console rendering

mod result;
mod stats;
mod traits;

pub use result::{JobFailure, JobOutcome, JobResult};
pub use stats::RunSummary;
pub use traits::{
    CollectSink, ConsoleSink, FanoutSink, LogSink, OutputError, OutputResult, ResultSink,
};

use tokio::sync::mpsc;

/// Drains `results` into `sink` until the channel closes
///
/// The channel closes only once every producer has finished, so the sink
/// sees each result exactly once. A sink error stops the drain early.
///
/// # Returns
///
/// * `Ok(RunSummary)` - Every result was handled; the summary is not yet finished
/// * `Err(OutputError)` - The sink failed
pub async fn drain_results<S>(
    results: &mut mpsc::Receiver<JobResult>,
    sink: &mut S,
    total: usize,
) -> OutputResult<RunSummary>
where
    S: ResultSink + ?Sized,
{
    let mut summary = RunSummary::start(total);

    while let Some(result) = results.recv().await {
        summary.record(&result);
        sink.on_result(&result)?;
    }

    Ok(summary)
}
