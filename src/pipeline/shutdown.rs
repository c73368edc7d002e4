//! Cancellation triggers
//!
//! The run has a single [`CancellationToken`]. These helpers fire it from a
//! timer or from Ctrl-C; every wait in the pipeline races against it.

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Cancels `cancel` once `deadline` has elapsed
///
/// The task ends early, without cancelling, if the token fires first or the
/// handle is aborted.
pub fn spawn_deadline(cancel: CancellationToken, deadline: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(deadline) => {
                tracing::warn!("Deadline of {:?} reached, cancelling run", deadline);
                cancel.cancel();
            }
        }
    })
}

/// Cancels `cancel` on the first Ctrl-C
pub fn cancel_on_ctrl_c(cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => {}
            signal = tokio::signal::ctrl_c() => match signal {
                Ok(()) => {
                    tracing::warn!("Interrupt received, cancelling run");
                    cancel.cancel();
                }
                Err(e) => tracing::error!("Failed to listen for Ctrl-C: {}", e),
            }
        }
    })
}
