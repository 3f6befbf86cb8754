//! Fixed-cadence loop driver shared by the oracle, signer, relayer and
//! batch requester.

use crate::metrics;
use crate::retry;
use crate::shutdown::Shutdown;
use eyre::Result;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, error, info};

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum LoopError {
    /// Returned by a loop body that has nothing more to do
    #[error("Loop stopped gracefully")]
    GracefulStop,
}

fn is_graceful_stop(error: &eyre::Report) -> bool {
    error
        .chain()
        .any(|cause| cause.downcast_ref::<LoopError>() == Some(&LoopError::GracefulStop))
}

/// Run `body` every `interval` until shutdown.
///
/// The first iteration starts immediately. The wait before the next one is
/// `interval` minus the time the iteration took, so a slow iteration is
/// followed straight away by the next. Iteration errors are logged and the
/// loop carries on; only [`LoopError::GracefulStop`] or shutdown end it.
pub async fn run_loop<F, Fut>(
    name: &str,
    interval: Duration,
    shutdown: &Shutdown,
    mut body: F,
) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    info!(loop_name = name, interval_secs = interval.as_secs_f64(), "Loop started");

    loop {
        if shutdown.is_triggered() {
            break;
        }

        let started = Instant::now();
        let outcome = tokio::select! {
            biased;
            _ = shutdown.wait() => break,
            outcome = body() => outcome,
        };

        match outcome {
            Ok(()) => metrics::record_iteration(name, true),
            Err(e) if is_graceful_stop(&e) => {
                metrics::record_iteration(name, true);
                info!(loop_name = name, "Loop finished");
                return Ok(());
            }
            Err(e) if retry::is_cancelled(&e) => break,
            Err(e) => {
                metrics::record_iteration(name, false);
                error!(loop_name = name, error = ?e, "Loop iteration failed");
            }
        }

        let remaining = interval.saturating_sub(started.elapsed());
        debug!(
            loop_name = name,
            wait_ms = remaining.as_millis() as u64,
            "Waiting for next iteration"
        );
        tokio::select! {
            biased;
            _ = shutdown.wait() => break,
            _ = tokio::time::sleep(remaining) => {}
        }
    }

    info!(loop_name = name, "Loop stopped by shutdown");
    Ok(())
}
