//! Bounded retry with exponential backoff
//!
//! [`with_retry`] knows nothing about logging; callers pass an `on_retry`
//! hook that decides what to report. The loops use [`retry_logged`].
//! Structural failures (a confirmation set that cannot pass the threshold,
//! a relay transaction that reverted or is still in flight) and shutdown
//! are returned immediately without further attempts.

use crate::shutdown::Shutdown;
use eyre::{Result, WrapErr};
use peggy_rs::{RelayTxError, SignatureError};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RetryError {
    #[error("Cancelled by shutdown")]
    Cancelled,
}

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Backoff after the first failure
    pub initial_backoff: Duration,
    /// Upper bound for any single backoff
    pub max_backoff: Duration,
    /// Backoff multiplier for exponential growth
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// Calculate backoff duration for a given attempt (0-indexed)
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let backoff_secs =
            self.initial_backoff.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32);
        let capped = backoff_secs.min(self.max_backoff.as_secs_f64());
        Duration::from_secs_f64(capped)
    }
}

/// True for errors that retrying cannot fix
pub fn is_permanent(error: &eyre::Report) -> bool {
    error.chain().any(|cause| {
        cause.downcast_ref::<SignatureError>().is_some()
            || cause.downcast_ref::<RelayTxError>().is_some()
            || cause.downcast_ref::<RetryError>().is_some()
    })
}

/// True when the error only reports that shutdown was requested
pub fn is_cancelled(error: &eyre::Report) -> bool {
    error
        .chain()
        .any(|cause| cause.downcast_ref::<RetryError>() == Some(&RetryError::Cancelled))
}

/// Run `operation` until it succeeds, fails permanently or runs out of attempts.
///
/// `on_retry(attempt, error)` is called after each failed attempt that will
/// be retried, with the 1-based number of the attempt that failed.
pub async fn with_retry<F, Fut, T, L>(
    config: &RetryConfig,
    shutdown: &Shutdown,
    mut operation: F,
    mut on_retry: L,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    L: FnMut(u32, &eyre::Report),
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0u32;

    loop {
        if shutdown.is_triggered() {
            return Err(RetryError::Cancelled.into());
        }

        let result = tokio::select! {
            biased;
            _ = shutdown.wait() => return Err(RetryError::Cancelled.into()),
            result = operation() => result,
        };

        let error = match result {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        attempt += 1;
        if is_permanent(&error) {
            return Err(error);
        }
        if attempt >= max_attempts {
            return Err(error.wrap_err(format!("Giving up after {} attempts", attempt)));
        }

        on_retry(attempt, &error);

        let backoff = config.backoff_for_attempt(attempt - 1);
        tokio::select! {
            biased;
            _ = shutdown.wait() => return Err(RetryError::Cancelled.into()),
            _ = tokio::time::sleep(backoff) => {}
        }
    }
}

/// [`with_retry`] with a warning per failed attempt, wrapping the final
/// error with `action`
pub async fn retry_logged<F, Fut, T>(
    config: &RetryConfig,
    shutdown: &Shutdown,
    loop_name: &str,
    action: &str,
    operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    with_retry(config, shutdown, operation, |attempt, error| {
        warn!(
            loop_name,
            action,
            attempt,
            max_attempts = config.max_attempts,
            error = %error,
            "Chain call failed, retrying"
        )
    })
    .await
    .wrap_err_with(|| format!("{} failed", action))
}
