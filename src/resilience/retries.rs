//! Fixed-interval bounded retries.
//!
//! # Responsibilities
//! - Repeat an operation up to a fixed budget with a constant pause
//! - Stop promptly when shutdown is requested, before and between attempts
//!
//! # Design Decisions
//! - No backoff growth: daemon warm-up has a predictable duration
//! - The last error is kept so the caller can report why the budget ran out

use std::future::Future;
use std::time::Duration;

use crate::lifecycle::Shutdown;

/// Retry budget.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub interval: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, interval: Duration) -> Self {
        Self { attempts, interval }
    }
}

/// Why a retried operation gave up.
#[derive(Debug)]
pub enum RetryError<E> {
    /// Shutdown was requested.
    Stopping,
    /// Every attempt failed; carries the last error.
    Exhausted { attempts: u32, last: Option<E> },
}

/// Run `op` until it succeeds, the budget runs out or shutdown begins.
pub async fn retry_fixed<T, E, F, Fut>(
    policy: RetryPolicy,
    shutdown: &Shutdown,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut last = None;
    for attempt in 1..=policy.attempts {
        if shutdown.is_stopping() {
            return Err(RetryError::Stopping);
        }
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) => last = Some(e),
        }
        if attempt < policy.attempts {
            tokio::select! {
                _ = tokio::time::sleep(policy.interval) => {}
                _ = shutdown.cancelled() => return Err(RetryError::Stopping),
            }
        }
    }
    Err(RetryError::Exhausted {
        attempts: policy.attempts,
        last,
    })
}
