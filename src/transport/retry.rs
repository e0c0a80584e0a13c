//! Bounded retry for rate-limited calls
//!
//! A single attempt reports either a finished value or a request to be tried
//! again later. The loop waits `base * attempt` between attempts and gives up
//! after `max_retries` retries with the last body attached.

use crate::{Result, TransportError};
use std::future::Future;
use std::time::Duration;

/// Whether a call may be repeated after HTTP 429
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Reads and write actions whose 429 proves nothing happened
    Retryable,
    /// Binary uploads and configure calls; a repeat could publish twice
    SingleShot,
}

/// Outcome of one attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt<T> {
    Done(T),
    /// The platform asked us to slow down; carries the response body
    RetryAfter(String),
}

/// Run `op` until it yields [`Attempt::Done`] or the retry bound is hit
///
/// `op` receives the 1-based attempt number. Errors returned by `op` end the
/// loop immediately; only [`Attempt::RetryAfter`] is retried.
pub async fn retry_with_backoff<T, F, Fut>(max_retries: u32, base: Duration, mut op: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Attempt<T>>>,
{
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match op(attempt).await? {
            Attempt::Done(value) => return Ok(value),
            Attempt::RetryAfter(body) => {
                if attempt > max_retries {
                    tracing::error!("Rate limited; giving up after {} attempts", attempt);
                    return Err(TransportError::RateLimited {
                        attempts: attempt,
                        body,
                    }
                    .into());
                }
                let wait = base.saturating_mul(attempt);
                tracing::warn!(
                    "Rate limited (attempt {}/{}), waiting {}s",
                    attempt,
                    max_retries + 1,
                    wait.as_secs()
                );
                tokio::time::sleep(wait).await;
            }
        }
    }
}
