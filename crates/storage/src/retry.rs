//! Retry of adapter calls that fail transiently.
//!
//! The auth state layer routes every `load`, `store` and `delete` through
//! [`with_retry`]. Connection failures and timeouts are retried with
//! exponential backoff; any other error is returned on the first attempt.
//!
//! The delay before retry `n` (zero-based) is
//! `min(initial_backoff * 2^n, max_backoff)` plus up to half of that again
//! as random jitter.

use std::{future::Future, time::Duration};

use fail::fail_point;
use rand::Rng;

use crate::{config::RetryConfig, error::StorageResult};

/// Runs `operation` until it succeeds, fails permanently, or runs out of
/// retries.
///
/// `operation_name` only labels log events.
///
/// # Errors
///
/// Returns the first non-transient error, or the last transient error once
/// `config.max_retries()` retries have been spent.
#[tracing::instrument(skip(config, operation), fields(max_retries = config.max_retries))]
pub async fn with_retry<F, Fut, T>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> StorageResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = StorageResult<T>>,
{
    let mut attempt = 0;
    loop {
        let err = match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    tracing::debug!(
                        operation = operation_name,
                        attempts = attempt + 1,
                        "adapter call recovered"
                    );
                }
                return Ok(value);
            },
            Err(err) => err,
        };

        if !err.is_transient() {
            return Err(err);
        }
        if attempt >= config.max_retries {
            if attempt > 0 {
                tracing::warn!(
                    operation = operation_name,
                    attempts = attempt + 1,
                    error = %err,
                    "giving up on adapter call",
                );
            }
            return Err(err);
        }

        let delay = compute_backoff(config, attempt);
        tracing::debug!(
            operation = operation_name,
            attempt = attempt + 1,
            ?delay,
            error = %err,
            "adapter call failed, backing off",
        );
        fail_point!("retry-before-sleep");
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

/// Delay before retry number `attempt` (zero-based), jitter included.
pub(crate) fn compute_backoff(config: &RetryConfig, attempt: u32) -> Duration {
    let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
    let delay = config.initial_backoff.saturating_mul(factor).min(config.max_backoff);

    let half_ms = u64::try_from(delay.as_millis() / 2).unwrap_or(u64::MAX);
    if half_ms == 0 {
        return delay;
    }
    delay + Duration::from_millis(rand::rng().random_range(0..=half_ms))
}
