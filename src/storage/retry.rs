//! Bounded retry around single store operations.
//!
//! Each attempt runs under `RetryConfig::op_timeout`; an elapsed deadline is
//! a transient failure like any network error. Transient failures back off
//! exponentially (`base * 2^(attempt-1)`, capped at `max_backoff`) until
//! `max_attempts` is reached.

use crate::logs::error::{LogStoreError, LogStoreResult, StoreOp};
use crate::storage::config::RetryConfig;
use std::future::Future;
use std::io::{Error as IoError, ErrorKind, Result as IoResult};
use std::time::Duration;
use tracing::warn;

/// Delay before attempt `attempt + 1`, given that `attempt` (1-based) just failed
pub fn backoff_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let exp = attempt.saturating_sub(1).min(16);
    config
        .base_backoff
        .saturating_mul(1u32 << exp)
        .min(config.max_backoff)
}

/// Run one store attempt under the configured deadline
pub async fn with_timeout<T, Fut>(config: &RetryConfig, fut: Fut) -> IoResult<T>
where
    Fut: Future<Output = IoResult<T>>,
{
    match tokio::time::timeout(config.op_timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(IoError::new(
            ErrorKind::TimedOut,
            format!("operation exceeded {:?}", config.op_timeout),
        )),
    }
}

/// Run `op` until it succeeds, fails permanently, or attempts run out.
///
/// `make_attempt` is called once per attempt and must repeat the same request;
/// the writer relies on this to rewrite an unacknowledged batch under the
/// same key.
pub async fn with_retry<T, F, Fut>(
    config: &RetryConfig,
    op: StoreOp,
    key: &str,
    mut make_attempt: F,
) -> LogStoreResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = IoResult<T>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        let err = match with_timeout(config, make_attempt()).await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        match LogStoreError::classify(op, key, err, attempt) {
            LogStoreError::StorageTransient { source, .. } if attempt < max_attempts => {
                let delay = backoff_delay(config, attempt);
                warn!(
                    op = %op,
                    key,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %source,
                    "Transient store failure, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            LogStoreError::StorageTransient { source, .. } => {
                return Err(LogStoreError::exhausted(op, key, source, attempt));
            }
            other => return Err(other),
        }
    }
}
