//! Database retry logic
//!
//! Exponential backoff for transient "database is locked" errors.
//! Concurrent import jobs share the canonical tables with no in-process
//! lock; SQLite contention is expected and retried, any other error is
//! returned immediately.

use cubetriggers_common::{Error, Result};
use std::time::{Duration, Instant};

/// Retry a database operation until it succeeds or `max_wait_ms` elapses
///
/// Backoff starts at 10ms and doubles up to 1000ms per retry.
pub async fn retry_on_lock<F, Fut, T>(
    operation_name: &str,
    max_wait_ms: u64,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let start_time = Instant::now();
    let max_duration = Duration::from_millis(max_wait_ms);
    let mut attempt = 0u32;
    let mut backoff_ms = 10u64;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::debug!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = start_time.elapsed().as_millis() as u64,
                        "Database operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) => {
                let is_lock_error = matches!(
                    &err,
                    Error::Database(db_err) if db_err.to_string().contains("database is locked")
                );

                if !is_lock_error {
                    return Err(err);
                }

                let elapsed = start_time.elapsed();
                if elapsed >= max_duration {
                    tracing::error!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = elapsed.as_millis() as u64,
                        max_wait_ms,
                        "Database operation failed: max retry time exceeded"
                    );
                    return Err(Error::Internal(format!(
                        "Database locked after {} attempts ({} ms elapsed, max {} ms)",
                        attempt,
                        elapsed.as_millis(),
                        max_wait_ms
                    )));
                }

                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    backoff_ms,
                    "Database locked, will retry after backoff"
                );

                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms = (backoff_ms * 2).min(1000);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn first_try_success_is_passed_through() {
        let result = retry_on_lock("test", 100, || async { Ok::<_, Error>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn non_lock_errors_fail_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = retry_on_lock("test", 1000, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Error::NotFound("row".to_string())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
