//! Bounded retry with exponential backoff and jitter, applied inside the
//! circuit breaker so a retried-successful call counts as a single success.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::RetryProfileConfig;
use crate::errors::ClientError;

/// Runs `operation` up to `config.max_attempts` times, stopping early on a
/// non-retryable error. Delay between attempts grows exponentially from
/// `base_wait` by `multiplier`, with up to 25% jitter.
pub async fn with_retry<T, F, Fut>(
    config: &RetryProfileConfig,
    operation_name: &str,
    mut operation: F,
) -> Result<T, ClientError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ClientError>>,
{
    let mut last_error = None;

    for attempt in 1..=config.max_attempts.max(1) {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let retryable = err.is_retryable();
                debug!(operation_name, attempt, retryable, "operation attempt failed");
                if !retryable || attempt == config.max_attempts {
                    last_error = Some(err);
                    break;
                }
                let delay = calculate_delay(config, attempt);
                warn!(
                    operation_name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "retrying after failure"
                );
                tokio::time::sleep(delay).await;
                last_error = Some(err);
            }
        }
    }

    Err(last_error.unwrap_or(ClientError::Other {
        message: "retry loop exited without an attempt".to_string(),
    }))
}

fn calculate_delay(config: &RetryProfileConfig, attempt: u32) -> Duration {
    let base_ms = config.base_wait.as_millis() as f64;
    let exponential_ms = base_ms * config.multiplier.powi(attempt as i32 - 1);
    let jitter_range = ((exponential_ms as u64) / 4).max(10);
    let jitter_ms = fastrand::u64(0..=jitter_range);
    Duration::from_millis(exponential_ms as u64 + jitter_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn fast_config(max_attempts: u32) -> RetryProfileConfig {
        RetryProfileConfig {
            max_attempts,
            base_wait: Duration::from_millis(1),
            multiplier: 2.0,
        }
    }

    #[tokio::test]
    async fn succeeds_on_second_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();
        let result = with_retry(&fast_config(3), "test_op", move || {
            let calls = calls_clone.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n == 0 {
                    Err(ClientError::Timeout)
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn does_not_retry_non_retryable_errors() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();
        let result: Result<(), ClientError> = with_retry(&fast_config(3), "test_op", move || {
            let calls = calls_clone.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ClientError::NotFound {
                    resource: "x".into(),
                })
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn succeeds_immediately_without_retry_via_block_on() {
        let result: Result<i32, ClientError> =
            tokio_test::block_on(with_retry(&fast_config(3), "test_op", || async { Ok(7) }));
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_delay_advances_on_virtual_time_without_real_waiting() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();
        let handle = tokio::spawn(async move {
            with_retry(&fast_config(2), "test_op", move || {
                let calls = calls_clone.clone();
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    if n == 0 {
                        Err(ClientError::Timeout)
                    } else {
                        Ok(())
                    }
                }
            })
            .await
        });

        tokio::time::advance(Duration::from_secs(5)).await;
        let result = handle.await.unwrap();
        assert!(result.is_ok());
    }

    #[test_log::test(tokio::test)]
    async fn exhausts_all_attempts_then_fails() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();
        let result: Result<(), ClientError> = with_retry(&fast_config(3), "test_op", move || {
            let calls = calls_clone.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ClientError::Timeout)
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
