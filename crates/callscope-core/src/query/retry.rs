//! Timeout and bounded retry for structural queries.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::error::{CoreError, CoreResult};

/// Retry settings applied to each structural query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub attempts: u32,
    /// Limit for a single attempt.
    pub timeout: Duration,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            timeout: Duration::from_secs(5),
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no waiting. Useful for in-process backends.
    pub fn once(timeout: Duration) -> Self {
        Self {
            attempts: 1,
            timeout,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }
}

/// Run `op` until it succeeds, fails permanently, or runs out of attempts.
///
/// Each attempt is bounded by `policy.timeout`; only transient errors are
/// retried, with doubling backoff capped at `policy.max_backoff`.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> CoreResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = CoreResult<T>>,
{
    let attempts = policy.attempts.max(1);
    let mut backoff = policy.initial_backoff;
    let mut attempt = 0;

    loop {
        attempt += 1;
        let outcome = match tokio::time::timeout(policy.timeout, op()).await {
            Ok(result) => result,
            Err(_) => Err(CoreError::QueryTimeout {
                query: label.to_string(),
                attempts: attempt,
            }),
        };

        match outcome {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < attempts => {
                warn!(query = label, attempt, error = %e, "Query failed, retrying");
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(policy.max_backoff);
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(attempts: u32) -> RetryPolicy {
        RetryPolicy {
            attempts,
            timeout: Duration::from_millis(200),
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
        }
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&fast_policy(3), "callers", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(CoreError::backend("connection reset"))
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_attempts() {
        let calls = AtomicU32::new(0);
        let result: CoreResult<()> = with_retry(&fast_policy(2), "callees", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(CoreError::backend("down")) }
        })
        .await;
        assert!(matches!(result, Err(CoreError::Backend(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let calls = AtomicU32::new(0);
        let result: CoreResult<()> = with_retry(&fast_policy(5), "chain", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(CoreError::InvalidGraph(1)) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timeout_reported() {
        let policy = RetryPolicy {
            attempts: 2,
            timeout: Duration::from_millis(5),
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(1),
        };
        let result: CoreResult<()> = with_retry(&policy, "blast", || async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(())
        })
        .await;
        match result {
            Err(CoreError::QueryTimeout { query, attempts }) => {
                assert_eq!(query, "blast");
                assert_eq!(attempts, 2);
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }
}
