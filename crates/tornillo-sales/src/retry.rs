//! Retry with exponential back-off and jitter for idempotent sales API reads.
//!
//! Only the catalog reads and the create-or-fetch / fetch cart calls go
//! through [`retry_with_backoff`]. Line mutations and checkout are sent once:
//! a blind retry of checkout could submit the same order twice.

use std::future::Future;
use std::time::Duration;

use crate::error::SalesError;

/// Returns `true` for errors that are worth retrying after a back-off delay.
///
/// **Retriable:** network timeouts, connection failures and 5xx responses.
///
/// **Not retriable:** anything the backend answered deliberately (4xx,
/// rejection, not found), malformed bodies, and the in-flight checkout guard.
pub(crate) fn is_retriable(err: &SalesError) -> bool {
    match err {
        SalesError::Http(e) => {
            e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
        }
        SalesError::UnexpectedStatus { status, .. } => *status >= 500,
        SalesError::Deserialize { .. }
        | SalesError::InvalidBaseUrl { .. }
        | SalesError::Unauthorized { .. }
        | SalesError::NotFound { .. }
        | SalesError::Rejected { .. }
        | SalesError::CheckoutInProgress => false,
    }
}

/// Longest sleep between two attempts, jitter included.
const MAX_DELAY: Duration = Duration::from_secs(30);

/// Sleep before retry number `retry` (1-based): `base_ms * 2^(retry - 1)`,
/// scaled by `jitter` and capped at [`MAX_DELAY`].
fn backoff_delay(retry: u32, base_ms: u64, jitter: f64) -> Duration {
    let doubled = base_ms.saturating_mul(1u64 << retry.saturating_sub(1).min(10));
    Duration::from_millis(doubled)
        .min(MAX_DELAY)
        .mul_f64(jitter)
        .min(MAX_DELAY)
}

/// Calls `operation` until it succeeds, fails with a non-retriable error, or
/// has been retried `max_retries` times.
///
/// With `backoff_base_ms = 500` the sleeps are roughly 0.5 s, 1 s, 2 s, ...,
/// each scaled by a random factor in `[0.75, 1.25)` and never above 30 s.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, SalesError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SalesError>>,
{
    let mut retry = 0u32;
    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if retry < max_retries && is_retriable(&err) => err,
            Err(err) => return Err(err),
        };

        retry += 1;
        let delay = backoff_delay(retry, backoff_base_ms, rand::random_range(0.75..1.25));
        tracing::warn!(
            retry,
            max_retries,
            delay = ?delay,
            error = %err,
            "transient sales API failure; backing off"
        );
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;

    #[test]
    fn client_side_failures_are_not_retriable() {
        assert!(!is_retriable(&SalesError::Rejected {
            status: 409,
            message: "out of stock".to_owned()
        }));
        assert!(!is_retriable(&SalesError::NotFound {
            url: "http://x/sales/cart".to_owned()
        }));
        assert!(!is_retriable(&SalesError::Unauthorized {
            status: 401,
            url: "http://x/sales/cart".to_owned()
        }));
        assert!(!is_retriable(&SalesError::CheckoutInProgress));
    }

    #[test]
    fn server_errors_are_retriable() {
        assert!(is_retriable(&SalesError::UnexpectedStatus {
            status: 503,
            url: "http://x".to_owned()
        }));
        assert!(!is_retriable(&SalesError::UnexpectedStatus {
            status: 418,
            url: "http://x".to_owned()
        }));
    }

    #[test]
    fn backoff_doubles_per_retry_and_caps() {
        assert_eq!(backoff_delay(1, 500, 1.0), Duration::from_millis(500));
        assert_eq!(backoff_delay(2, 500, 1.0), Duration::from_millis(1_000));
        assert_eq!(backoff_delay(3, 500, 1.0), Duration::from_millis(2_000));
        assert_eq!(backoff_delay(3, 500, 0.75), Duration::from_millis(1_500));
        assert_eq!(backoff_delay(12, 500, 1.0), MAX_DELAY);
        assert_eq!(backoff_delay(7, 500, 1.24), MAX_DELAY);
        assert_eq!(backoff_delay(u32::MAX, u64::MAX, 1.0), MAX_DELAY);
        assert_eq!(backoff_delay(1, 0, 1.2), Duration::ZERO);
    }

    #[tokio::test]
    async fn succeeds_immediately_on_first_try() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(3, 0, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok::<u32, SalesError>(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn does_not_retry_rejections() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(3, 0, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(SalesError::Rejected {
                    status: 422,
                    message: "invalid payment".to_owned(),
                })
            }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1, "rejections must not be retried");
        assert!(matches!(result, Err(SalesError::Rejected { .. })));
    }

    #[tokio::test]
    async fn retries_server_errors_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(3, 0, || {
            let c = Arc::clone(&c);
            async move {
                let attempt = c.fetch_add(1, Ordering::SeqCst) + 1;
                if attempt < 3 {
                    Err::<u32, _>(SalesError::UnexpectedStatus {
                        status: 502,
                        url: "http://x".to_owned(),
                    })
                } else {
                    Ok(99)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 99);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(2, 0, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(SalesError::UnexpectedStatus {
                    status: 500,
                    url: "http://x".to_owned(),
                })
            }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(
            result,
            Err(SalesError::UnexpectedStatus { status: 500, .. })
        ));
    }
}
