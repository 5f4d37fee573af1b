// ABOUTME: Bounded retry combinator shared by redaction and invite handling
// ABOUTME: Runs an async operation sequentially until it succeeds or the attempt budget is spent

use std::future::Future;

/// Attempts made by redaction and invite joins before giving up
pub const DEFAULT_ATTEMPTS: u32 = 3;

/// Result of a bounded retry run
#[derive(Debug)]
pub struct RetryOutcome<T> {
    /// Last value produced by the operation
    pub value: T,
    pub attempts: u32,
    pub succeeded: bool,
}

/// Run `op` up to `max_attempts` times, stopping at the first value that
/// satisfies `is_success`. Attempts are sequential with no delay between them.
pub async fn retry_until<T, F, Fut, P>(max_attempts: u32, mut op: F, is_success: P) -> RetryOutcome<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = T>,
    P: Fn(&T) -> bool,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        let value = op(attempt).await;
        if is_success(&value) {
            return RetryOutcome {
                value,
                attempts: attempt,
                succeeded: true,
            };
        }
        if attempt >= max_attempts {
            return RetryOutcome {
                value,
                attempts: attempt,
                succeeded: false,
            };
        }
        attempt += 1;
    }
}

/// [`retry_until`] for fallible operations: success means `Ok`, and every
/// failed attempt is logged under `operation`.
pub async fn retry_result<T, F, Fut>(
    operation: &'static str,
    max_attempts: u32,
    mut op: F,
) -> RetryOutcome<anyhow::Result<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let outcome = retry_until(
        max_attempts,
        |attempt| {
            let fut = op();
            async move {
                let result = fut.await;
                if let Err(e) = &result {
                    tracing::warn!(operation, attempt, error = %e, "Attempt failed");
                }
                result
            }
        },
        |result| result.is_ok(),
    )
    .await;

    if !outcome.succeeded {
        crate::metrics::record_retries_exhausted(operation);
    }
    outcome
}
