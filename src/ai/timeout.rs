//! Per-attempt Timeouts
//!
//! Every provider call runs under its candidate's deadline. An elapsed deadline
//! is reported as a classified [`ErrorKind::Timeout`](crate::types::ErrorKind)
//! failure so the client can apply its retry-once policy. Auxiliary lookups use
//! [`with_timeout`], which surfaces the typed error instead.

use std::future::Future;
use std::time::Duration;

use crate::ai::provider::AttemptResult;
use crate::types::{InsightError, ProviderFailure, Result};

/// Run a provider attempt under `timeout`, turning expiry into a timeout failure
pub async fn attempt_with_timeout<F>(timeout: Duration, future: F) -> AttemptResult
where
    F: Future<Output = AttemptResult>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => AttemptResult::Failure(ProviderFailure::timeout(timeout)),
    }
}

/// Execute an async operation with a timeout
///
/// Returns a timeout error if the operation doesn't complete within the specified duration.
pub async fn with_timeout<T, F>(timeout: Duration, future: F, operation_name: &str) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => Err(InsightError::timeout(operation_name, timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ErrorKind;

    #[tokio::test]
    async fn test_attempt_passes_through() {
        let result = attempt_with_timeout(Duration::from_secs(1), async {
            AttemptResult::success("ok")
        })
        .await;
        assert_eq!(result, AttemptResult::success("ok"));
    }

    #[tokio::test]
    async fn test_attempt_expires_as_timeout_failure() {
        let result = attempt_with_timeout(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            AttemptResult::success("late")
        })
        .await;

        match result {
            AttemptResult::Failure(failure) => assert_eq!(failure.kind, ErrorKind::Timeout),
            other => panic!("expected timeout failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_with_timeout_expires() {
        let result = with_timeout(
            Duration::from_millis(10),
            async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok::<_, InsightError>(42)
            },
            "slow operation",
        )
        .await;
        assert!(matches!(result, Err(InsightError::Timeout { .. })));
    }
}
