//! Timeout helpers for provider attempts and whole fallback chains.
//!
//! A single attempt that runs out of time is a provider-level
//! [`ProviderErrorKind::Timeout`](geocode_core::ProviderErrorKind::Timeout) and
//! may be retried. A chain that runs out of time is a terminal
//! [`GatewayError::Timeout`].

use geocode_core::{GatewayError, ProviderError};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Bound a whole fallback chain by `timeout`
///
/// # Errors
/// Returns `GatewayError::Timeout` if the chain does not complete in time
pub async fn chain_with_timeout<F, T>(timeout: Duration, chain: F) -> Result<T, GatewayError>
where
    F: Future<Output = Result<T, GatewayError>>,
{
    match tokio::time::timeout(timeout, chain).await {
        Ok(result) => result,
        Err(_) => {
            warn!(timeout_ms = timeout.as_millis() as u64, "Fallback chain timed out");
            Err(GatewayError::timeout(timeout))
        }
    }
}

/// Bound one provider attempt by the provider's own timeout
///
/// # Errors
/// Returns the attempt's own error, or a `Timeout` provider error if it does
/// not complete in time
pub async fn attempt_with_timeout<F, T>(
    provider: &str,
    timeout: Duration,
    attempt: F,
) -> Result<T, ProviderError>
where
    F: Future<Output = Result<T, ProviderError>>,
{
    match tokio::time::timeout(timeout, attempt).await {
        Ok(result) => result,
        Err(_) => Err(ProviderError::timeout(
            provider,
            format!("no response within {}ms", timeout.as_millis()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geocode_core::ProviderErrorKind;
    use tokio::time::sleep;

    #[tokio::test(start_paused = true)]
    async fn test_chain_timeout() {
        let result = chain_with_timeout(Duration::from_secs(1), async { Ok::<_, GatewayError>(42) }).await;
        assert_eq!(result.unwrap(), 42);

        let result: Result<u32, GatewayError> = chain_with_timeout(Duration::from_millis(50), async {
            sleep(Duration::from_secs(10)).await;
            Ok(1)
        })
        .await;
        match result {
            Err(GatewayError::Timeout { duration }) => {
                assert_eq!(duration, Duration::from_millis(50));
            }
            other => panic!("Expected timeout error, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_chain_error_passes_through() {
        let result: Result<u32, GatewayError> =
            chain_with_timeout(Duration::from_secs(1), async { Err(GatewayError::internal("boom")) }).await;
        assert!(matches!(result, Err(GatewayError::Internal { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_timeout_is_provider_error() {
        let result: Result<u32, ProviderError> = attempt_with_timeout(
            "amap",
            Duration::from_millis(100),
            async {
                sleep(Duration::from_secs(5)).await;
                Ok(1)
            },
        )
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::Timeout);
        assert_eq!(err.provider, "amap");
        assert!(err.is_retryable());
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_error_passes_through() {
        let result: Result<u32, ProviderError> = attempt_with_timeout(
            "google",
            Duration::from_secs(1),
            async { Err(ProviderError::not_found("google", "ZERO_RESULTS")) },
        )
        .await;
        assert_eq!(result.unwrap_err().kind, ProviderErrorKind::NotFound);
    }
}
