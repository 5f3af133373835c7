//! Retry and fallback across the provider chain.
//!
//! For each usable provider in chain order the executor makes up to
//! `max(max_retries, 1)` attempts, each bounded by the provider's timeout and
//! separated by capped exponential backoff. `NotFound` and `InvalidCredential`
//! end the call immediately; any other error moves on to the next provider
//! once the retry budget is spent. The whole chain is bounded by a global
//! timeout.

use crate::retry::RetryPolicy;
use crate::timeout::{attempt_with_timeout, chain_with_timeout};
use geocode_core::{
    GatewayError, GatewayResult, GeocodeOutcome, GeocodeResult, GeocodingProvider, Operation,
    ProviderError, ProviderErrorKind,
};
use geocode_providers::ProviderRegistry;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Result of one provider attempt, as reported to an [`AttemptObserver`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptResult {
    /// The provider returned a location
    Success,
    /// The provider answered with no result
    NotFound,
    /// The attempt failed
    Failure(ProviderErrorKind),
}

impl AttemptResult {
    /// Label used for metrics
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::NotFound => "not_found",
            Self::Failure(kind) => kind.as_str(),
        }
    }
}

/// Callback invoked after every provider attempt
pub type AttemptObserver = Arc<dyn Fn(&str, Operation, AttemptResult) + Send + Sync>;

/// Executes a lookup against the provider chain
#[derive(Clone)]
pub struct FallbackExecutor {
    registry: Arc<ProviderRegistry>,
    retry: RetryPolicy,
    chain_timeout: Duration,
    observer: Option<AttemptObserver>,
}

impl fmt::Debug for FallbackExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FallbackExecutor")
            .field("retry", &self.retry)
            .field("chain_timeout", &self.chain_timeout)
            .field("providers", &self.registry.len())
            .finish()
    }
}

impl FallbackExecutor {
    /// Default bound for a whole chain
    pub const DEFAULT_CHAIN_TIMEOUT: Duration = Duration::from_secs(30);

    /// Create an executor over `registry`
    #[must_use]
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self {
            registry,
            retry: RetryPolicy::default(),
            chain_timeout: Self::DEFAULT_CHAIN_TIMEOUT,
            observer: None,
        }
    }

    /// Set the retry policy
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the global chain timeout
    #[must_use]
    pub fn with_chain_timeout(mut self, timeout: Duration) -> Self {
        self.chain_timeout = timeout;
        self
    }

    /// Set a callback invoked after every attempt
    #[must_use]
    pub fn with_observer(mut self, observer: AttemptObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// The registry this executor drives
    #[must_use]
    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// The global chain timeout
    #[must_use]
    pub fn chain_timeout(&self) -> Duration {
        self.chain_timeout
    }

    /// Run `call` against the provider chain.
    ///
    /// # Errors
    /// - `InvalidCredential` as soon as a provider rejects its credential
    /// - `ProvidersExhausted` with the last error of each provider tried
    /// - `Timeout` if the chain does not finish within the chain timeout
    pub async fn execute<F, Fut>(&self, operation: Operation, call: F) -> GatewayResult<GeocodeOutcome>
    where
        F: Fn(Arc<dyn GeocodingProvider>) -> Fut + Send + Sync,
        Fut: Future<Output = Result<GeocodeResult, ProviderError>> + Send,
    {
        chain_with_timeout(self.chain_timeout, self.run_chain(operation, &call)).await
    }

    async fn run_chain<F, Fut>(&self, operation: Operation, call: &F) -> GatewayResult<GeocodeOutcome>
    where
        F: Fn(Arc<dyn GeocodingProvider>) -> Fut + Send + Sync,
        Fut: Future<Output = Result<GeocodeResult, ProviderError>> + Send,
    {
        let chain = self.registry.fallback_chain();
        let mut attempts: Vec<ProviderError> = Vec::with_capacity(chain.len());

        for (position, provider) in chain.into_iter().enumerate() {
            let name = provider.name().to_string();
            // Another call may have disabled it since the chain was built
            if !self.registry.is_enabled(&name) {
                continue;
            }

            match self.try_provider(operation, provider, call).await {
                Ok(result) => {
                    self.registry.record_success(&name);
                    if position > 0 {
                        info!(provider = %name, operation = %operation, "Served by fallback provider");
                    }
                    return Ok(GeocodeOutcome::Found(result));
                }
                Err(err) if err.kind == ProviderErrorKind::NotFound => {
                    self.registry.record_success(&name);
                    debug!(provider = %name, operation = %operation, "No result for input");
                    return Ok(GeocodeOutcome::not_found(name));
                }
                Err(err) if err.kind == ProviderErrorKind::InvalidCredential => {
                    self.registry.disable_for_credential(&name, &err.message);
                    self.registry.record_failure(&name);
                    return Err(GatewayError::from(err));
                }
                Err(err) => {
                    self.registry.record_failure(&name);
                    warn!(
                        provider = %name,
                        operation = %operation,
                        kind = %err.kind,
                        "Provider exhausted; moving to next provider"
                    );
                    attempts.push(err);
                }
            }
        }

        Err(GatewayError::providers_exhausted(attempts))
    }

    async fn try_provider<F, Fut>(
        &self,
        operation: Operation,
        provider: Arc<dyn GeocodingProvider>,
        call: &F,
    ) -> Result<GeocodeResult, ProviderError>
    where
        F: Fn(Arc<dyn GeocodingProvider>) -> Fut + Send + Sync,
        Fut: Future<Output = Result<GeocodeResult, ProviderError>> + Send,
    {
        let max_attempts = RetryPolicy::attempts_for(provider.max_retries());
        let timeout = provider.timeout();
        let name = provider.name().to_string();
        let mut attempt: u32 = 0;

        loop {
            debug!(provider = %name, operation = %operation, attempt, "Calling provider");
            let result = attempt_with_timeout(&name, timeout, call(Arc::clone(&provider))).await;
            self.observe(&name, operation, &result);

            let err = match result {
                Ok(result) => return Ok(result),
                Err(err) if !err.is_retryable() => return Err(err),
                Err(err) => err,
            };

            attempt += 1;
            if attempt >= max_attempts {
                return Err(err);
            }
            let delay = self.retry.delay_for_attempt(attempt - 1);
            warn!(
                provider = %name,
                operation = %operation,
                attempt,
                max_attempts,
                kind = %err.kind,
                delay_ms = delay.as_millis() as u64,
                "Provider attempt failed; retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    fn observe(&self, provider: &str, operation: Operation, result: &Result<GeocodeResult, ProviderError>) {
        if let Some(observer) = &self.observer {
            let outcome = match result {
                Ok(_) => AttemptResult::Success,
                Err(err) if err.kind == ProviderErrorKind::NotFound => AttemptResult::NotFound,
                Err(err) => AttemptResult::Failure(err.kind),
            };
            observer(provider, operation, outcome);
        }
    }
}
