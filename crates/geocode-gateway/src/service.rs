//! The gateway service.
//!
//! Every lookup runs the same pipeline: rate limiter, then cache fingerprint,
//! then the cache, which on a miss drives the fallback executor over the
//! provider registry and stores a found result. Statistics are atomics and
//! per-entry counters, so reading them never waits on a lookup.

use crate::stats::{ErrorCounters, GatewayStats};
use geocode_core::{
    ErrorKind, GatewayError, GatewayResult, GeocodeOutcome, GeocodeRequest, HealthStatus,
    Operation, ReverseGeocodeRequest,
};
use geocode_providers::ProviderRegistry;
use geocode_resilience::{
    AttemptObserver, AttemptResult, CacheConfig, FallbackExecutor, RateLimiter, RateLimiterConfig,
    ResultCache, RetryPolicy,
};
use geocode_telemetry::Metrics;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Health snapshot returned by [`GeocodingGateway::health`]
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    /// Aggregate status
    pub status: HealthStatus,
    /// Seconds since the gateway was built
    pub uptime_seconds: u64,
    /// Providers currently usable
    pub providers_enabled: usize,
    /// Providers configured
    pub providers_total: usize,
}

/// Geocoding gateway: rate limiting, caching and provider fallback behind
/// one entry point
#[derive(Clone)]
pub struct GeocodingGateway {
    inner: Arc<GatewayInner>,
}

struct GatewayInner {
    registry: Arc<ProviderRegistry>,
    executor: FallbackExecutor,
    cache: ResultCache,
    limiter: RateLimiter,
    metrics: Arc<Metrics>,
    requests: AtomicU64,
    errors: ErrorCounters,
    started_at: Instant,
}

impl fmt::Debug for GeocodingGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeocodingGateway")
            .field("executor", &self.inner.executor)
            .field("cache", &self.inner.cache)
            .field("limiter", &self.inner.limiter)
            .finish_non_exhaustive()
    }
}

impl GeocodingGateway {
    /// Create a new gateway builder
    #[must_use]
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder::new()
    }

    /// Forward geocoding for an anonymous caller
    ///
    /// # Errors
    /// See [`GeocodingGateway::geocode_for`]
    pub async fn geocode(&self, request: &GeocodeRequest) -> GatewayResult<GeocodeOutcome> {
        self.geocode_for(None, request).await
    }

    /// Forward geocoding with a caller key for per-client rate limiting
    ///
    /// # Errors
    /// - `RateLimited` if the caller's window is full
    /// - `InvalidCredential`, `ProvidersExhausted` or `Timeout` from the
    ///   provider chain
    pub async fn geocode_for(
        &self,
        client: Option<&str>,
        request: &GeocodeRequest,
    ) -> GatewayResult<GeocodeOutcome> {
        let started = Instant::now();
        let result = self.lookup_geocode(client, request).await;
        self.finish(Operation::Geocode, &result, started);
        result
    }

    /// Reverse geocoding for an anonymous caller
    ///
    /// # Errors
    /// See [`GeocodingGateway::reverse_geocode_for`]
    pub async fn reverse_geocode(
        &self,
        request: &ReverseGeocodeRequest,
    ) -> GatewayResult<GeocodeOutcome> {
        self.reverse_geocode_for(None, request).await
    }

    /// Reverse geocoding with a caller key for per-client rate limiting
    ///
    /// # Errors
    /// - `RateLimited` if the caller's window is full
    /// - `InvalidCredential`, `ProvidersExhausted` or `Timeout` from the
    ///   provider chain
    pub async fn reverse_geocode_for(
        &self,
        client: Option<&str>,
        request: &ReverseGeocodeRequest,
    ) -> GatewayResult<GeocodeOutcome> {
        let started = Instant::now();
        let result = self.lookup_reverse(client, request).await;
        self.finish(Operation::ReverseGeocode, &result, started);
        result
    }

    async fn lookup_geocode(
        &self,
        client: Option<&str>,
        request: &GeocodeRequest,
    ) -> GatewayResult<GeocodeOutcome> {
        self.inner.limiter.check(client).await?;

        let key = self.inner.cache.key_for_geocode(request);
        let executor = self.inner.executor.clone();
        let request = request.clone();
        let (result, lookup) = self
            .inner
            .cache
            .get_or_resolve(key, move || async move {
                executor
                    .execute(Operation::Geocode, move |provider| {
                        let request = request.clone();
                        async move { provider.geocode(&request).await }
                    })
                    .await
            })
            .await;
        self.inner.metrics.record_cache_lookup(lookup.as_str());
        result
    }

    async fn lookup_reverse(
        &self,
        client: Option<&str>,
        request: &ReverseGeocodeRequest,
    ) -> GatewayResult<GeocodeOutcome> {
        self.inner.limiter.check(client).await?;

        let key = self.inner.cache.key_for_reverse(request);
        let executor = self.inner.executor.clone();
        let request = *request;
        let (result, lookup) = self
            .inner
            .cache
            .get_or_resolve(key, move || async move {
                executor
                    .execute(Operation::ReverseGeocode, move |provider| async move {
                        provider.reverse_geocode(&request).await
                    })
                    .await
            })
            .await;
        self.inner.metrics.record_cache_lookup(lookup.as_str());
        result
    }

    fn finish(&self, operation: Operation, result: &GatewayResult<GeocodeOutcome>, started: Instant) {
        self.inner.requests.fetch_add(1, Ordering::Relaxed);
        let outcome = match result {
            Ok(GeocodeOutcome::Found(_)) => "found",
            Ok(GeocodeOutcome::NotFound { .. }) => "not_found",
            Err(err) => {
                self.record_error(err.kind());
                err.kind().as_str()
            }
        };
        debug!(operation = %operation, outcome, elapsed_ms = started.elapsed().as_millis() as u64, "Lookup finished");
        self.inner
            .metrics
            .record_request(operation.as_str(), outcome, started.elapsed());
    }

    /// Count a request that was rejected before reaching the gateway pipeline,
    /// such as one whose body failed validation
    pub fn record_rejected(&self, operation: Operation, err: &GatewayError) {
        self.count_rejection(operation.as_str(), err);
    }

    pub(crate) fn count_rejection(&self, label: &str, err: &GatewayError) {
        self.inner.requests.fetch_add(1, Ordering::Relaxed);
        self.record_error(err.kind());
        self.inner
            .metrics
            .record_request(label, err.kind().as_str(), Duration::ZERO);
    }

    fn record_error(&self, kind: ErrorKind) {
        self.inner.errors.record(kind);
        self.inner.metrics.record_error(kind.as_str());
    }

    /// Process-wide statistics
    pub async fn stats(&self) -> GatewayStats {
        GatewayStats {
            uptime_seconds: self.uptime().as_secs(),
            requests_total: self.inner.requests.load(Ordering::Relaxed),
            errors_total: self.inner.errors.total(),
            errors_by_kind: self.inner.errors.snapshot(),
            cache: self.inner.cache.stats(),
            rate_limiter: self.inner.limiter.stats().await,
            providers: self.inner.registry.stats(),
        }
    }

    /// Health from provider enablement; no backend is contacted
    #[must_use]
    pub fn health(&self) -> HealthReport {
        let providers_enabled = self.inner.registry.enabled_count();
        let providers_total = self.inner.registry.len();
        HealthReport {
            status: HealthStatus::from_counts(providers_enabled, providers_total),
            uptime_seconds: self.uptime().as_secs(),
            providers_enabled,
            providers_total,
        }
    }

    /// Drop expired cache entries and idle rate-limit windows, returning how
    /// many of each were removed
    pub async fn run_maintenance(&self, max_idle: Duration) -> (usize, usize) {
        let expired = self.inner.cache.cleanup_expired();
        let windows = self.inner.limiter.cleanup(max_idle).await;
        if expired > 0 || windows > 0 {
            debug!(expired, windows, "Maintenance pass finished");
        }
        (expired, windows)
    }

    /// Time since the gateway was built
    #[must_use]
    pub fn uptime(&self) -> Duration {
        self.inner.started_at.elapsed()
    }

    /// The provider registry
    #[must_use]
    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.inner.registry
    }

    /// The result cache
    #[must_use]
    pub fn cache(&self) -> &ResultCache {
        &self.inner.cache
    }

    /// The metrics collectors
    #[must_use]
    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.inner.metrics
    }
}

/// Builder for [`GeocodingGateway`]
#[derive(Default)]
pub struct GatewayBuilder {
    registry: Option<Arc<ProviderRegistry>>,
    cache: Option<CacheConfig>,
    rate_limiter: Option<RateLimiterConfig>,
    retry_policy: Option<RetryPolicy>,
    chain_timeout: Option<Duration>,
    metrics: Option<Arc<Metrics>>,
}

impl GatewayBuilder {
    /// Create a new builder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the provider registry
    #[must_use]
    pub fn registry(mut self, registry: Arc<ProviderRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Set the cache configuration
    #[must_use]
    pub fn cache(mut self, config: CacheConfig) -> Self {
        self.cache = Some(config);
        self
    }

    /// Set the rate limiter configuration
    #[must_use]
    pub fn rate_limiter(mut self, config: RateLimiterConfig) -> Self {
        self.rate_limiter = Some(config);
        self
    }

    /// Set the retry policy
    #[must_use]
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    /// Set the chain timeout
    #[must_use]
    pub fn chain_timeout(mut self, timeout: Duration) -> Self {
        self.chain_timeout = Some(timeout);
        self
    }

    /// Set the metrics collectors
    #[must_use]
    pub fn metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Build the gateway
    ///
    /// # Errors
    /// Returns `Internal` if the metrics collectors cannot be registered
    pub fn build(self) -> GatewayResult<GeocodingGateway> {
        let registry = self.registry.unwrap_or_default();
        let metrics = match self.metrics {
            Some(metrics) => metrics,
            None => Arc::new(
                Metrics::with_defaults()
                    .map_err(|e| GatewayError::internal(format!("metrics registration failed: {e}")))?,
            ),
        };

        let observer_metrics = Arc::clone(&metrics);
        let observer: AttemptObserver = Arc::new(move |provider: &str, _operation: Operation, result: AttemptResult| {
            observer_metrics.record_provider_call(provider, result.as_str());
        });

        let executor = FallbackExecutor::new(Arc::clone(&registry))
            .with_retry_policy(self.retry_policy.unwrap_or_default())
            .with_chain_timeout(self.chain_timeout.unwrap_or(FallbackExecutor::DEFAULT_CHAIN_TIMEOUT))
            .with_observer(observer);
        let cache = ResultCache::new(self.cache.unwrap_or_default());
        let limiter = RateLimiter::new(self.rate_limiter.unwrap_or_default());

        info!(
            providers = registry.len(),
            enabled = registry.enabled_count(),
            cache_enabled = cache.is_enabled(),
            rate_limit_enabled = limiter.is_enabled(),
            "Geocoding gateway ready"
        );

        Ok(GeocodingGateway {
            inner: Arc::new(GatewayInner {
                registry,
                executor,
                cache,
                limiter,
                metrics,
                requests: AtomicU64::new(0),
                errors: ErrorCounters::default(),
                started_at: Instant::now(),
            }),
        })
    }
}
