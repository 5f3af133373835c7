//! Prometheus metrics for the gateway.
//!
//! Each gateway instance owns its own [`Registry`], so several gateways in one
//! process (tests included) never collide on metric names.

use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::time::Duration;
use tracing::error;

/// Metrics configuration
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Histogram buckets for request latency, in seconds
    pub latency_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            latency_buckets: vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0],
        }
    }
}

/// Gateway collectors
pub struct Metrics {
    registry: Registry,
    requests_total: CounterVec,
    errors_total: CounterVec,
    cache_lookups: CounterVec,
    provider_calls: CounterVec,
    request_duration: HistogramVec,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

impl Metrics {
    /// Create a new metrics instance
    ///
    /// # Errors
    /// Returns error if metrics cannot be registered
    pub fn new(config: &MetricsConfig) -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let requests_total = CounterVec::new(
            Opts::new("geocode_requests_total", "Gateway requests by operation and outcome"),
            &["operation", "outcome"],
        )?;
        registry.register(Box::new(requests_total.clone()))?;

        let errors_total = CounterVec::new(
            Opts::new("geocode_errors_total", "Gateway errors by kind"),
            &["kind"],
        )?;
        registry.register(Box::new(errors_total.clone()))?;

        let cache_lookups = CounterVec::new(
            Opts::new("geocode_cache_lookups_total", "Result cache lookups by result"),
            &["result"],
        )?;
        registry.register(Box::new(cache_lookups.clone()))?;

        let provider_calls = CounterVec::new(
            Opts::new("geocode_provider_calls_total", "Provider attempts by provider and result"),
            &["provider", "result"],
        )?;
        registry.register(Box::new(provider_calls.clone()))?;

        let request_duration = HistogramVec::new(
            HistogramOpts::new("geocode_request_duration_seconds", "Gateway request latency in seconds")
                .buckets(config.latency_buckets.clone()),
            &["operation"],
        )?;
        registry.register(Box::new(request_duration.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            errors_total,
            cache_lookups,
            provider_calls,
            request_duration,
        })
    }

    /// Create with default configuration
    ///
    /// # Errors
    /// Returns error if metrics cannot be registered
    pub fn with_defaults() -> Result<Self, prometheus::Error> {
        Self::new(&MetricsConfig::default())
    }

    /// Record a finished request. `outcome` is `found`, `not_found` or an
    /// error kind.
    pub fn record_request(&self, operation: &str, outcome: &str, latency: Duration) {
        self.requests_total
            .with_label_values(&[operation, outcome])
            .inc();
        self.request_duration
            .with_label_values(&[operation])
            .observe(latency.as_secs_f64());
    }

    /// Record an error by kind
    pub fn record_error(&self, kind: &str) {
        self.errors_total.with_label_values(&[kind]).inc();
    }

    /// Record how the cache served a lookup
    pub fn record_cache_lookup(&self, result: &str) {
        self.cache_lookups.with_label_values(&[result]).inc();
    }

    /// Record one provider attempt
    pub fn record_provider_call(&self, provider: &str, result: &str) {
        self.provider_calls
            .with_label_values(&[provider, result])
            .inc();
    }

    /// Get metrics as Prometheus text format
    #[must_use]
    pub fn gather(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();

        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            error!(error = %e, "Failed to encode metrics");
            return String::new();
        }

        String::from_utf8(buffer).unwrap_or_default()
    }

    /// Get the Prometheus registry
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
