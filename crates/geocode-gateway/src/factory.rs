//! Construction of a gateway from a validated configuration.
//!
//! Nothing here reads the environment or the file system; credentials and
//! overrides are resolved by the configuration loader beforehand.

use crate::service::GeocodingGateway;
use geocode_config::{GatewayConfig, ProviderConfig as ProviderSettings, RateLimitScope as ScopeSetting};
use geocode_core::{GatewayError, GatewayResult, GeocodingProvider, ProviderType};
use geocode_providers::{AmapProvider, BaiduProvider, GoogleProvider, ProviderConfig, ProviderRegistry};
use geocode_resilience::{CacheConfig, RateLimitScope, RateLimiterConfig, RetryPolicy};
use geocode_telemetry::Metrics;
use std::sync::Arc;
use tracing::info;

impl GeocodingGateway {
    /// Build the provider clients, registry, executor, cache, limiter and
    /// metrics described by `config`
    ///
    /// # Errors
    /// Returns `Configuration` if the configuration is invalid, names an
    /// unsupported provider type or lacks a credential for an enabled provider
    pub fn from_config(config: &GatewayConfig) -> GatewayResult<Self> {
        config
            .validate_config()
            .map_err(|e| GatewayError::configuration(e.to_string()))?;

        let registry = Arc::new(ProviderRegistry::new());
        for settings in &config.providers {
            let provider = build_provider(settings)?;
            registry.register(provider, settings.enabled)?;
        }
        if let Some(default) = config.routing.default_provider.as_deref() {
            registry.set_default(default)?;
        }
        if !config.routing.fallback_order.is_empty() {
            registry.set_fallback_order(config.routing.fallback_order.clone())?;
        }

        let metrics = Metrics::with_defaults()
            .map_err(|e| GatewayError::internal(format!("metrics registration failed: {e}")))?;

        let retry = &config.resilience.retry;
        let gateway = GeocodingGateway::builder()
            .registry(registry)
            .retry_policy(RetryPolicy::new(retry.base_delay, retry.max_delay))
            .chain_timeout(config.resilience.chain_timeout)
            .cache(CacheConfig {
                enabled: config.cache.enabled,
                max_entries: config.cache.max_entries,
                ttl: config.cache.ttl,
                coordinate_precision: config.cache.coordinate_precision,
            })
            .rate_limiter(RateLimiterConfig {
                enabled: config.rate_limit.enabled,
                max_requests: config.rate_limit.max_requests,
                window: config.rate_limit.window,
                scope: match config.rate_limit.scope {
                    ScopeSetting::Global => RateLimitScope::Global,
                    ScopeSetting::PerClient => RateLimitScope::PerClient,
                },
            })
            .metrics(Arc::new(metrics))
            .build()?;

        info!(chain = ?gateway.registry().chain_names(), "Gateway built from configuration");
        Ok(gateway)
    }
}

/// Instantiate the client for one configured provider
fn build_provider(settings: &ProviderSettings) -> GatewayResult<Arc<dyn GeocodingProvider>> {
    let api_key = match settings.api_key() {
        Some(key) => key.to_string(),
        None if !settings.enabled => String::new(),
        None => {
            return Err(GatewayError::configuration(format!(
                "provider '{}' has no api_key",
                settings.name
            )))
        }
    };

    let client_config = |default_base_url: &str| {
        ProviderConfig::new(
            settings.name.clone(),
            api_key.clone(),
            settings.base_url.clone().unwrap_or_else(|| default_base_url.to_string()),
        )
        .with_timeout(settings.timeout)
        .with_max_retries(settings.max_retries)
        .with_enabled(settings.enabled)
    };

    let provider: Arc<dyn GeocodingProvider> = match settings.provider_type {
        ProviderType::Amap => Arc::new(AmapProvider::new(client_config(AmapProvider::DEFAULT_BASE_URL))?),
        ProviderType::Baidu => Arc::new(BaiduProvider::new(client_config(BaiduProvider::DEFAULT_BASE_URL))?),
        ProviderType::Google => Arc::new(GoogleProvider::new(client_config(GoogleProvider::DEFAULT_BASE_URL))?),
        ProviderType::Custom => {
            return Err(GatewayError::configuration(format!(
                "provider '{}': custom providers must be registered programmatically",
                settings.name
            )))
        }
    };
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geocode_core::HealthStatus;

    fn config_with(providers: Vec<ProviderSettings>) -> GatewayConfig {
        GatewayConfig {
            providers,
            ..GatewayConfig::default()
        }
    }

    #[test]
    fn test_builds_chain_in_configured_order() {
        let mut config = config_with(vec![
            ProviderSettings::new("amap", ProviderType::Amap, "k1"),
            ProviderSettings::new("baidu", ProviderType::Baidu, "k2"),
            ProviderSettings::new("google", ProviderType::Google, "k3"),
        ]);
        config.routing.default_provider = Some("google".to_string());
        config.routing.fallback_order = vec!["baidu".to_string()];

        let gateway = GeocodingGateway::from_config(&config).unwrap();
        assert_eq!(gateway.registry().chain_names(), vec!["google", "baidu"]);
        assert_eq!(gateway.health().status, HealthStatus::Healthy);
    }

    #[test]
    fn test_disabled_provider_degrades_health() {
        let mut disabled = ProviderSettings::new("baidu", ProviderType::Baidu, "k2");
        disabled.enabled = false;
        let config = config_with(vec![ProviderSettings::new("amap", ProviderType::Amap, "k1"), disabled]);

        let gateway = GeocodingGateway::from_config(&config).unwrap();
        let health = gateway.health();
        assert_eq!(health.status, HealthStatus::Degraded);
        assert_eq!((health.providers_enabled, health.providers_total), (1, 2));
    }

    #[test]
    fn test_custom_provider_rejected() {
        let config = config_with(vec![ProviderSettings::new("mine", ProviderType::Custom, "k")]);
        let err = GeocodingGateway::from_config(&config).unwrap_err();
        assert!(matches!(err, GatewayError::Configuration { .. }));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = config_with(vec![ProviderSettings::new("amap", ProviderType::Amap, "k")]);
        config.routing.default_provider = Some("missing".to_string());
        let err = GeocodingGateway::from_config(&config).unwrap_err();
        assert!(matches!(err, GatewayError::Configuration { .. }));
    }

    #[test]
    fn test_empty_config_is_unhealthy() {
        let gateway = GeocodingGateway::from_config(&GatewayConfig::default()).unwrap();
        assert_eq!(gateway.health().status, HealthStatus::Unhealthy);
    }
}
