//! Configuration schema definitions.
//!
//! This module defines all configuration types with validation and defaults.

use crate::loader::ConfigError;
use geocode_core::ProviderType;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use validator::{Validate, ValidationError};

/// Main gateway configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct GatewayConfig {
    /// Server configuration
    #[validate(nested)]
    pub server: ServerConfig,

    /// Provider configurations, in registration order
    #[validate(nested)]
    pub providers: Vec<ProviderConfig>,

    /// Default provider and fallback order
    pub routing: RoutingConfig,

    /// Retry and timeout configuration
    #[validate(nested)]
    pub resilience: ResilienceConfig,

    /// Result cache configuration
    #[validate(nested)]
    pub cache: CacheConfig,

    /// Inbound rate limiting
    #[validate(nested)]
    pub rate_limit: RateLimitConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Metrics configuration
    pub metrics: MetricsConfig,
}

impl GatewayConfig {
    /// Validate field constraints and cross-references between sections
    ///
    /// # Errors
    /// Returns `ConfigError::Validation` describing the first problem found
    pub fn validate_config(&self) -> Result<(), ConfigError> {
        self.validate()
            .map_err(|e| ConfigError::Validation(e.to_string()))?;
        self.validate_references()
    }

    fn validate_references(&self) -> Result<(), ConfigError> {
        let mut names = HashSet::new();
        for provider in &self.providers {
            if !names.insert(provider.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate provider name '{}'",
                    provider.name
                )));
            }
            if provider.enabled && provider.api_key().is_none() {
                return Err(ConfigError::Validation(format!(
                    "provider '{}' has no api_key",
                    provider.name
                )));
            }
        }

        let unknown = |name: &str| !names.contains(name);
        if let Some(default) = self.routing.default_provider.as_deref() {
            if unknown(default) {
                return Err(ConfigError::Validation(format!(
                    "routing.default_provider '{default}' is not a configured provider"
                )));
            }
        }
        if let Some(name) = self.routing.fallback_order.iter().find(|n| unknown(n)) {
            return Err(ConfigError::Validation(format!(
                "routing.fallback_order entry '{name}' is not a configured provider"
            )));
        }

        if self.resilience.retry.base_delay > self.resilience.retry.max_delay {
            return Err(ConfigError::Validation(
                "resilience.retry.base_delay exceeds max_delay".to_string(),
            ));
        }
        Ok(())
    }

    /// Get a provider config by name
    #[must_use]
    pub fn get_provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.name == name)
    }

    /// Get all enabled providers
    #[must_use]
    pub fn enabled_providers(&self) -> Vec<&ProviderConfig> {
        self.providers.iter().filter(|p| p.enabled).collect()
    }
}

fn default_true() -> bool {
    true
}

fn non_zero_duration(value: &Duration) -> Result<(), ValidationError> {
    if value.is_zero() {
        return Err(ValidationError::new("zero_duration"));
    }
    Ok(())
}

/// Server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind host
    #[validate(length(min = 1))]
    pub host: String,

    /// Bind port
    #[validate(range(min = 1))]
    pub port: u16,

    /// Time allowed for in-flight requests after a shutdown signal
    #[serde(with = "humantime_serde")]
    pub graceful_shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 4000,
            graceful_shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl ServerConfig {
    /// Get the socket address
    #[must_use]
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Provider configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ProviderConfig {
    /// Unique provider name
    #[validate(length(min = 1, max = 64))]
    pub name: String,

    /// Provider type
    #[serde(rename = "type")]
    pub provider_type: ProviderType,

    /// API key (may be an env var reference like ${AMAP_API_KEY})
    #[serde(default)]
    pub api_key: Option<String>,

    /// Environment variable holding the API key, read by the loader
    #[serde(default)]
    pub api_key_env: Option<String>,

    /// Base URL override
    #[serde(default)]
    #[validate(url)]
    pub base_url: Option<String>,

    /// Timeout for one request to this provider
    #[serde(default = "default_provider_timeout", with = "humantime_serde")]
    #[validate(custom(function = "non_zero_duration"))]
    pub timeout: Duration,

    /// Attempts made against this provider before falling back
    #[serde(default = "default_max_retries")]
    #[validate(range(max = 10))]
    pub max_retries: u32,

    /// Whether this provider is enabled
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_provider_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_max_retries() -> u32 {
    3
}

impl ProviderConfig {
    /// Create a provider entry with default timeout and retries
    #[must_use]
    pub fn new(name: impl Into<String>, provider_type: ProviderType, api_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            provider_type,
            api_key: Some(api_key.into()),
            api_key_env: None,
            base_url: None,
            timeout: default_provider_timeout(),
            max_retries: default_max_retries(),
            enabled: true,
        }
    }

    /// The configured API key, if present and non-empty
    #[must_use]
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|key| !key.trim().is_empty())
    }
}

/// Default provider and fallback order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Provider tried first; the first configured provider if unset
    pub default_provider: Option<String>,

    /// Providers tried after the default, in order
    pub fallback_order: Vec<String>,
}

/// Resilience configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ResilienceConfig {
    /// Backoff between attempts
    #[validate(nested)]
    pub retry: RetryConfig,

    /// Bound on a whole fallback chain
    #[serde(with = "humantime_serde")]
    #[validate(custom(function = "non_zero_duration"))]
    pub chain_timeout: Duration,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            chain_timeout: Duration::from_secs(30),
        }
    }
}

/// Retry backoff configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct RetryConfig {
    /// Delay after the first failed attempt
    #[serde(with = "humantime_serde")]
    pub base_delay: Duration,

    /// Upper bound for any single delay
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
        }
    }
}

/// Result cache configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct CacheConfig {
    /// Whether caching is enabled
    pub enabled: bool,

    /// Maximum number of cached results
    #[validate(range(min = 1))]
    pub max_entries: usize,

    /// Time-to-live for cached results
    #[serde(with = "humantime_serde")]
    #[validate(custom(function = "non_zero_duration"))]
    pub ttl: Duration,

    /// Decimal places kept when fingerprinting coordinates
    #[validate(range(max = 9))]
    pub coordinate_precision: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 1000,
            ttl: Duration::from_secs(3600),
            coordinate_precision: 4,
        }
    }
}

/// Rate limiting configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Whether rate limiting is enabled
    pub enabled: bool,

    /// Requests admitted per window
    #[validate(range(min = 1))]
    pub max_requests: u32,

    /// Window size
    #[serde(with = "humantime_serde")]
    #[validate(custom(function = "non_zero_duration"))]
    pub window: Duration,

    /// Window grouping
    pub scope: RateLimitScope,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: 100,
            window: Duration::from_secs(60),
            scope: RateLimitScope::Global,
        }
    }
}

/// Rate limit grouping
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitScope {
    /// One window shared by every caller
    #[default]
    Global,
    /// One window per caller key
    PerClient,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Output format
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format
    #[default]
    Json,
    /// Pretty format
    Pretty,
    /// Compact format
    Compact,
}

/// Metrics configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Whether `/metrics` is served
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}
