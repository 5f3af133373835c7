//! # Geocode Configuration
//!
//! Configuration management for the geocoding gateway, including:
//! - Configuration schema and validation
//! - Loading from YAML/TOML/JSON files or inline sources
//! - Environment variable substitution and overrides

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod loader;
pub mod schema;

// Re-export main types
pub use loader::{load_config, ConfigError, ConfigLoader, ConfigSource, ENV_PREFIX};
pub use schema::{
    CacheConfig, GatewayConfig, LogFormat, LoggingConfig, MetricsConfig, ProviderConfig,
    RateLimitConfig, RateLimitScope, ResilienceConfig, RetryConfig, RoutingConfig, ServerConfig,
};
