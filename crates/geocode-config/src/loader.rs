//! Configuration loading from files and environment.
//!
//! This module loads configuration from YAML, TOML and JSON sources with
//! `${VAR}` / `${VAR:-default}` substitution, applies `PREFIX_*` environment
//! overrides, resolves `api_key_env` references and validates the result.
//! The loader is the only place that reads the environment.

use crate::schema::{GatewayConfig, ServerConfig};
use regex::{Captures, Regex};
use std::path::Path;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, warn};

/// Environment prefix used by [`load_config`]
pub const ENV_PREFIX: &str = "GEOCODE_GATEWAY";

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File not found
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// The path to the file that was not found
        path: String,
    },

    /// IO error
    #[error("IO error reading configuration: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Validation error
    #[error("Configuration validation error: {0}")]
    Validation(String),

    /// Unsupported format
    #[error("Unsupported configuration format: {extension}")]
    UnsupportedFormat {
        /// The file extension that was not supported
        extension: String,
    },

    /// Environment variable not found
    #[error("Environment variable not found: {name}")]
    EnvVarNotFound {
        /// The name of the environment variable that was not found
        name: String,
    },

    /// Environment override could not be parsed
    #[error("Invalid value for {name}: {value}")]
    InvalidOverride {
        /// The environment variable
        name: String,
        /// The rejected value
        value: String,
    },
}

/// Configuration source
#[derive(Debug, Clone)]
pub enum ConfigSource {
    /// File path
    File(String),
    /// Raw YAML string
    Yaml(String),
    /// Raw TOML string
    Toml(String),
    /// Raw JSON string
    Json(String),
    /// Default configuration
    Default,
}

/// Configuration loader
#[derive(Debug, Default)]
pub struct ConfigLoader {
    sources: Vec<ConfigSource>,
    env_prefix: Option<String>,
}

impl ConfigLoader {
    /// Create a new config loader
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a configuration source
    #[must_use]
    pub fn with_source(mut self, source: ConfigSource) -> Self {
        self.sources.push(source);
        self
    }

    /// Add a file source
    #[must_use]
    pub fn with_file(self, path: impl Into<String>) -> Self {
        self.with_source(ConfigSource::File(path.into()))
    }

    /// Set environment variable prefix for overrides
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    /// Load configuration from all sources
    ///
    /// # Errors
    /// Returns error if any source fails to load or the result fails validation
    pub async fn load(self) -> Result<GatewayConfig, ConfigError> {
        let mut config = GatewayConfig::default();

        for source in self.sources {
            let source_config = Self::load_source(&source).await?;
            config = Self::merge_configs(config, source_config);
        }

        if let Some(ref prefix) = self.env_prefix {
            Self::apply_env_overrides(&mut config, prefix)?;
        }

        Self::resolve_credentials(&mut config)?;
        config.validate_config()?;

        info!(providers = config.providers.len(), "Configuration loaded successfully");
        Ok(config)
    }

    /// Load from a single source
    async fn load_source(source: &ConfigSource) -> Result<GatewayConfig, ConfigError> {
        match source {
            ConfigSource::File(path) => Self::load_file(path).await,
            ConfigSource::Yaml(content) => Self::parse_yaml(&Self::substitute_env_vars(content)?),
            ConfigSource::Toml(content) => Self::parse_toml(&Self::substitute_env_vars(content)?),
            ConfigSource::Json(content) => Self::parse_json(&Self::substitute_env_vars(content)?),
            ConfigSource::Default => Ok(GatewayConfig::default()),
        }
    }

    /// Load configuration from a file
    async fn load_file(path: &str) -> Result<GatewayConfig, ConfigError> {
        let path = Path::new(path);

        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.display().to_string(),
            });
        }

        let content = fs::read_to_string(path).await?;
        let content = Self::substitute_env_vars(&content)?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        debug!(path = %path.display(), format = %extension, "Loading configuration file");

        match extension.as_str() {
            "yaml" | "yml" => Self::parse_yaml(&content),
            "toml" => Self::parse_toml(&content),
            "json" => Self::parse_json(&content),
            ext => Err(ConfigError::UnsupportedFormat {
                extension: ext.to_string(),
            }),
        }
    }

    fn parse_yaml(content: &str) -> Result<GatewayConfig, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    fn parse_toml(content: &str) -> Result<GatewayConfig, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    fn parse_json(content: &str) -> Result<GatewayConfig, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Substitute environment variables in content
    ///
    /// Supports ${VAR} and ${VAR:-default} syntax. Unset variables without a
    /// default are left in place with a warning.
    fn substitute_env_vars(content: &str) -> Result<String, ConfigError> {
        let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
            .map_err(|e| ConfigError::Validation(e.to_string()))?;

        let result = re.replace_all(content, |caps: &Captures<'_>| {
            let name = &caps[1];
            match (std::env::var(name), caps.get(2)) {
                (Ok(value), _) => value,
                (Err(_), Some(default)) => default.as_str().to_string(),
                (Err(_), None) => {
                    warn!(name, "Environment variable not found");
                    caps[0].to_string()
                }
            }
        });
        Ok(result.into_owned())
    }

    /// Merge two configurations (later overrides earlier)
    fn merge_configs(base: GatewayConfig, overlay: GatewayConfig) -> GatewayConfig {
        GatewayConfig {
            server: if overlay.server == ServerConfig::default() {
                base.server
            } else {
                overlay.server
            },
            providers: if overlay.providers.is_empty() {
                base.providers
            } else {
                overlay.providers
            },
            routing: overlay.routing,
            resilience: overlay.resilience,
            cache: overlay.cache,
            rate_limit: overlay.rate_limit,
            logging: overlay.logging,
            metrics: overlay.metrics,
        }
    }

    /// Apply `PREFIX_*` environment overrides
    fn apply_env_overrides(config: &mut GatewayConfig, prefix: &str) -> Result<(), ConfigError> {
        let var = |suffix: &str| {
            let name = format!("{prefix}_{suffix}");
            std::env::var(&name).ok().map(|value| (name, value))
        };

        if let Some((name, value)) = var("SERVER_PORT") {
            config.server.port = value
                .parse()
                .map_err(|_| ConfigError::InvalidOverride { name, value })?;
        }
        if let Some((_, host)) = var("SERVER_HOST") {
            config.server.host = host;
        }
        if let Some((_, level)) = var("LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Some((_, provider)) = var("DEFAULT_PROVIDER") {
            config.routing.default_provider = Some(provider);
        }
        if let Some((name, value)) = var("METRICS_ENABLED") {
            config.metrics.enabled = value
                .parse()
                .map_err(|_| ConfigError::InvalidOverride { name, value })?;
        }
        Ok(())
    }

    /// Fill `api_key` from `api_key_env` where no key was given inline
    fn resolve_credentials(config: &mut GatewayConfig) -> Result<(), ConfigError> {
        for provider in &mut config.providers {
            if provider.api_key().is_some() {
                continue;
            }
            let Some(env_name) = provider.api_key_env.as_deref() else {
                continue;
            };
            match std::env::var(env_name) {
                Ok(key) => provider.api_key = Some(key),
                Err(_) if !provider.enabled => {}
                Err(_) => {
                    return Err(ConfigError::EnvVarNotFound {
                        name: env_name.to_string(),
                    })
                }
            }
        }
        Ok(())
    }
}

/// Load configuration from default locations
///
/// Looks for configuration in order:
/// 1. Path from CONFIG_PATH environment variable
/// 2. ./config.yaml
/// 3. ./config/default.yaml
///
/// `GEOCODE_GATEWAY_*` overrides apply in every case.
///
/// # Errors
/// Returns error if `CONFIG_PATH` names a missing file or loading fails
pub async fn load_config() -> Result<GatewayConfig, ConfigError> {
    if let Ok(path) = std::env::var("CONFIG_PATH") {
        info!(path = %path, "Loading configuration");
        return ConfigLoader::new()
            .with_file(path)
            .with_env_prefix(ENV_PREFIX)
            .load()
            .await;
    }

    for path in ["config.yaml", "config.yml", "config/default.yaml", "config/default.yml"] {
        if Path::new(path).exists() {
            info!(path, "Loading configuration");
            return ConfigLoader::new()
                .with_file(path)
                .with_env_prefix(ENV_PREFIX)
                .load()
                .await;
        }
    }

    warn!("No configuration file found, using defaults");
    ConfigLoader::new()
        .with_source(ConfigSource::Default)
        .with_env_prefix(ENV_PREFIX)
        .load()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::RateLimitScope;
    use geocode_core::ProviderType;
    use std::time::Duration;

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("GEOCODE_TEST_SUBST_VAR", "test_value");

        let content = "key: ${GEOCODE_TEST_SUBST_VAR}";
        let result = ConfigLoader::substitute_env_vars(content).expect("substitute");
        assert_eq!(result, "key: test_value");

        std::env::remove_var("GEOCODE_TEST_SUBST_VAR");
    }

    #[test]
    fn test_env_var_with_default() {
        let content = "key: ${GEOCODE_TEST_NONEXISTENT:-default_value}";
        let result = ConfigLoader::substitute_env_vars(content).expect("substitute");
        assert_eq!(result, "key: default_value");
    }

    #[test]
    fn test_missing_env_var_left_in_place() {
        let content = "key: ${GEOCODE_TEST_MISSING_NO_DEFAULT}";
        let result = ConfigLoader::substitute_env_vars(content).expect("substitute");
        assert_eq!(result, content);
    }

    #[tokio::test]
    async fn test_load_yaml_content() {
        let yaml = r#"
server:
  port: 9090
  host: "127.0.0.1"
providers:
  - name: amap
    type: amap
    api_key: amap-key
    timeout: 5s
  - name: google
    type: google_maps
    api_key: google-key
    max_retries: 1
routing:
  default_provider: google
  fallback_order: [amap]
cache:
  ttl: 30m
rate_limit:
  max_requests: 5
  window: 1m
  scope: per_client
"#;

        let config = ConfigLoader::new()
            .with_source(ConfigSource::Yaml(yaml.to_string()))
            .load()
            .await
            .expect("load config");

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.providers.len(), 2);
        assert_eq!(config.providers[0].timeout, Duration::from_secs(5));
        assert_eq!(config.providers[1].provider_type, ProviderType::Google);
        assert_eq!(config.providers[1].max_retries, 1);
        assert_eq!(config.routing.default_provider.as_deref(), Some("google"));
        assert_eq!(config.cache.ttl, Duration::from_secs(1800));
        assert_eq!(config.rate_limit.max_requests, 5);
        assert_eq!(config.rate_limit.scope, RateLimitScope::PerClient);
    }

    #[tokio::test]
    async fn test_load_toml_content() {
        let toml = r#"
[server]
port = 8081

[[providers]]
name = "baidu"
type = "baidu"
api_key = "ak"

[cache]
enabled = false
"#;
        let config = ConfigLoader::new()
            .with_source(ConfigSource::Toml(toml.to_string()))
            .load()
            .await
            .expect("load config");

        assert_eq!(config.server.port, 8081);
        assert_eq!(config.providers[0].provider_type, ProviderType::Baidu);
        assert!(!config.cache.enabled);
    }

    #[tokio::test]
    async fn test_load_default_config() {
        let config = ConfigLoader::new()
            .with_source(ConfigSource::Default)
            .load()
            .await
            .expect("load config");

        assert_eq!(config.server.port, 4000);
    }

    #[tokio::test]
    async fn test_env_overrides() {
        std::env::set_var("GEOCODE_TEST_PREFIX_SERVER_PORT", "3000");
        std::env::set_var("GEOCODE_TEST_PREFIX_LOG_LEVEL", "debug");

        let config = ConfigLoader::new()
            .with_source(ConfigSource::Default)
            .with_env_prefix("GEOCODE_TEST_PREFIX")
            .load()
            .await
            .expect("load config");

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.logging.level, "debug");

        std::env::remove_var("GEOCODE_TEST_PREFIX_SERVER_PORT");
        std::env::remove_var("GEOCODE_TEST_PREFIX_LOG_LEVEL");
    }

    #[tokio::test]
    async fn test_invalid_override_rejected() {
        std::env::set_var("GEOCODE_BAD_PREFIX_SERVER_PORT", "not-a-port");

        let result = ConfigLoader::new()
            .with_env_prefix("GEOCODE_BAD_PREFIX")
            .load()
            .await;
        assert!(matches!(result, Err(ConfigError::InvalidOverride { .. })));

        std::env::remove_var("GEOCODE_BAD_PREFIX_SERVER_PORT");
    }

    #[tokio::test]
    async fn test_api_key_env_resolution() {
        std::env::set_var("GEOCODE_TEST_AMAP_KEY", "from-env");
        let yaml = r#"
providers:
  - name: amap
    type: amap
    api_key_env: GEOCODE_TEST_AMAP_KEY
"#;
        let config = ConfigLoader::new()
            .with_source(ConfigSource::Yaml(yaml.to_string()))
            .load()
            .await
            .expect("load config");
        assert_eq!(config.providers[0].api_key(), Some("from-env"));
        std::env::remove_var("GEOCODE_TEST_AMAP_KEY");

        let yaml = r#"
providers:
  - name: amap
    type: amap
    api_key_env: GEOCODE_TEST_UNSET_KEY
"#;
        let result = ConfigLoader::new()
            .with_source(ConfigSource::Yaml(yaml.to_string()))
            .load()
            .await;
        assert!(matches!(result, Err(ConfigError::EnvVarNotFound { .. })));
    }

    #[tokio::test]
    async fn test_unknown_fallback_rejected_on_load() {
        let yaml = r#"
providers:
  - name: amap
    type: amap
    api_key: k
routing:
  fallback_order: [baidu]
"#;
        let result = ConfigLoader::new()
            .with_source(ConfigSource::Yaml(yaml.to_string()))
            .load()
            .await;
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[tokio::test]
    async fn test_missing_file() {
        let result = ConfigLoader::new()
            .with_file("/nonexistent/geocode.yaml")
            .load()
            .await;
        assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
    }
}
