//! Per-instance provider client configuration.

use secrecy::SecretString;
use std::time::Duration;

/// Settings for one provider client instance
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Provider instance name, unique within the registry
    pub name: String,
    /// API key or access key
    pub api_key: SecretString,
    /// Base URL of the backend web service
    pub base_url: String,
    /// Per-attempt request timeout
    pub timeout: Duration,
    /// Attempts per call before falling back to the next provider
    pub max_retries: u32,
    /// Whether the provider takes part in the fallback chain
    pub enabled: bool,
}

impl ProviderConfig {
    /// Default per-attempt timeout
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
    /// Default attempts per call
    pub const DEFAULT_MAX_RETRIES: u32 = 3;

    /// Create a configuration with default timeout and retry budget
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            api_key: SecretString::new(api_key.into()),
            base_url: base_url.into(),
            timeout: Self::DEFAULT_TIMEOUT,
            max_retries: Self::DEFAULT_MAX_RETRIES,
            enabled: true,
        }
    }

    /// Set the base URL
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the retry budget
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the enabled flag
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Base URL without a trailing slash
    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }
}
