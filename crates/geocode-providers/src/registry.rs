//! Provider registry for managing multiple geocoding providers.
//!
//! The registry provides:
//! - Provider registration keyed by instance name
//! - The default provider and the ordered fallback chain
//! - Per-provider success/failure counters
//! - Fail-fast disabling of providers whose credential was rejected

use dashmap::DashMap;
use geocode_core::{GatewayError, GeocodingProvider, ProviderStats};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{error, info};

/// Provider entry in the registry
pub struct ProviderEntry {
    /// The provider instance
    pub provider: Arc<dyn GeocodingProvider>,
    /// Whether the provider is enabled by configuration
    pub enabled: bool,
    credential_rejected: AtomicBool,
    successes: AtomicU64,
    failures: AtomicU64,
}

impl ProviderEntry {
    fn new(provider: Arc<dyn GeocodingProvider>, enabled: bool) -> Self {
        Self {
            provider,
            enabled,
            credential_rejected: AtomicBool::new(false),
            successes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// Whether the provider may be called
    #[must_use]
    pub fn is_usable(&self) -> bool {
        self.enabled && !self.credential_rejected.load(Ordering::Acquire)
    }

    fn stats(&self) -> ProviderStats {
        ProviderStats {
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            disabled: !self.is_usable(),
        }
    }
}

#[derive(Debug, Default)]
struct ChainOrder {
    registration: Vec<String>,
    default: Option<String>,
    fallback: Option<Vec<String>>,
}

/// Provider registry for managing multiple geocoding providers
pub struct ProviderRegistry {
    /// Registered providers by name
    providers: DashMap<String, ProviderEntry>,
    /// Registration order, default and fallback order
    order: RwLock<ChainOrder>,
}

impl ProviderRegistry {
    /// Create a new provider registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            providers: DashMap::new(),
            order: RwLock::new(ChainOrder::default()),
        }
    }

    /// Register a new provider
    ///
    /// # Errors
    /// Returns error if the provider name is already registered
    pub fn register(
        &self,
        provider: Arc<dyn GeocodingProvider>,
        enabled: bool,
    ) -> Result<(), GatewayError> {
        let name = provider.name().to_string();

        match self.providers.entry(name.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(GatewayError::configuration(format!(
                    "Provider already registered: {name}"
                )));
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(ProviderEntry::new(Arc::clone(&provider), enabled));
            }
        }
        self.order.write().registration.push(name.clone());

        info!(
            provider = %name,
            provider_type = %provider.provider_type(),
            enabled,
            "Provider registered"
        );
        Ok(())
    }

    /// Get a provider by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn GeocodingProvider>> {
        self.providers.get(name).map(|e| Arc::clone(&e.provider))
    }

    /// Check whether a provider is registered and usable
    #[must_use]
    pub fn is_enabled(&self, name: &str) -> bool {
        self.providers.get(name).is_some_and(|e| e.is_usable())
    }

    /// Set the default provider
    ///
    /// # Errors
    /// Returns error if the provider is not registered
    pub fn set_default(&self, name: &str) -> Result<(), GatewayError> {
        self.ensure_registered(name)?;
        self.order.write().default = Some(name.to_string());
        Ok(())
    }

    /// Set the fallback order tried after the default provider
    ///
    /// # Errors
    /// Returns error if any name is not registered
    pub fn set_fallback_order(&self, names: Vec<String>) -> Result<(), GatewayError> {
        for name in &names {
            self.ensure_registered(name)?;
        }
        self.order.write().fallback = Some(names);
        Ok(())
    }

    /// The default provider: the configured one, or the first registered
    #[must_use]
    pub fn default_provider(&self) -> Option<String> {
        let order = self.order.read();
        order
            .default
            .clone()
            .or_else(|| order.registration.first().cloned())
    }

    /// Provider names in chain order, disabled providers included.
    ///
    /// The default comes first, followed by the fallback order. Without an
    /// explicit fallback order the remaining providers follow in registration
    /// order.
    #[must_use]
    pub fn chain_names(&self) -> Vec<String> {
        let order = self.order.read();
        let default = order
            .default
            .clone()
            .or_else(|| order.registration.first().cloned());

        let rest = order.fallback.as_ref().unwrap_or(&order.registration);
        let mut names: Vec<String> = Vec::with_capacity(rest.len() + 1);
        for name in default.iter().chain(rest.iter()) {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names
    }

    /// Usable providers in chain order
    #[must_use]
    pub fn fallback_chain(&self) -> Vec<Arc<dyn GeocodingProvider>> {
        self.chain_names()
            .iter()
            .filter_map(|name| {
                self.providers
                    .get(name)
                    .filter(|e| e.is_usable())
                    .map(|e| Arc::clone(&e.provider))
            })
            .collect()
    }

    /// Record a call answered by the provider
    pub fn record_success(&self, name: &str) {
        if let Some(entry) = self.providers.get(name) {
            entry.successes.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a call in which the provider was given up on
    pub fn record_failure(&self, name: &str) {
        if let Some(entry) = self.providers.get(name) {
            entry.failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Disable a provider whose credential was rejected.
    ///
    /// Logs once, on the call that disables it. Returns `true` if this call
    /// disabled the provider.
    pub fn disable_for_credential(&self, name: &str, reason: &str) -> bool {
        let Some(entry) = self.providers.get(name) else {
            return false;
        };
        let newly_disabled = !entry.credential_rejected.swap(true, Ordering::AcqRel);
        if newly_disabled {
            error!(
                provider = %name,
                reason = %reason,
                "Provider credential rejected; provider disabled for the process lifetime"
            );
        }
        newly_disabled
    }

    /// Per-provider counters, keyed by name
    #[must_use]
    pub fn stats(&self) -> BTreeMap<String, ProviderStats> {
        self.providers
            .iter()
            .map(|e| (e.key().clone(), e.stats()))
            .collect()
    }

    /// Number of usable providers
    #[must_use]
    pub fn enabled_count(&self) -> usize {
        self.providers.iter().filter(|e| e.is_usable()).count()
    }

    /// Get all provider names in registration order
    #[must_use]
    pub fn provider_names(&self) -> Vec<String> {
        self.order.read().registration.clone()
    }

    /// Get number of registered providers
    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Check if registry is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    fn ensure_registered(&self, name: &str) -> Result<(), GatewayError> {
        if self.providers.contains_key(name) {
            Ok(())
        } else {
            Err(GatewayError::configuration(format!(
                "Unknown provider: {name}"
            )))
        }
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use geocode_core::{
        GeocodeRequest, GeocodeResult, ProviderError, ProviderType, ReverseGeocodeRequest,
    };

    struct MockProvider {
        name: String,
    }

    impl MockProvider {
        fn arc(name: &str) -> Arc<dyn GeocodingProvider> {
            Arc::new(Self {
                name: name.to_string(),
            })
        }
    }

    #[async_trait]
    impl GeocodingProvider for MockProvider {
        fn name(&self) -> &str {
            &self.name
        }

        fn provider_type(&self) -> ProviderType {
            ProviderType::Custom
        }

        async fn geocode(&self, _request: &GeocodeRequest) -> Result<GeocodeResult, ProviderError> {
            Err(ProviderError::unreachable(&self.name, "mock"))
        }

        async fn reverse_geocode(
            &self,
            _request: &ReverseGeocodeRequest,
        ) -> Result<GeocodeResult, ProviderError> {
            Err(ProviderError::unreachable(&self.name, "mock"))
        }

        fn base_url(&self) -> &str {
            "http://mock"
        }
    }

    fn names(chain: &[Arc<dyn GeocodingProvider>]) -> Vec<&str> {
        chain.iter().map(|p| p.name()).collect()
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let registry = ProviderRegistry::new();
        registry.register(MockProvider::arc("amap"), true).unwrap();
        let err = registry.register(MockProvider::arc("amap"), true).unwrap_err();
        assert!(matches!(err, GatewayError::Configuration { .. }));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_default_is_first_registered() {
        let registry = ProviderRegistry::new();
        assert_eq!(registry.default_provider(), None);
        registry.register(MockProvider::arc("amap"), true).unwrap();
        registry.register(MockProvider::arc("google"), true).unwrap();
        assert_eq!(registry.default_provider().as_deref(), Some("amap"));
        assert_eq!(names(&registry.fallback_chain()), vec!["amap", "google"]);
    }

    #[test]
    fn test_chain_follows_configured_order() {
        let registry = ProviderRegistry::new();
        for name in ["amap", "baidu", "google"] {
            registry.register(MockProvider::arc(name), true).unwrap();
        }
        registry.set_default("google").unwrap();
        registry
            .set_fallback_order(vec!["amap".to_string(), "google".to_string()])
            .unwrap();

        // baidu is not in the configured chain; google is not repeated
        assert_eq!(names(&registry.fallback_chain()), vec!["google", "amap"]);
    }

    #[test]
    fn test_unknown_names_rejected() {
        let registry = ProviderRegistry::new();
        registry.register(MockProvider::arc("amap"), true).unwrap();
        assert!(registry.set_default("bing").is_err());
        assert!(registry.set_fallback_order(vec!["bing".to_string()]).is_err());
    }

    #[test]
    fn test_config_disabled_provider_skipped() {
        let registry = ProviderRegistry::new();
        registry.register(MockProvider::arc("amap"), false).unwrap();
        registry.register(MockProvider::arc("google"), true).unwrap();

        assert_eq!(names(&registry.fallback_chain()), vec!["google"]);
        assert_eq!(registry.enabled_count(), 1);
        assert!(registry.stats()["amap"].disabled);
    }

    #[test]
    fn test_disable_for_credential_once() {
        let registry = ProviderRegistry::new();
        registry.register(MockProvider::arc("amap"), true).unwrap();
        registry.register(MockProvider::arc("google"), true).unwrap();

        assert!(registry.disable_for_credential("amap", "INVALID_USER_KEY"));
        assert!(!registry.disable_for_credential("amap", "INVALID_USER_KEY"));
        assert!(!registry.disable_for_credential("missing", "x"));

        assert!(!registry.is_enabled("amap"));
        assert!(registry.is_enabled("google"));
        assert_eq!(names(&registry.fallback_chain()), vec!["google"]);
        assert_eq!(registry.chain_names(), vec!["amap", "google"]);
    }

    #[test]
    fn test_counters() {
        let registry = ProviderRegistry::new();
        registry.register(MockProvider::arc("amap"), true).unwrap();
        registry.record_success("amap");
        registry.record_success("amap");
        registry.record_failure("amap");
        registry.record_failure("unknown");

        let stats = registry.stats();
        assert_eq!(
            stats["amap"],
            ProviderStats {
                successes: 2,
                failures: 1,
                disabled: false
            }
        );
        assert_eq!(stats.len(), 1);
    }
}
