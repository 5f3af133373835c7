//! Application state shared across handlers.

use geocode_config::GatewayConfig;
use geocode_core::GatewayResult;
use geocode_gateway::GeocodingGateway;
use std::time::Duration;

/// Application state shared across all handlers
#[derive(Clone, Debug)]
pub struct AppState {
    /// The gateway service
    pub gateway: GeocodingGateway,
    /// Whether `/metrics` is served
    pub metrics_enabled: bool,
    /// How often expired cache entries and idle rate-limit windows are swept
    pub maintenance_interval: Duration,
}

impl AppState {
    /// Default sweep interval
    pub const DEFAULT_MAINTENANCE_INTERVAL: Duration = Duration::from_secs(60);

    /// Create state around an existing gateway
    #[must_use]
    pub fn new(gateway: GeocodingGateway) -> Self {
        Self {
            gateway,
            metrics_enabled: true,
            maintenance_interval: Self::DEFAULT_MAINTENANCE_INTERVAL,
        }
    }

    /// Build the gateway and state from configuration
    ///
    /// # Errors
    /// Returns the gateway construction error
    pub fn from_config(config: &GatewayConfig) -> GatewayResult<Self> {
        let gateway = GeocodingGateway::from_config(config)?;
        Ok(Self::new(gateway).with_metrics_enabled(config.metrics.enabled))
    }

    /// Enable or disable `/metrics`
    #[must_use]
    pub fn with_metrics_enabled(mut self, enabled: bool) -> Self {
        self.metrics_enabled = enabled;
        self
    }

    /// Set the maintenance interval
    #[must_use]
    pub fn with_maintenance_interval(mut self, interval: Duration) -> Self {
        self.maintenance_interval = interval;
        self
    }

    /// Idle time after which a per-client rate-limit window is dropped
    #[must_use]
    pub fn idle_window_ttl(&self) -> Duration {
        self.maintenance_interval * 10
    }
}
