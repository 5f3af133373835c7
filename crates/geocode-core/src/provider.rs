//! Provider traits and abstractions.
//!
//! This module defines the capability trait every geocoding backend client
//! implements, along with the supporting enums shared by the registry, the
//! cache and the gateway.

use crate::error::ProviderError;
use crate::response::GeocodeResult;
use crate::types::{GeocodeRequest, ReverseGeocodeRequest};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Core trait for all geocoding providers
///
/// A provider translates the generic request into its backend's wire call and
/// the backend's answer into a [`GeocodeResult`]. "No result" is reported as a
/// [`ProviderErrorKind::NotFound`](crate::ProviderErrorKind::NotFound) error;
/// the resilience layer turns it into an empty outcome.
#[async_trait]
pub trait GeocodingProvider: Send + Sync + 'static {
    /// Unique provider instance name
    fn name(&self) -> &str;

    /// Provider type (e.g., Amap, Google)
    fn provider_type(&self) -> ProviderType;

    /// Resolve an address to coordinates
    ///
    /// # Errors
    /// Returns a classified `ProviderError` on any backend failure
    async fn geocode(&self, request: &GeocodeRequest) -> Result<GeocodeResult, ProviderError>;

    /// Resolve coordinates to an address
    ///
    /// # Errors
    /// Returns a classified `ProviderError` on any backend failure
    async fn reverse_geocode(
        &self,
        request: &ReverseGeocodeRequest,
    ) -> Result<GeocodeResult, ProviderError>;

    /// Get the base URL for this provider
    fn base_url(&self) -> &str;

    /// Per-attempt timeout for this provider
    fn timeout(&self) -> Duration {
        Duration::from_secs(10)
    }

    /// Number of attempts before moving on to the next provider
    fn max_retries(&self) -> u32 {
        3
    }
}

/// Provider type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    /// Amap (Gaode) web service API
    #[serde(alias = "gaode")]
    Amap,
    /// Baidu Maps web service API
    Baidu,
    /// Google Maps Geocoding API
    #[serde(alias = "google_maps")]
    Google,
    /// Custom/other provider
    Custom,
}

impl ProviderType {
    /// Get the string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Amap => "amap",
            Self::Baidu => "baidu",
            Self::Google => "google",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "amap" | "gaode" => Ok(Self::Amap),
            "baidu" => Ok(Self::Baidu),
            "google" | "google_maps" | "google-maps" => Ok(Self::Google),
            "custom" => Ok(Self::Custom),
            _ => Err(format!("Unknown provider type: {s}")),
        }
    }
}

/// The two public lookup operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Address to coordinates
    Geocode,
    /// Coordinates to address
    ReverseGeocode,
}

impl Operation {
    /// Get the string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Geocode => "geocode",
            Self::ReverseGeocode => "reverse_geocode",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time counters for one provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderStats {
    /// Calls answered by this provider, including not-found answers
    pub successes: u64,
    /// Calls in which this provider was given up on
    pub failures: u64,
    /// Whether the provider is disabled by configuration or credential rejection
    pub disabled: bool,
}

/// Aggregate health of the provider pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Every configured provider is enabled
    Healthy,
    /// Some, but not all, providers are enabled
    Degraded,
    /// No provider is enabled
    Unhealthy,
}

impl HealthStatus {
    /// Classify from enabled and total provider counts
    #[must_use]
    pub fn from_counts(enabled: usize, total: usize) -> Self {
        if enabled == 0 {
            Self::Unhealthy
        } else if enabled < total {
            Self::Degraded
        } else {
            Self::Healthy
        }
    }

    /// Check if at least one provider can serve traffic
    #[must_use]
    pub fn is_serving(&self) -> bool {
        !matches!(self, Self::Unhealthy)
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded => write!(f, "degraded"),
            Self::Unhealthy => write!(f, "unhealthy"),
        }
    }
}
