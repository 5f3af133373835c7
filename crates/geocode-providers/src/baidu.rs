//! Baidu Maps provider implementation.
//!
//! Uses the v3 geocoding web services. Baidu reports failures in-body through
//! a non-zero integer `status`.

use crate::config::ProviderConfig;
use crate::http::{build_client, get_json, lenient_string};
use async_trait::async_trait;
use geocode_core::{
    GatewayError, GeocodeRequest, GeocodeResult, GeocodingProvider, PrecisionLevel, ProviderError,
    ProviderType, RawFields, ReverseGeocodeRequest,
};
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Baidu provider implementation
pub struct BaiduProvider {
    config: ProviderConfig,
    client: Client,
}

impl BaiduProvider {
    /// Default base URL of the Baidu Maps web service
    pub const DEFAULT_BASE_URL: &'static str = "https://api.map.baidu.com";

    /// Create a configuration pointing at the public Baidu endpoint
    #[must_use]
    pub fn default_config(name: impl Into<String>, api_key: impl Into<String>) -> ProviderConfig {
        ProviderConfig::new(name, api_key, Self::DEFAULT_BASE_URL)
    }

    /// Create a new Baidu provider
    ///
    /// # Errors
    /// Returns error if HTTP client cannot be created
    pub fn new(config: ProviderConfig) -> Result<Self, GatewayError> {
        let client = build_client(config.timeout)?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl GeocodingProvider for BaiduProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::Baidu
    }

    async fn geocode(&self, request: &GeocodeRequest) -> Result<GeocodeResult, ProviderError> {
        let mut query = vec![
            ("ak", self.config.api_key.expose_secret().as_str()),
            ("address", request.address()),
            ("output", "json"),
        ];
        if let Some(city) = request.region_hint() {
            query.push(("city", city));
        }

        debug!(provider = %self.config.name, "Sending geocode request to Baidu");
        let body: BaiduEnvelope = get_json(
            &self.config.name,
            self.client.get(self.config.endpoint("geocoding/v3/")).query(&query),
        )
        .await?;

        parse_geocode(&self.config.name, request, body)
    }

    async fn reverse_geocode(
        &self,
        request: &ReverseGeocodeRequest,
    ) -> Result<GeocodeResult, ProviderError> {
        let location = format!("{:.6},{:.6}", request.latitude(), request.longitude());
        let radius = request.radius_m().to_string();
        let query = [
            ("ak", self.config.api_key.expose_secret().as_str()),
            ("location", location.as_str()),
            ("coordtype", "wgs84ll"),
            ("radius", radius.as_str()),
            ("output", "json"),
        ];

        debug!(provider = %self.config.name, "Sending reverse geocode request to Baidu");
        let body: BaiduEnvelope = get_json(
            &self.config.name,
            self.client
                .get(self.config.endpoint("reverse_geocoding/v3/"))
                .query(&query),
        )
        .await?;

        parse_reverse(&self.config.name, request, body)
    }

    fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn timeout(&self) -> Duration {
        self.config.timeout
    }

    fn max_retries(&self) -> u32 {
        self.config.max_retries
    }
}

/// Map a non-zero Baidu status to the provider-neutral taxonomy
fn classify_status(provider: &str, status: i64, message: &str) -> ProviderError {
    let text = format!("{message} (status {status})");
    match status {
        1 if is_no_result(message) => ProviderError::not_found(provider, text),
        1 => ProviderError::unreachable(provider, text),
        2 => ProviderError::not_found(provider, text),
        3 | 5 | 101 | 102 | 200..=299 => ProviderError::invalid_credential(provider, text),
        4 | 300..=399 | 401 | 402 => ProviderError::quota_exceeded(provider, text),
        _ => ProviderError::malformed(provider, text),
    }
}

fn is_no_result(message: &str) -> bool {
    message.contains("无相关结果") || message.to_lowercase().contains("no result")
}

/// Check the envelope status and decode the `result` payload.
///
/// Baidu sends `"result": []` on failures, so the payload is only decoded
/// once the status is known to be zero.
fn unwrap_envelope<T: DeserializeOwned>(
    provider: &str,
    body: BaiduEnvelope,
) -> Result<T, ProviderError> {
    let status = body
        .status
        .ok_or_else(|| ProviderError::malformed(provider, "missing status"))?;
    if status != 0 {
        let message = if body.message.is_empty() { body.msg } else { body.message };
        return Err(classify_status(provider, status, &message));
    }
    serde_json::from_value(body.result)
        .map_err(|e| ProviderError::malformed(provider, format!("unexpected result shape: {e}")))
}

fn parse_geocode(
    provider: &str,
    request: &GeocodeRequest,
    body: BaiduEnvelope,
) -> Result<GeocodeResult, ProviderError> {
    let result: BaiduGeocodeResult = unwrap_envelope(provider, body)?;
    let location = result
        .location
        .ok_or_else(|| ProviderError::not_found(provider, "no location returned"))?;

    let precision = match result.precise {
        Some(1) => PrecisionLevel::Exact,
        Some(0) => PrecisionLevel::Approximate,
        _ => PrecisionLevel::Unknown,
    };
    let mut raw = RawFields::new().with("level", &result.level);
    if let Some(confidence) = result.confidence {
        raw.insert("confidence", confidence.to_string());
    }
    if let Some(city) = request.region_hint() {
        raw.insert("city", city);
    }

    Ok(GeocodeResult::new(
        provider,
        request.address(),
        location.lat,
        location.lng,
        precision,
    )?
    .with_raw_fields(raw))
}

fn parse_reverse(
    provider: &str,
    request: &ReverseGeocodeRequest,
    body: BaiduEnvelope,
) -> Result<GeocodeResult, ProviderError> {
    let result: BaiduReverseResult = unwrap_envelope(provider, body)?;
    if result.formatted_address.is_empty() {
        return Err(ProviderError::not_found(provider, "no address at location"));
    }

    let component = result.address_component;
    let precision = if component.street_number.is_empty() {
        PrecisionLevel::Approximate
    } else {
        PrecisionLevel::Exact
    };
    let raw = RawFields::new()
        .with("country", &component.country)
        .with("province", &component.province)
        .with("city", &component.city)
        .with("district", &component.district)
        .with("township", &component.town)
        .with("street", &component.street)
        .with("street_number", &component.street_number)
        .with("adcode", &component.adcode);

    Ok(GeocodeResult::new(
        provider,
        result.formatted_address,
        request.latitude(),
        request.longitude(),
        precision,
    )?
    .with_raw_fields(raw))
}

// Baidu API types

#[derive(Debug, Deserialize)]
struct BaiduEnvelope {
    status: Option<i64>,
    #[serde(default, deserialize_with = "lenient_string")]
    message: String,
    #[serde(default, deserialize_with = "lenient_string")]
    msg: String,
    #[serde(default)]
    result: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct BaiduGeocodeResult {
    location: Option<BaiduLocation>,
    precise: Option<i64>,
    confidence: Option<i64>,
    #[serde(default, deserialize_with = "lenient_string")]
    level: String,
}

#[derive(Debug, Deserialize)]
struct BaiduLocation {
    lng: f64,
    lat: f64,
}

#[derive(Debug, Deserialize)]
struct BaiduReverseResult {
    #[serde(default, deserialize_with = "lenient_string")]
    formatted_address: String,
    #[serde(default, rename = "addressComponent")]
    address_component: BaiduAddressComponent,
}

#[derive(Debug, Default, Deserialize)]
struct BaiduAddressComponent {
    #[serde(default, deserialize_with = "lenient_string")]
    country: String,
    #[serde(default, deserialize_with = "lenient_string")]
    province: String,
    #[serde(default, deserialize_with = "lenient_string")]
    city: String,
    #[serde(default, deserialize_with = "lenient_string")]
    district: String,
    #[serde(default, deserialize_with = "lenient_string")]
    town: String,
    #[serde(default, deserialize_with = "lenient_string")]
    street: String,
    #[serde(default, deserialize_with = "lenient_string")]
    street_number: String,
    #[serde(default, deserialize_with = "lenient_string")]
    adcode: String,
}
