//! Google Maps provider implementation.
//!
//! Uses the Geocoding API. Google reports failures in-body through a string
//! `status` and an optional `error_message`.

use crate::config::ProviderConfig;
use crate::http::{build_client, get_json, lenient_string};
use async_trait::async_trait;
use geocode_core::{
    GatewayError, GeocodeRequest, GeocodeResult, GeocodingProvider, PrecisionLevel, ProviderError,
    ProviderType, RawFields, ReverseGeocodeRequest,
};
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Google Maps provider implementation
pub struct GoogleProvider {
    config: ProviderConfig,
    client: Client,
}

impl GoogleProvider {
    /// Default base URL of the Google Maps web services
    pub const DEFAULT_BASE_URL: &'static str = "https://maps.googleapis.com/maps/api";

    /// Create a configuration pointing at the public Google endpoint
    #[must_use]
    pub fn default_config(name: impl Into<String>, api_key: impl Into<String>) -> ProviderConfig {
        ProviderConfig::new(name, api_key, Self::DEFAULT_BASE_URL)
    }

    /// Create a new Google provider
    ///
    /// # Errors
    /// Returns error if HTTP client cannot be created
    pub fn new(config: ProviderConfig) -> Result<Self, GatewayError> {
        let client = build_client(config.timeout)?;
        Ok(Self { config, client })
    }

    async fn call(&self, query: &[(&str, &str)]) -> Result<GoogleResponse, ProviderError> {
        get_json(
            &self.config.name,
            self.client.get(self.config.endpoint("geocode/json")).query(query),
        )
        .await
    }
}

#[async_trait]
impl GeocodingProvider for GoogleProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::Google
    }

    async fn geocode(&self, request: &GeocodeRequest) -> Result<GeocodeResult, ProviderError> {
        let address = match request.region_hint() {
            Some(hint) => format!("{}, {hint}", request.address()),
            None => request.address().to_string(),
        };

        debug!(provider = %self.config.name, "Sending geocode request to Google");
        let body = self
            .call(&[
                ("key", self.config.api_key.expose_secret().as_str()),
                ("address", address.as_str()),
            ])
            .await?;

        parse_response(&self.config.name, body, None)
    }

    async fn reverse_geocode(
        &self,
        request: &ReverseGeocodeRequest,
    ) -> Result<GeocodeResult, ProviderError> {
        let latlng = format!("{:.6},{:.6}", request.latitude(), request.longitude());

        debug!(provider = %self.config.name, "Sending reverse geocode request to Google");
        let body = self
            .call(&[
                ("key", self.config.api_key.expose_secret().as_str()),
                ("latlng", latlng.as_str()),
            ])
            .await?;

        parse_response(
            &self.config.name,
            body,
            Some((request.latitude(), request.longitude())),
        )
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

/// Map a non-`OK` Google status to the provider-neutral taxonomy
fn classify_status(provider: &str, status: &str, error_message: &str) -> ProviderError {
    let text = if error_message.is_empty() {
        status.to_string()
    } else {
        format!("{status}: {error_message}")
    };
    match status {
        "ZERO_RESULTS" | "INVALID_REQUEST" => ProviderError::not_found(provider, text),
        "OVER_QUERY_LIMIT" | "OVER_DAILY_LIMIT" => ProviderError::quota_exceeded(provider, text),
        "REQUEST_DENIED" => ProviderError::invalid_credential(provider, text),
        "UNKNOWN_ERROR" => ProviderError::unreachable(provider, text),
        _ => ProviderError::malformed(provider, text),
    }
}

fn precision_from_location_type(location_type: &str) -> PrecisionLevel {
    match location_type {
        "ROOFTOP" => PrecisionLevel::Exact,
        "RANGE_INTERPOLATED" | "GEOMETRIC_CENTER" | "APPROXIMATE" => PrecisionLevel::Approximate,
        _ => PrecisionLevel::Unknown,
    }
}

/// Google component type to raw field key
fn component_key(component_type: &str) -> Option<&'static str> {
    match component_type {
        "country" => Some("country"),
        "administrative_area_level_1" => Some("province"),
        "locality" => Some("city"),
        "administrative_area_level_2" | "sublocality" | "sublocality_level_1" => Some("district"),
        "route" => Some("street"),
        "street_number" => Some("street_number"),
        "postal_code" => Some("postal_code"),
        _ => None,
    }
}

/// Parse a response. Reverse lookups pass the query point, which is kept as
/// the result's coordinates.
fn parse_response(
    provider: &str,
    body: GoogleResponse,
    query_point: Option<(f64, f64)>,
) -> Result<GeocodeResult, ProviderError> {
    if body.status != "OK" {
        return Err(classify_status(provider, &body.status, &body.error_message));
    }
    let result = body
        .results
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::not_found(provider, "no results returned"))?;

    let location_type = result.geometry.location_type;
    let mut raw = RawFields::new().with("location_type", &location_type);
    for component in &result.address_components {
        if let Some(key) = component.types.iter().find_map(|t| component_key(t)) {
            if raw.get(key).is_none() {
                raw.insert(key, &component.long_name);
            }
        }
    }

    let (latitude, longitude) = match (query_point, result.geometry.location) {
        (Some(point), _) => point,
        (None, Some(location)) => (location.lat, location.lng),
        (None, None) => return Err(ProviderError::malformed(provider, "result without location")),
    };

    Ok(GeocodeResult::new(
        provider,
        result.formatted_address,
        latitude,
        longitude,
        precision_from_location_type(&location_type),
    )?
    .with_raw_fields(raw))
}

// Google API types

#[derive(Debug, Deserialize)]
struct GoogleResponse {
    #[serde(default, deserialize_with = "lenient_string")]
    status: String,
    #[serde(default, deserialize_with = "lenient_string")]
    error_message: String,
    #[serde(default)]
    results: Vec<GoogleResult>,
}

#[derive(Debug, Deserialize)]
struct GoogleResult {
    #[serde(default, deserialize_with = "lenient_string")]
    formatted_address: String,
    #[serde(default)]
    geometry: GoogleGeometry,
    #[serde(default)]
    address_components: Vec<GoogleAddressComponent>,
}

#[derive(Debug, Default, Deserialize)]
struct GoogleGeometry {
    location: Option<GoogleLocation>,
    #[serde(default, deserialize_with = "lenient_string")]
    location_type: String,
}

#[derive(Debug, Deserialize)]
struct GoogleLocation {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Deserialize)]
struct GoogleAddressComponent {
    #[serde(default, deserialize_with = "lenient_string")]
    long_name: String,
    #[serde(default)]
    types: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::decode_json;
    use geocode_core::ProviderErrorKind;

    fn body(json: &str) -> GoogleResponse {
        decode_json("google", json.as_bytes()).expect("fixture decodes")
    }

    const ROOFTOP: &str = r#"{"status":"OK","results":[{
        "formatted_address":"1600 Amphitheatre Pkwy, Mountain View, CA 94043, USA",
        "geometry":{"location":{"lat":37.4224764,"lng":-122.0842499},"location_type":"ROOFTOP"},
        "address_components":[
            {"long_name":"1600","short_name":"1600","types":["street_number"]},
            {"long_name":"Amphitheatre Parkway","short_name":"Amphitheatre Pkwy","types":["route"]},
            {"long_name":"Mountain View","short_name":"Mountain View","types":["locality","political"]},
            {"long_name":"California","short_name":"CA","types":["administrative_area_level_1","political"]},
            {"long_name":"United States","short_name":"US","types":["country","political"]},
            {"long_name":"94043","short_name":"94043","types":["postal_code"]}
        ]}]}"#;

    #[test]
    fn test_provider_creation() {
        let config = GoogleProvider::default_config("google", "key").with_max_retries(1);
        let provider = GoogleProvider::new(config).expect("create provider");
        assert_eq!(provider.provider_type(), ProviderType::Google);
        assert_eq!(provider.max_retries(), 1);
        assert_eq!(provider.base_url(), GoogleProvider::DEFAULT_BASE_URL);
    }

    #[test]
    fn test_parse_geocode_success() {
        let result = parse_response("google", body(ROOFTOP), None).unwrap();
        assert_eq!(result.latitude(), 37.4224764);
        assert_eq!(result.longitude(), -122.0842499);
        assert_eq!(result.precision_level(), PrecisionLevel::Exact);

        let raw = result.raw_fields();
        assert_eq!(raw.get("street_number"), Some("1600"));
        assert_eq!(raw.get("street"), Some("Amphitheatre Parkway"));
        assert_eq!(raw.get("city"), Some("Mountain View"));
        assert_eq!(raw.get("province"), Some("California"));
        assert_eq!(raw.get("country"), Some("United States"));
        assert_eq!(raw.get("postal_code"), Some("94043"));
        assert_eq!(raw.get("location_type"), Some("ROOFTOP"));
    }

    #[test]
    fn test_parse_reverse_keeps_query_point() {
        let result = parse_response("google", body(ROOFTOP), Some((37.42, -122.08))).unwrap();
        assert_eq!(result.latitude(), 37.42);
        assert_eq!(result.longitude(), -122.08);
    }

    #[test]
    fn test_status_classification() {
        let kind = |status: &str| classify_status("google", status, "").kind;
        assert_eq!(kind("ZERO_RESULTS"), ProviderErrorKind::NotFound);
        assert_eq!(kind("INVALID_REQUEST"), ProviderErrorKind::NotFound);
        assert_eq!(kind("OVER_QUERY_LIMIT"), ProviderErrorKind::QuotaExceeded);
        assert_eq!(kind("OVER_DAILY_LIMIT"), ProviderErrorKind::QuotaExceeded);
        assert_eq!(kind("REQUEST_DENIED"), ProviderErrorKind::InvalidCredential);
        assert_eq!(kind("UNKNOWN_ERROR"), ProviderErrorKind::Unreachable);
        assert_eq!(kind("SOMETHING_NEW"), ProviderErrorKind::MalformedResponse);
    }

    #[test]
    fn test_denied_message_included() {
        let err = parse_response(
            "google",
            body(r#"{"status":"REQUEST_DENIED","error_message":"The provided API key is invalid.","results":[]}"#),
            None,
        )
        .unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::InvalidCredential);
        assert_eq!(err.message, "REQUEST_DENIED: The provided API key is invalid.");
    }

    #[test]
    fn test_ok_without_results_is_not_found() {
        let err = parse_response("google", body(r#"{"status":"OK","results":[]}"#), None).unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::NotFound);
    }

    #[test]
    fn test_missing_location_is_malformed() {
        let err = parse_response(
            "google",
            body(r#"{"status":"OK","results":[{"formatted_address":"x","geometry":{}}]}"#),
            None,
        )
        .unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::MalformedResponse);
    }

    #[test]
    fn test_precision_from_location_type() {
        assert_eq!(precision_from_location_type("ROOFTOP"), PrecisionLevel::Exact);
        assert_eq!(precision_from_location_type("APPROXIMATE"), PrecisionLevel::Approximate);
        assert_eq!(precision_from_location_type(""), PrecisionLevel::Unknown);
    }
}
