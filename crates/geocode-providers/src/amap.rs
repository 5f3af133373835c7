//! Amap (Gaode) provider implementation.
//!
//! Uses the v3 web service API. Amap reports failures in-body through a
//! `status` of `"0"` plus a numeric `infocode`.

use crate::config::ProviderConfig;
use crate::http::{build_client, get_json, lenient_string, parse_lon_lat};
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

/// Amap provider implementation
pub struct AmapProvider {
    config: ProviderConfig,
    client: Client,
}

impl AmapProvider {
    /// Default base URL of the Amap web service
    pub const DEFAULT_BASE_URL: &'static str = "https://restapi.amap.com/v3";
    /// Largest radius Amap accepts for reverse lookups
    pub const MAX_WIRE_RADIUS_M: u32 = 3000;

    /// Create a configuration pointing at the public Amap endpoint
    #[must_use]
    pub fn default_config(name: impl Into<String>, api_key: impl Into<String>) -> ProviderConfig {
        ProviderConfig::new(name, api_key, Self::DEFAULT_BASE_URL)
    }

    /// Create a new Amap provider
    ///
    /// # Errors
    /// Returns error if HTTP client cannot be created
    pub fn new(config: ProviderConfig) -> Result<Self, GatewayError> {
        let client = build_client(config.timeout)?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl GeocodingProvider for AmapProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::Amap
    }

    async fn geocode(&self, request: &GeocodeRequest) -> Result<GeocodeResult, ProviderError> {
        let mut query = vec![
            ("key", self.config.api_key.expose_secret().as_str()),
            ("address", request.address()),
            ("output", "json"),
        ];
        if let Some(city) = request.region_hint() {
            query.push(("city", city));
        }

        debug!(provider = %self.config.name, "Sending geocode request to Amap");
        let body: AmapGeocodeResponse = get_json(
            &self.config.name,
            self.client.get(self.config.endpoint("geocode/geo")).query(&query),
        )
        .await?;

        parse_geocode(&self.config.name, request, body)
    }

    async fn reverse_geocode(
        &self,
        request: &ReverseGeocodeRequest,
    ) -> Result<GeocodeResult, ProviderError> {
        let location = format!("{:.6},{:.6}", request.longitude(), request.latitude());
        let radius = request.radius_m().min(Self::MAX_WIRE_RADIUS_M).to_string();
        let query = [
            ("key", self.config.api_key.expose_secret().as_str()),
            ("location", location.as_str()),
            ("radius", radius.as_str()),
            ("extensions", "base"),
            ("output", "json"),
        ];

        debug!(provider = %self.config.name, "Sending reverse geocode request to Amap");
        let body: AmapRegeoResponse = get_json(
            &self.config.name,
            self.client.get(self.config.endpoint("geocode/regeo")).query(&query),
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

/// Map an Amap `infocode` to the provider-neutral taxonomy
fn classify_infocode(provider: &str, infocode: &str, info: &str) -> ProviderError {
    let message = format!("{info} (infocode {infocode})");
    match infocode.parse::<u32>() {
        Ok(10001 | 10005 | 10006 | 10007 | 10009 | 10010 | 10011 | 10012 | 10013) => {
            ProviderError::invalid_credential(provider, message)
        }
        Ok(10003 | 10004 | 10014 | 10015 | 10019 | 10020 | 10021 | 10044 | 10045) => {
            ProviderError::quota_exceeded(provider, message)
        }
        Ok(20000..=20999) => ProviderError::not_found(provider, message),
        Ok(code) if code >= 30000 => ProviderError::unreachable(provider, message),
        _ => ProviderError::malformed(provider, message),
    }
}

fn precision_from_level(level: &str) -> PrecisionLevel {
    match level {
        "门牌号" | "单元号" | "兴趣点" => PrecisionLevel::Exact,
        "国家" | "省" | "市" | "区县" | "开发区" | "乡镇" | "村庄" | "热点商圈" | "道路"
        | "道路交叉路口" | "公交站台、地铁站" | "公交地铁站点" | "住宅区" | "楼栋" => {
            PrecisionLevel::Approximate
        }
        _ => PrecisionLevel::Unknown,
    }
}

fn parse_geocode(
    provider: &str,
    request: &GeocodeRequest,
    body: AmapGeocodeResponse,
) -> Result<GeocodeResult, ProviderError> {
    if body.status != "1" {
        return Err(classify_infocode(provider, &body.infocode, &body.info));
    }
    let geocode = body
        .geocodes
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::not_found(provider, "no geocodes returned"))?;

    let (latitude, longitude) = parse_lon_lat(provider, &geocode.location)?;
    let formatted_address = if geocode.formatted_address.is_empty() {
        request.address().to_string()
    } else {
        geocode.formatted_address
    };

    let raw = RawFields::new()
        .with("country", &geocode.country)
        .with("province", &geocode.province)
        .with("city", &geocode.city)
        .with("district", &geocode.district)
        .with("township", &geocode.township)
        .with("street", &geocode.street)
        .with("street_number", &geocode.number)
        .with("adcode", &geocode.adcode)
        .with("level", &geocode.level);

    Ok(GeocodeResult::new(
        provider,
        formatted_address,
        latitude,
        longitude,
        precision_from_level(&geocode.level),
    )?
    .with_raw_fields(raw))
}

fn parse_reverse(
    provider: &str,
    request: &ReverseGeocodeRequest,
    body: AmapRegeoResponse,
) -> Result<GeocodeResult, ProviderError> {
    if body.status != "1" {
        return Err(classify_infocode(provider, &body.infocode, &body.info));
    }
    let regeocode = body
        .regeocode
        .filter(|r| !r.formatted_address.is_empty())
        .ok_or_else(|| ProviderError::not_found(provider, "no address at location"))?;

    let component = regeocode.address_component;
    let street = json_str(&component.street_number, "street");
    let number = json_str(&component.street_number, "number");
    let precision = if number.is_empty() {
        PrecisionLevel::Approximate
    } else {
        PrecisionLevel::Exact
    };

    let raw = RawFields::new()
        .with("country", &component.country)
        .with("province", &component.province)
        .with("city", &component.city)
        .with("district", &component.district)
        .with("township", &component.township)
        .with("street", &street)
        .with("street_number", &number)
        .with("adcode", &component.adcode);

    Ok(GeocodeResult::new(
        provider,
        regeocode.formatted_address,
        request.latitude(),
        request.longitude(),
        precision,
    )?
    .with_raw_fields(raw))
}

/// Amap sends empty objects as `[]`, so nested objects are read loosely.
fn json_str(value: &serde_json::Value, key: &str) -> String {
    match value.get(key) {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

// Amap API types

#[derive(Debug, Deserialize)]
struct AmapGeocodeResponse {
    #[serde(default, deserialize_with = "lenient_string")]
    status: String,
    #[serde(default, deserialize_with = "lenient_string")]
    info: String,
    #[serde(default, deserialize_with = "lenient_string")]
    infocode: String,
    #[serde(default)]
    geocodes: Vec<AmapGeocode>,
}

#[derive(Debug, Deserialize)]
struct AmapGeocode {
    #[serde(default, deserialize_with = "lenient_string")]
    formatted_address: String,
    #[serde(default, deserialize_with = "lenient_string")]
    country: String,
    #[serde(default, deserialize_with = "lenient_string")]
    province: String,
    #[serde(default, deserialize_with = "lenient_string")]
    city: String,
    #[serde(default, deserialize_with = "lenient_string")]
    district: String,
    #[serde(default, deserialize_with = "lenient_string")]
    township: String,
    #[serde(default, deserialize_with = "lenient_string")]
    street: String,
    #[serde(default, deserialize_with = "lenient_string")]
    number: String,
    #[serde(default, deserialize_with = "lenient_string")]
    adcode: String,
    #[serde(default, deserialize_with = "lenient_string")]
    location: String,
    #[serde(default, deserialize_with = "lenient_string")]
    level: String,
}

#[derive(Debug, Deserialize)]
struct AmapRegeoResponse {
    #[serde(default, deserialize_with = "lenient_string")]
    status: String,
    #[serde(default, deserialize_with = "lenient_string")]
    info: String,
    #[serde(default, deserialize_with = "lenient_string")]
    infocode: String,
    #[serde(default)]
    regeocode: Option<AmapRegeocode>,
}

#[derive(Debug, Deserialize)]
struct AmapRegeocode {
    #[serde(default, deserialize_with = "lenient_string")]
    formatted_address: String,
    #[serde(default, rename = "addressComponent")]
    address_component: AmapAddressComponent,
}

#[derive(Debug, Default, Deserialize)]
struct AmapAddressComponent {
    #[serde(default, deserialize_with = "lenient_string")]
    country: String,
    #[serde(default, deserialize_with = "lenient_string")]
    province: String,
    #[serde(default, deserialize_with = "lenient_string")]
    city: String,
    #[serde(default, deserialize_with = "lenient_string")]
    district: String,
    #[serde(default, deserialize_with = "lenient_string")]
    township: String,
    #[serde(default, deserialize_with = "lenient_string")]
    adcode: String,
    #[serde(default, rename = "streetNumber")]
    street_number: serde_json::Value,
}
