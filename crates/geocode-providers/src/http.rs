//! HTTP plumbing shared by the backend clients.
//!
//! Transport failures and non-success statuses are classified the same way
//! for every backend; only the in-body status codes differ per provider.

use geocode_core::{GatewayError, ProviderError};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use std::time::Duration;
use tracing::{debug, warn};

/// Build the HTTP client used by one provider instance
pub(crate) fn build_client(timeout: Duration) -> Result<Client, GatewayError> {
    Client::builder()
        .timeout(timeout)
        .pool_max_idle_per_host(16)
        .build()
        .map_err(|e| GatewayError::configuration(format!("Failed to create HTTP client: {e}")))
}

/// Classify a transport-level failure
pub(crate) fn classify_transport_error(provider: &str, err: &reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::timeout(provider, "request timed out")
    } else if err.is_connect() {
        ProviderError::unreachable(provider, "connection failed")
    } else if err.is_decode() {
        ProviderError::malformed(provider, "response body could not be decoded")
    } else {
        ProviderError::unreachable(provider, format!("request failed: {err}"))
    }
}

/// Classify a non-success HTTP status. Returns `None` for 2xx.
pub(crate) fn classify_status(provider: &str, status: StatusCode) -> Option<ProviderError> {
    if status.is_success() {
        return None;
    }
    let message = format!("HTTP {status}");
    let err = match status.as_u16() {
        401 | 403 => ProviderError::invalid_credential(provider, message),
        429 => ProviderError::quota_exceeded(provider, message),
        500..=599 => ProviderError::unreachable(provider, message),
        _ => ProviderError::malformed(provider, message),
    };
    Some(err)
}

/// Send a request and decode its JSON body
pub(crate) async fn get_json<T: DeserializeOwned>(
    provider: &str,
    request: RequestBuilder,
) -> Result<T, ProviderError> {
    let response = request
        .send()
        .await
        .map_err(|e| classify_transport_error(provider, &e))?;

    let status = response.status();
    if let Some(err) = classify_status(provider, status) {
        warn!(provider = %provider, status = %status, kind = %err.kind, "Backend returned error status");
        return Err(err);
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| classify_transport_error(provider, &e))?;
    debug!(provider = %provider, bytes = body.len(), "Backend response received");

    decode_json(provider, &body)
}

/// Decode a JSON body, mapping failures to `MalformedResponse`
pub(crate) fn decode_json<T: DeserializeOwned>(provider: &str, body: &[u8]) -> Result<T, ProviderError> {
    serde_json::from_slice(body)
        .map_err(|e| ProviderError::malformed(provider, format!("undecodable response: {e}")))
}

/// Parse a `"lon,lat"` pair as used by Amap
pub(crate) fn parse_lon_lat(provider: &str, value: &str) -> Result<(f64, f64), ProviderError> {
    let malformed = || ProviderError::malformed(provider, format!("invalid location: {value:?}"));
    let (lon, lat) = value.split_once(',').ok_or_else(malformed)?;
    let lon: f64 = lon.trim().parse().map_err(|_| malformed())?;
    let lat: f64 = lat.trim().parse().map_err(|_| malformed())?;
    Ok((lat, lon))
}

/// Deserialize a field that is usually a string but may be a number, an
/// empty array or null. Anything that is not a string or number becomes "".
pub(crate) fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}
