//! Provider-neutral result shape.
//!
//! Every provider client translates its backend payload into a
//! [`GeocodeResult`]. Construction rejects coordinates that are not finite or
//! fall outside the WGS84 ranges, so a result held by the gateway is always
//! valid geodata.

use crate::error::{ProviderError, ProviderErrorKind};
use crate::types::is_valid_coordinate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Coarse confidence classification of a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrecisionLevel {
    /// Street number, building or point of interest
    Exact,
    /// Street, district, city or other area-level match
    Approximate,
    /// The backend gave no usable precision indication
    #[default]
    Unknown,
}

impl PrecisionLevel {
    /// Get the string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Approximate => "approximate",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for PrecisionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bounded mapping of backend-specific extras.
///
/// Only keys from [`RawFields::ALLOWED_KEYS`] are kept, empty values are
/// dropped and every value is truncated to [`RawFields::MAX_VALUE_CHARS`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct RawFields(BTreeMap<String, String>);

impl RawFields {
    /// Keys that may be carried through from a backend response
    pub const ALLOWED_KEYS: [&'static str; 12] = [
        "country",
        "province",
        "city",
        "district",
        "township",
        "street",
        "street_number",
        "adcode",
        "postal_code",
        "level",
        "location_type",
        "confidence",
    ];

    /// Maximum stored length of a single value, in characters
    pub const MAX_VALUE_CHARS: usize = 128;

    /// Create an empty set of fields
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a field if its key is allowed and its value is non-empty.
    ///
    /// Returns `true` if the field was stored.
    pub fn insert(&mut self, key: &str, value: impl AsRef<str>) -> bool {
        let value = value.as_ref().trim();
        if value.is_empty() || !Self::ALLOWED_KEYS.contains(&key) {
            return false;
        }
        let value: String = value.chars().take(Self::MAX_VALUE_CHARS).collect();
        self.0.insert(key.to_string(), value);
        true
    }

    /// Builder form of [`RawFields::insert`]
    #[must_use]
    pub fn with(mut self, key: &str, value: impl AsRef<str>) -> Self {
        self.insert(key, value);
        self
    }

    /// Look up a field
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Number of stored fields
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no fields are stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the stored fields in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl From<BTreeMap<String, String>> for RawFields {
    fn from(map: BTreeMap<String, String>) -> Self {
        let mut fields = Self::new();
        for (key, value) in map {
            fields.insert(&key, value);
        }
        fields
    }
}

impl From<RawFields> for BTreeMap<String, String> {
    fn from(fields: RawFields) -> Self {
        fields.0
    }
}

/// A resolved location
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeocodeResult {
    formatted_address: String,
    latitude: f64,
    longitude: f64,
    precision_level: PrecisionLevel,
    provider_name: String,
    #[serde(skip_serializing_if = "RawFields::is_empty")]
    raw_fields: RawFields,
}

impl GeocodeResult {
    /// Create a result, validating the coordinates.
    ///
    /// # Errors
    /// Returns a `MalformedResponse` provider error if either coordinate is
    /// not finite or lies outside the valid range
    pub fn new(
        provider_name: impl Into<String>,
        formatted_address: impl Into<String>,
        latitude: f64,
        longitude: f64,
        precision_level: PrecisionLevel,
    ) -> Result<Self, ProviderError> {
        let provider_name = provider_name.into();
        if !is_valid_coordinate(latitude, longitude) {
            return Err(ProviderError::new(
                provider_name,
                ProviderErrorKind::MalformedResponse,
                format!("coordinates out of range: ({latitude}, {longitude})"),
            ));
        }
        Ok(Self {
            formatted_address: formatted_address.into(),
            latitude,
            longitude,
            precision_level,
            provider_name,
            raw_fields: RawFields::new(),
        })
    }

    /// Attach backend-specific extras
    #[must_use]
    pub fn with_raw_fields(mut self, raw_fields: RawFields) -> Self {
        self.raw_fields = raw_fields;
        self
    }

    /// Human-readable address
    #[must_use]
    pub fn formatted_address(&self) -> &str {
        &self.formatted_address
    }

    /// Latitude in degrees
    #[must_use]
    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    /// Longitude in degrees
    #[must_use]
    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Precision classification
    #[must_use]
    pub fn precision_level(&self) -> PrecisionLevel {
        self.precision_level
    }

    /// Name of the provider that produced the result
    #[must_use]
    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }

    /// Backend-specific extras
    #[must_use]
    pub fn raw_fields(&self) -> &RawFields {
        &self.raw_fields
    }
}

/// Outcome of a lookup: a location, or a legitimate empty result
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GeocodeOutcome {
    /// The backend resolved the request
    Found(GeocodeResult),
    /// The backend has no result for the input
    NotFound {
        /// Provider that answered
        provider: String,
    },
}

impl GeocodeOutcome {
    /// Create a not-found outcome
    #[must_use]
    pub fn not_found(provider: impl Into<String>) -> Self {
        Self::NotFound {
            provider: provider.into(),
        }
    }

    /// Whether a location was found
    #[must_use]
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    /// Borrow the result, if any
    #[must_use]
    pub fn result(&self) -> Option<&GeocodeResult> {
        match self {
            Self::Found(result) => Some(result),
            Self::NotFound { .. } => None,
        }
    }

    /// Take the result, if any
    #[must_use]
    pub fn into_result(self) -> Option<GeocodeResult> {
        match self {
            Self::Found(result) => Some(result),
            Self::NotFound { .. } => None,
        }
    }

    /// Name of the provider that answered
    #[must_use]
    pub fn provider(&self) -> &str {
        match self {
            Self::Found(result) => result.provider_name(),
            Self::NotFound { provider } => provider,
        }
    }
}

impl From<GeocodeResult> for GeocodeOutcome {
    fn from(result: GeocodeResult) -> Self {
        Self::Found(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_rejects_out_of_range() {
        let err = GeocodeResult::new("amap", "x", 91.0, 0.0, PrecisionLevel::Exact).unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::MalformedResponse);
        assert_eq!(err.provider, "amap");

        assert!(GeocodeResult::new("amap", "x", 0.0, f64::NAN, PrecisionLevel::Exact).is_err());
    }

    #[test]
    fn test_raw_fields_allow_list() {
        let mut fields = RawFields::new();
        assert!(fields.insert("city", "Beijing"));
        assert!(!fields.insert("business_area", "Sanlitun"));
        assert!(!fields.insert("district", "   "));
        assert_eq!(fields.len(), 1);
        assert_eq!(fields.get("city"), Some("Beijing"));
    }

    #[test]
    fn test_raw_fields_truncates_values() {
        let long = "a".repeat(300);
        let fields = RawFields::new().with("street", &long);
        assert_eq!(
            fields.get("street").map(|v| v.chars().count()),
            Some(RawFields::MAX_VALUE_CHARS)
        );
    }

    #[test]
    fn test_raw_fields_deserialize_filters() {
        let fields: RawFields =
            serde_json::from_str(r#"{"city":"Paris","secret":"x","country":"France"}"#)
                .expect("valid map");
        assert_eq!(fields.len(), 2);
        assert!(fields.get("secret").is_none());
    }

    #[test]
    fn test_outcome_serialization() {
        let result = GeocodeResult::new("google", "1 Main St", 10.0, 20.0, PrecisionLevel::Exact)
            .expect("valid")
            .with_raw_fields(RawFields::new().with("location_type", "ROOFTOP"));
        let json = serde_json::to_value(GeocodeOutcome::from(result)).expect("serialize");
        assert_eq!(json["status"], "found");
        assert_eq!(json["precision_level"], "exact");
        assert_eq!(json["provider_name"], "google");
        assert_eq!(json["raw_fields"]["location_type"], "ROOFTOP");

        let json = serde_json::to_value(GeocodeOutcome::not_found("baidu")).expect("serialize");
        assert_eq!(json["status"], "not_found");
        assert_eq!(json["provider"], "baidu");
    }

    #[test]
    fn test_outcome_accessors() {
        let outcome = GeocodeOutcome::not_found("amap");
        assert!(!outcome.is_found());
        assert_eq!(outcome.provider(), "amap");
        assert!(outcome.result().is_none());
    }
}
