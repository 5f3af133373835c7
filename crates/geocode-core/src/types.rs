//! Validated request types for forward and reverse lookups.
//!
//! Requests are validated once at construction and are immutable afterwards,
//! so an invalid request can never reach the cache or a provider.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation error for inbound requests
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Address is empty after trimming
    #[error("Invalid address: must not be empty")]
    EmptyAddress,

    /// Address exceeds the maximum length
    #[error("Invalid address: {length} characters exceeds the limit of {max}")]
    AddressTooLong {
        /// Length of the trimmed address in characters
        length: usize,
        /// Maximum allowed length
        max: usize,
    },

    /// Region hint exceeds the maximum length
    #[error("Invalid region_hint: {length} characters exceeds the limit of {max}")]
    RegionHintTooLong {
        /// Length of the trimmed hint in characters
        length: usize,
        /// Maximum allowed length
        max: usize,
    },

    /// Latitude is not a finite number within [-90, 90]
    #[error("Invalid latitude {value}: must be a finite number between -90 and 90")]
    InvalidLatitude {
        /// The invalid value provided
        value: f64,
    },

    /// Longitude is not a finite number within [-180, 180]
    #[error("Invalid longitude {value}: must be a finite number between -180 and 180")]
    InvalidLongitude {
        /// The invalid value provided
        value: f64,
    },

    /// Search radius out of range
    #[error("Invalid radius_m {value}: must be between {min} and {max}")]
    InvalidRadius {
        /// The invalid value provided
        value: u32,
        /// Minimum allowed value
        min: u32,
        /// Maximum allowed value
        max: u32,
    },

    /// Arguments could not be decoded into a request
    #[error("Invalid arguments: {reason}")]
    InvalidArguments {
        /// Reason for the failure
        reason: String,
    },
}

impl ValidationError {
    /// Name of the offending field, if the error concerns a single field
    #[must_use]
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::EmptyAddress | Self::AddressTooLong { .. } => Some("address"),
            Self::RegionHintTooLong { .. } => Some("region_hint"),
            Self::InvalidLatitude { .. } => Some("latitude"),
            Self::InvalidLongitude { .. } => Some("longitude"),
            Self::InvalidRadius { .. } => Some("radius_m"),
            Self::InvalidArguments { .. } => None,
        }
    }

    /// Stable error code for programmatic handling
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::EmptyAddress => "empty_address",
            Self::AddressTooLong { .. } => "address_too_long",
            Self::RegionHintTooLong { .. } => "region_hint_too_long",
            Self::InvalidLatitude { .. } => "invalid_latitude",
            Self::InvalidLongitude { .. } => "invalid_longitude",
            Self::InvalidRadius { .. } => "invalid_radius",
            Self::InvalidArguments { .. } => "invalid_arguments",
        }
    }
}

/// Returns `true` when both values are finite and inside the WGS84 ranges.
#[must_use]
pub fn is_valid_coordinate(latitude: f64, longitude: f64) -> bool {
    latitude.is_finite()
        && longitude.is_finite()
        && (-90.0..=90.0).contains(&latitude)
        && (-180.0..=180.0).contains(&longitude)
}

/// Forward geocoding request: free-text address to coordinates
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawGeocodeRequest")]
pub struct GeocodeRequest {
    address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    region_hint: Option<String>,
}

impl GeocodeRequest {
    /// Maximum address length in characters, after trimming
    pub const MAX_ADDRESS_CHARS: usize = 500;
    /// Maximum region hint length in characters, after trimming
    pub const MAX_REGION_HINT_CHARS: usize = 100;

    /// Create a validated request.
    ///
    /// Both values are trimmed; an empty region hint is treated as absent.
    ///
    /// # Errors
    /// Returns `ValidationError` if the address is empty or either value is too long
    pub fn new(
        address: impl AsRef<str>,
        region_hint: Option<&str>,
    ) -> Result<Self, ValidationError> {
        let address = address.as_ref().trim();
        if address.is_empty() {
            return Err(ValidationError::EmptyAddress);
        }
        let length = address.chars().count();
        if length > Self::MAX_ADDRESS_CHARS {
            return Err(ValidationError::AddressTooLong {
                length,
                max: Self::MAX_ADDRESS_CHARS,
            });
        }

        let region_hint = match region_hint.map(str::trim).filter(|h| !h.is_empty()) {
            Some(hint) => {
                let length = hint.chars().count();
                if length > Self::MAX_REGION_HINT_CHARS {
                    return Err(ValidationError::RegionHintTooLong {
                        length,
                        max: Self::MAX_REGION_HINT_CHARS,
                    });
                }
                Some(hint.to_string())
            }
            None => None,
        };

        Ok(Self {
            address: address.to_string(),
            region_hint,
        })
    }

    /// The trimmed address
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// The trimmed region hint, if any
    #[must_use]
    pub fn region_hint(&self) -> Option<&str> {
        self.region_hint.as_deref()
    }
}

#[derive(Deserialize)]
struct RawGeocodeRequest {
    address: String,
    #[serde(default, alias = "city")]
    region_hint: Option<String>,
}

impl TryFrom<RawGeocodeRequest> for GeocodeRequest {
    type Error = ValidationError;

    fn try_from(raw: RawGeocodeRequest) -> Result<Self, Self::Error> {
        Self::new(raw.address, raw.region_hint.as_deref())
    }
}

/// Reverse geocoding request: coordinates to address
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawReverseGeocodeRequest")]
pub struct ReverseGeocodeRequest {
    latitude: f64,
    longitude: f64,
    radius_m: u32,
}

impl ReverseGeocodeRequest {
    /// Default search radius in metres
    pub const DEFAULT_RADIUS_M: u32 = 1000;
    /// Minimum search radius in metres
    pub const MIN_RADIUS_M: u32 = 1;
    /// Maximum search radius in metres
    pub const MAX_RADIUS_M: u32 = 50_000;

    /// Create a validated request with the default search radius
    ///
    /// # Errors
    /// Returns `ValidationError` if either coordinate is out of range or not finite
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, ValidationError> {
        Self::with_radius(latitude, longitude, Self::DEFAULT_RADIUS_M)
    }

    /// Create a validated request with an explicit search radius
    ///
    /// # Errors
    /// Returns `ValidationError` if a coordinate or the radius is out of range
    pub fn with_radius(
        latitude: f64,
        longitude: f64,
        radius_m: u32,
    ) -> Result<Self, ValidationError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(ValidationError::InvalidLatitude { value: latitude });
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(ValidationError::InvalidLongitude { value: longitude });
        }
        if !(Self::MIN_RADIUS_M..=Self::MAX_RADIUS_M).contains(&radius_m) {
            return Err(ValidationError::InvalidRadius {
                value: radius_m,
                min: Self::MIN_RADIUS_M,
                max: Self::MAX_RADIUS_M,
            });
        }
        Ok(Self {
            latitude,
            longitude,
            radius_m,
        })
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

    /// Search radius in metres
    #[must_use]
    pub fn radius_m(&self) -> u32 {
        self.radius_m
    }
}

#[derive(Deserialize)]
struct RawReverseGeocodeRequest {
    #[serde(alias = "lat")]
    latitude: f64,
    #[serde(alias = "lng", alias = "lon")]
    longitude: f64,
    #[serde(default, alias = "radius")]
    radius_m: Option<u32>,
}

impl TryFrom<RawReverseGeocodeRequest> for ReverseGeocodeRequest {
    type Error = ValidationError;

    fn try_from(raw: RawReverseGeocodeRequest) -> Result<Self, Self::Error> {
        Self::with_radius(
            raw.latitude,
            raw.longitude,
            raw.radius_m.unwrap_or(Self::DEFAULT_RADIUS_M),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geocode_request_trims() {
        let req = GeocodeRequest::new("  Beijing, Chaoyang  ", Some("  Beijing ")).expect("valid");
        assert_eq!(req.address(), "Beijing, Chaoyang");
        assert_eq!(req.region_hint(), Some("Beijing"));
    }

    #[test]
    fn test_geocode_request_empty_hint_is_absent() {
        let req = GeocodeRequest::new("Shanghai", Some("   ")).expect("valid");
        assert_eq!(req.region_hint(), None);
    }

    #[test]
    fn test_geocode_request_rejects_empty() {
        assert_eq!(
            GeocodeRequest::new("   \t ", None),
            Err(ValidationError::EmptyAddress)
        );
    }

    #[test]
    fn test_geocode_request_length_limit_counts_chars() {
        // 500 multi-byte characters are fine, 501 are not
        let ok = "京".repeat(GeocodeRequest::MAX_ADDRESS_CHARS);
        assert!(GeocodeRequest::new(&ok, None).is_ok());

        let too_long = "京".repeat(GeocodeRequest::MAX_ADDRESS_CHARS + 1);
        let err = GeocodeRequest::new(&too_long, None).unwrap_err();
        assert_eq!(err.field(), Some("address"));
        assert_eq!(err.code(), "address_too_long");
    }

    #[test]
    fn test_geocode_request_region_hint_limit() {
        let hint = "x".repeat(101);
        let err = GeocodeRequest::new("Main St", Some(&hint)).unwrap_err();
        assert!(matches!(err, ValidationError::RegionHintTooLong { length: 101, .. }));
    }

    #[test]
    fn test_geocode_request_deserialize_validates() {
        let req: GeocodeRequest =
            serde_json::from_str(r#"{"address":" Tiananmen ","city":"Beijing"}"#).expect("valid");
        assert_eq!(req.address(), "Tiananmen");
        assert_eq!(req.region_hint(), Some("Beijing"));

        assert!(serde_json::from_str::<GeocodeRequest>(r#"{"address":"  "}"#).is_err());
    }

    #[test]
    fn test_reverse_request_ranges() {
        assert!(ReverseGeocodeRequest::new(90.0, 180.0).is_ok());
        assert!(ReverseGeocodeRequest::new(-90.0, -180.0).is_ok());
        assert!(matches!(
            ReverseGeocodeRequest::new(90.1, 0.0),
            Err(ValidationError::InvalidLatitude { .. })
        ));
        assert!(matches!(
            ReverseGeocodeRequest::new(0.0, -180.5),
            Err(ValidationError::InvalidLongitude { .. })
        ));
        assert!(ReverseGeocodeRequest::new(f64::NAN, 0.0).is_err());
        assert!(ReverseGeocodeRequest::new(0.0, f64::INFINITY).is_err());
    }

    #[test]
    fn test_reverse_request_radius() {
        let req = ReverseGeocodeRequest::new(39.9, 116.4).expect("valid");
        assert_eq!(req.radius_m(), ReverseGeocodeRequest::DEFAULT_RADIUS_M);

        assert!(ReverseGeocodeRequest::with_radius(39.9, 116.4, 0).is_err());
        assert!(ReverseGeocodeRequest::with_radius(39.9, 116.4, 50_001).is_err());
        assert!(ReverseGeocodeRequest::with_radius(39.9, 116.4, 50_000).is_ok());
    }

    #[test]
    fn test_reverse_request_deserialize_aliases() {
        let req: ReverseGeocodeRequest =
            serde_json::from_str(r#"{"lat":39.9042,"lng":116.4074,"radius":500}"#).expect("valid");
        assert_eq!(req.latitude(), 39.9042);
        assert_eq!(req.longitude(), 116.4074);
        assert_eq!(req.radius_m(), 500);

        assert!(serde_json::from_str::<ReverseGeocodeRequest>(r#"{"latitude":91,"longitude":0}"#)
            .is_err());
    }

    #[test]
    fn test_is_valid_coordinate() {
        assert!(is_valid_coordinate(0.0, 0.0));
        assert!(!is_valid_coordinate(f64::NAN, 0.0));
        assert!(!is_valid_coordinate(0.0, 181.0));
    }
}
