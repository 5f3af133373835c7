//! # Geocode Core
//!
//! Shared building blocks for the geocoding gateway:
//! - Validated request types for forward and reverse lookups
//! - The provider-neutral result shape
//! - The provider capability trait implemented by every backend client
//! - The error taxonomy surfaced to callers

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod provider;
pub mod response;
pub mod types;

pub use error::{
    retry_after_secs, ApiError, ApiErrorResponse, ErrorKind, GatewayError, GatewayResult,
    ProviderError, ProviderErrorKind,
};
pub use provider::{GeocodingProvider, HealthStatus, Operation, ProviderStats, ProviderType};
pub use response::{GeocodeOutcome, GeocodeResult, PrecisionLevel, RawFields};
pub use types::{is_valid_coordinate, GeocodeRequest, ReverseGeocodeRequest, ValidationError};
