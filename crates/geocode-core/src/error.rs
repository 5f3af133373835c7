//! Error types and handling for the gateway.
//!
//! Two layers of errors exist:
//! - [`ProviderError`] is what a single backend call produces, classified into
//!   a small provider-neutral taxonomy.
//! - [`GatewayError`] is what callers of the gateway see. Retryable provider
//!   errors never surface individually; they are folded into
//!   [`GatewayError::ProvidersExhausted`].

use crate::types::ValidationError;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result type alias using `GatewayError`
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Classification of a failed backend call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    /// The credential was rejected; the provider is unusable for the process lifetime
    InvalidCredential,
    /// The backend's quota or rate limit was hit
    QuotaExceeded,
    /// The backend has no result for the input
    NotFound,
    /// The backend returned an unparseable or out-of-range payload
    MalformedResponse,
    /// The call did not complete in time
    Timeout,
    /// The backend could not be reached or reported an internal failure
    Unreachable,
}

impl ProviderErrorKind {
    /// Whether the resilience layer may retry or fall back on this kind
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::InvalidCredential | Self::NotFound)
    }

    /// Get the string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidCredential => "invalid_credential",
            Self::QuotaExceeded => "quota_exceeded",
            Self::NotFound => "not_found",
            Self::MalformedResponse => "malformed_response",
            Self::Timeout => "timeout",
            Self::Unreachable => "unreachable",
        }
    }
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error produced by a single provider call
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{provider}: {kind}: {message}")]
pub struct ProviderError {
    /// Provider that produced the error
    pub provider: String,
    /// Classified kind
    pub kind: ProviderErrorKind,
    /// Human-readable description built from the backend's status fields
    pub message: String,
}

impl ProviderError {
    /// Create a new provider error
    #[must_use]
    pub fn new(
        provider: impl Into<String>,
        kind: ProviderErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            kind,
            message: message.into(),
        }
    }

    /// Create an invalid credential error
    #[must_use]
    pub fn invalid_credential(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(provider, ProviderErrorKind::InvalidCredential, message)
    }

    /// Create a quota exceeded error
    #[must_use]
    pub fn quota_exceeded(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(provider, ProviderErrorKind::QuotaExceeded, message)
    }

    /// Create a not found error
    #[must_use]
    pub fn not_found(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(provider, ProviderErrorKind::NotFound, message)
    }

    /// Create a malformed response error
    #[must_use]
    pub fn malformed(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(provider, ProviderErrorKind::MalformedResponse, message)
    }

    /// Create a timeout error
    #[must_use]
    pub fn timeout(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(provider, ProviderErrorKind::Timeout, message)
    }

    /// Create an unreachable error
    #[must_use]
    pub fn unreachable(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(provider, ProviderErrorKind::Unreachable, message)
    }

    /// Whether the resilience layer may retry or fall back on this error
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

/// Stable error kind surfaced to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed input
    Validation,
    /// Inbound admission rejected
    RateLimited,
    /// Every provider in the chain failed or was disabled
    ProvidersExhausted,
    /// The chain did not complete within the global timeout
    Timeout,
    /// A provider rejected its credential
    InvalidCredential,
    /// Invalid gateway configuration
    Configuration,
    /// Unexpected internal failure
    Internal,
}

impl ErrorKind {
    /// Every kind, in a fixed order
    pub const ALL: [ErrorKind; 7] = [
        Self::Validation,
        Self::RateLimited,
        Self::ProvidersExhausted,
        Self::Timeout,
        Self::InvalidCredential,
        Self::Configuration,
        Self::Internal,
    ];

    /// Get the string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation_error",
            Self::RateLimited => "rate_limited",
            Self::ProvidersExhausted => "providers_exhausted",
            Self::Timeout => "timeout",
            Self::InvalidCredential => "invalid_credential",
            Self::Configuration => "configuration_error",
            Self::Internal => "internal_error",
        }
    }

    /// Position of this kind in [`ErrorKind::ALL`]
    #[must_use]
    pub fn index(&self) -> usize {
        match self {
            Self::Validation => 0,
            Self::RateLimited => 1,
            Self::ProvidersExhausted => 2,
            Self::Timeout => 3,
            Self::InvalidCredential => 4,
            Self::Configuration => 5,
            Self::Internal => 6,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Gateway error type covering every caller-visible failure
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// Request validation failed
    #[error("Validation error: {message}")]
    Validation {
        /// Error message
        message: String,
        /// Field that failed validation (if applicable)
        field: Option<String>,
        /// Error code for programmatic handling
        code: String,
    },

    /// Inbound rate limit exceeded
    #[error("Rate limit exceeded: {limit} requests per window, retry after {retry_after:?}")]
    RateLimited {
        /// Time remaining until the current window resets
        retry_after: Duration,
        /// Limit that was exceeded
        limit: u32,
    },

    /// Every provider in the chain failed or was disabled
    #[error("All providers exhausted{}", summarize_attempts(.attempts))]
    ProvidersExhausted {
        /// Last error per provider attempted, in chain order
        attempts: Vec<ProviderError>,
    },

    /// The fallback chain did not complete in time
    #[error("Request timeout after {duration:?}")]
    Timeout {
        /// Duration after which the chain was cancelled
        duration: Duration,
    },

    /// A provider rejected its credential and has been disabled
    #[error("Invalid credential for provider {provider}: {message}")]
    InvalidCredential {
        /// Provider that rejected the credential
        provider: String,
        /// Error message
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Configuration {
        /// Error message
        message: String,
    },

    /// Internal error
    #[error("Internal error: {message}")]
    Internal {
        /// Error message
        message: String,
    },
}

fn summarize_attempts(attempts: &[ProviderError]) -> String {
    if attempts.is_empty() {
        return ": no enabled provider".to_string();
    }
    let parts: Vec<String> = attempts
        .iter()
        .map(|e| format!("{} ({})", e.provider, e.kind))
        .collect();
    format!(": {}", parts.join(", "))
}

impl GatewayError {
    /// Get the stable kind of this error
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::ProvidersExhausted { .. } => ErrorKind::ProvidersExhausted,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::InvalidCredential { .. } => ErrorKind::InvalidCredential,
            Self::Configuration { .. } => ErrorKind::Configuration,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Get the HTTP status code for this error
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::ProvidersExhausted { .. } | Self::InvalidCredential { .. } => {
                StatusCode::BAD_GATEWAY
            }
            Self::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::Configuration { .. } | Self::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Get the error code for programmatic handling
    #[must_use]
    pub fn error_code(&self) -> &str {
        match self {
            Self::Validation { code, .. } => code,
            Self::RateLimited { .. } => "rate_limit_exceeded",
            Self::ProvidersExhausted { .. } => "providers_exhausted",
            Self::Timeout { .. } => "timeout",
            Self::InvalidCredential { .. } => "invalid_credential",
            Self::Configuration { .. } => "configuration_error",
            Self::Internal { .. } => "internal_error",
        }
    }

    /// Time to wait before retrying, for rate-limited requests
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }

    /// Create a validation error
    #[must_use]
    pub fn validation(message: impl Into<String>, field: Option<String>, code: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field,
            code: code.into(),
        }
    }

    /// Create a rate limit error
    #[must_use]
    pub fn rate_limited(retry_after: Duration, limit: u32) -> Self {
        Self::RateLimited { retry_after, limit }
    }

    /// Create a providers exhausted error
    #[must_use]
    pub fn providers_exhausted(attempts: Vec<ProviderError>) -> Self {
        Self::ProvidersExhausted { attempts }
    }

    /// Create a timeout error
    #[must_use]
    pub fn timeout(duration: Duration) -> Self {
        Self::Timeout { duration }
    }

    /// Create a configuration error
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl From<ValidationError> for GatewayError {
    fn from(err: ValidationError) -> Self {
        Self::Validation {
            message: err.to_string(),
            field: err.field().map(str::to_string),
            code: err.code().to_string(),
        }
    }
}

impl From<ProviderError> for GatewayError {
    fn from(err: ProviderError) -> Self {
        match err.kind {
            ProviderErrorKind::InvalidCredential => Self::InvalidCredential {
                provider: err.provider,
                message: err.message,
            },
            _ => Self::ProvidersExhausted {
                attempts: vec![err],
            },
        }
    }
}

/// API error response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    /// Error details
    pub error: ApiError,
}

/// API error details
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Stable error kind
    #[serde(rename = "type")]
    pub error_type: String,
    /// Error code
    pub code: String,
    /// Human-readable message
    pub message: String,
    /// Parameter that caused the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
    /// Seconds until a rate-limited caller may retry
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
    /// Per-provider failures for an exhausted chain
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attempts: Vec<ProviderError>,
}

impl From<&GatewayError> for ApiErrorResponse {
    fn from(err: &GatewayError) -> Self {
        let param = match err {
            GatewayError::Validation { field, .. } => field.clone(),
            _ => None,
        };
        let attempts = match err {
            GatewayError::ProvidersExhausted { attempts } => attempts.clone(),
            _ => Vec::new(),
        };

        Self {
            error: ApiError {
                error_type: err.kind().as_str().to_string(),
                code: err.error_code().to_string(),
                message: err.to_string(),
                param,
                retry_after_secs: err.retry_after().map(retry_after_secs),
                attempts,
            },
        }
    }
}

/// Round a wait duration up to whole seconds, never below one
#[must_use]
pub fn retry_after_secs(duration: Duration) -> u64 {
    let secs = duration.as_secs() + u64::from(duration.subsec_nanos() > 0);
    secs.max(1)
}

impl fmt::Display for ApiErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            GatewayError::validation("test", None, "test_code").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GatewayError::rate_limited(Duration::from_secs(3), 5).status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            GatewayError::providers_exhausted(vec![]).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            GatewayError::timeout(Duration::from_secs(30)).status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            GatewayError::configuration("bad").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_provider_kind_retryability() {
        assert!(!ProviderErrorKind::InvalidCredential.is_retryable());
        assert!(!ProviderErrorKind::NotFound.is_retryable());
        assert!(ProviderErrorKind::QuotaExceeded.is_retryable());
        assert!(ProviderErrorKind::MalformedResponse.is_retryable());
        assert!(ProviderErrorKind::Timeout.is_retryable());
        assert!(ProviderErrorKind::Unreachable.is_retryable());
    }

    #[test]
    fn test_kind_strings_are_stable() {
        let kinds: Vec<&str> = ErrorKind::ALL.iter().map(ErrorKind::as_str).collect();
        assert_eq!(
            kinds,
            vec![
                "validation_error",
                "rate_limited",
                "providers_exhausted",
                "timeout",
                "invalid_credential",
                "configuration_error",
                "internal_error",
            ]
        );
        for (i, kind) in ErrorKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }

    #[test]
    fn test_from_validation_error() {
        let err = GatewayError::from(ValidationError::InvalidLatitude { value: 95.0 });
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.error_code(), "invalid_latitude");
        match err {
            GatewayError::Validation { field, .. } => assert_eq!(field.as_deref(), Some("latitude")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_from_provider_error() {
        let err = GatewayError::from(ProviderError::invalid_credential("amap", "INVALID_USER_KEY"));
        assert_eq!(err.kind(), ErrorKind::InvalidCredential);

        let err = GatewayError::from(ProviderError::timeout("baidu", "timed out"));
        assert_eq!(err.kind(), ErrorKind::ProvidersExhausted);
    }

    #[test]
    fn test_exhausted_message_lists_providers() {
        let err = GatewayError::providers_exhausted(vec![
            ProviderError::timeout("amap", "timed out"),
            ProviderError::quota_exceeded("google", "OVER_QUERY_LIMIT"),
        ]);
        assert_eq!(
            err.to_string(),
            "All providers exhausted: amap (timeout), google (quota_exceeded)"
        );
        assert_eq!(
            GatewayError::providers_exhausted(vec![]).to_string(),
            "All providers exhausted: no enabled provider"
        );
    }

    #[test]
    fn test_api_error_response() {
        let err = GatewayError::rate_limited(Duration::from_millis(2500), 5);
        let response = ApiErrorResponse::from(&err);

        assert_eq!(response.error.error_type, "rate_limited");
        assert_eq!(response.error.code, "rate_limit_exceeded");
        assert_eq!(response.error.retry_after_secs, Some(3));
        assert!(response.error.attempts.is_empty());
    }

    #[test]
    fn test_retry_after_secs_never_zero() {
        assert_eq!(retry_after_secs(Duration::from_millis(1)), 1);
        assert_eq!(retry_after_secs(Duration::from_secs(60)), 60);
        assert_eq!(retry_after_secs(Duration::ZERO), 1);
    }
}
