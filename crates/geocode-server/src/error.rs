//! API error handling.
//!
//! Renders a [`GatewayError`] as `{"error": {...}}` with the status code of its
//! kind. Rate-limited responses also carry `Retry-After`.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use geocode_core::{retry_after_secs, ApiErrorResponse, GatewayError};
use tracing::{debug, error};

/// Error returned by handlers
#[derive(Debug)]
pub struct ApiError(pub GatewayError);

impl ApiError {
    /// HTTP status for this error
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.0.status_code()
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ApiErrorResponse::from(&self.0);

        if status.is_server_error() {
            error!(status = %status, kind = %self.0.kind().as_str(), message = %self.0, "API error response");
        } else {
            debug!(status = %status, kind = %self.0.kind().as_str(), message = %self.0, "API error response");
        }

        let mut response = (status, Json(body)).into_response();
        if let Some(wait) = self.0.retry_after() {
            if let Ok(value) = HeaderValue::from_str(&retry_after_secs(wait).to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}
