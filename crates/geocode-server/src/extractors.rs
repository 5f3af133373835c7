//! Custom Axum extractors for the gateway.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use std::convert::Infallible;

/// Header carrying the caller key used for per-client rate limiting
pub const CLIENT_ID_HEADER: &str = "x-client-id";

/// Header carrying the request id
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest caller key accepted from the header
const MAX_CLIENT_ID_LEN: usize = 128;

/// Caller key from the `x-client-id` header
#[derive(Debug, Clone, Default)]
pub struct ClientId(pub Option<String>);

impl ClientId {
    /// The key as passed to the gateway
    #[must_use]
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for ClientId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(client_id_from(parts)))
    }
}

fn client_id_from(parts: &Parts) -> Option<String> {
    let value = parts.headers.get(CLIENT_ID_HEADER)?.to_str().ok()?.trim();
    if value.is_empty() || value.len() > MAX_CLIENT_ID_LEN {
        return None;
    }
    Some(value.to_string())
}

/// Request id set by the request id middleware
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for RequestId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map_or_else(|| uuid::Uuid::new_v4().to_string(), String::from);
        Ok(Self(id))
    }
}
