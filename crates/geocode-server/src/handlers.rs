//! HTTP request handlers for the gateway API.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use geocode_core::{
    GatewayError, GeocodeOutcome, GeocodeRequest, HealthStatus, Operation, ReverseGeocodeRequest,
    ValidationError,
};
use geocode_gateway::{tool_definitions, GatewayStats, HealthReport, ToolDefinition};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::{
    error::ApiError,
    extractors::{ClientId, RequestId},
    state::AppState,
};

/// Decode a JSON body into a validated request. Failures count as rejected
/// requests in the gateway statistics.
fn decode_body<T: DeserializeOwned>(state: &AppState, operation: Operation, body: &Bytes) -> Result<T, ApiError> {
    let value: Value = serde_json::from_slice(body).map_err(|e| {
        let err = GatewayError::from(ValidationError::InvalidArguments {
            reason: format!("invalid JSON body: {e}"),
        });
        state.gateway.record_rejected(operation, &err);
        err
    })?;
    Ok(state.gateway.parse_request(operation, value)?)
}

/// Found renders 200, not found renders 404; both carry the outcome body
fn outcome_response(outcome: GeocodeOutcome) -> Response {
    let status = match outcome {
        GeocodeOutcome::Found(_) => StatusCode::OK,
        GeocodeOutcome::NotFound { .. } => StatusCode::NOT_FOUND,
    };
    (status, Json(outcome)).into_response()
}

/// Forward geocoding endpoint
#[instrument(skip_all, fields(request_id = %request_id))]
pub async fn geocode(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    client: ClientId,
    body: Bytes,
) -> Result<Response, ApiError> {
    let request: GeocodeRequest = decode_body(&state, Operation::Geocode, &body)?;
    debug!(client = ?client.as_deref(), "Geocode request");
    let outcome = state.gateway.geocode_for(client.as_deref(), &request).await?;
    Ok(outcome_response(outcome))
}

/// Reverse geocoding endpoint
#[instrument(skip_all, fields(request_id = %request_id))]
pub async fn reverse_geocode(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    client: ClientId,
    body: Bytes,
) -> Result<Response, ApiError> {
    let request: ReverseGeocodeRequest = decode_body(&state, Operation::ReverseGeocode, &body)?;
    debug!(client = ?client.as_deref(), "Reverse geocode request");
    let outcome = state.gateway.reverse_geocode_for(client.as_deref(), &request).await?;
    Ok(outcome_response(outcome))
}

/// Service description returned by `GET /`
#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    /// Service name
    pub name: &'static str,
    /// Crate version
    pub version: &'static str,
    /// Routes served, in registration order
    pub routes: Vec<RouteInfo>,
}

/// One entry of the route table
#[derive(Debug, Serialize)]
pub struct RouteInfo {
    /// HTTP method
    pub method: &'static str,
    /// Path pattern
    pub path: &'static str,
}

/// Routes registered by `create_router`
pub(crate) const ROUTES: &[(&str, &str)] = &[
    ("GET", "/"),
    ("POST", "/geocode"),
    ("POST", "/reverse-geocode"),
    ("GET", "/stats"),
    ("GET", "/health"),
    ("GET", "/metrics"),
    ("GET", "/tools"),
    ("POST", "/tools/:name"),
];

/// Root endpoint describing the service
pub async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        name: "geocode-gateway",
        version: env!("CARGO_PKG_VERSION"),
        routes: ROUTES
            .iter()
            .map(|&(method, path)| RouteInfo { method, path })
            .collect(),
    })
}

/// Statistics endpoint
pub async fn stats(State(state): State<AppState>) -> Json<GatewayStats> {
    Json(state.gateway.stats().await)
}

/// Health endpoint; 503 when no provider is usable
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthReport>) {
    let report = state.gateway.health();
    let status = match report.status {
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
    };
    (status, Json(report))
}

/// Metrics endpoint (Prometheus format)
pub async fn metrics(State(state): State<AppState>) -> Response {
    if !state.metrics_enabled {
        return StatusCode::NOT_FOUND.into_response();
    }
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.gateway.metrics().gather(),
    )
        .into_response()
}

/// Tool listing endpoint
pub async fn list_tools() -> Json<Vec<ToolDefinition>> {
    Json(tool_definitions())
}

/// Tool invocation endpoint; an empty body means no arguments
#[instrument(skip_all, fields(tool = %name, request_id = %request_id))]
pub async fn call_tool(
    State(state): State<AppState>,
    Path(name): Path<String>,
    RequestId(request_id): RequestId,
    client: ClientId,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let arguments = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Object(serde_json::Map::new())
    } else {
        serde_json::from_slice(&body).map_err(|e| {
            let err = GatewayError::from(ValidationError::InvalidArguments {
                reason: format!("invalid JSON body: {e}"),
            });
            state.gateway.record_rejected_tool(&name, &err);
            err
        })?
    };
    let result = state.gateway.call_tool(&name, arguments, client.as_deref()).await?;
    Ok(Json(result))
}
