//! Tool-invocation interface.
//!
//! Exposes the gateway operations as named tools with JSON-Schema argument
//! descriptions. Arguments decode into the same validated request types the
//! HTTP path uses, and results serialize the same way.

use crate::service::GeocodingGateway;
use geocode_core::{
    GatewayError, GatewayResult, GeocodeRequest, Operation, ReverseGeocodeRequest,
    ValidationError,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

/// Forward geocoding tool
pub const GEOCODE_TOOL: &str = "geocode";
/// Reverse geocoding tool
pub const REVERSE_GEOCODE_TOOL: &str = "reverse_geocode";
/// Health tool
pub const HEALTH_CHECK_TOOL: &str = "health_check";

/// Metrics label for rejected calls that name no lookup operation
const TOOL_LABEL: &str = "tool";

/// The lookup a tool performs, if any
#[must_use]
pub fn tool_operation(name: &str) -> Option<Operation> {
    match name {
        GEOCODE_TOOL => Some(Operation::Geocode),
        REVERSE_GEOCODE_TOOL => Some(Operation::ReverseGeocode),
        _ => None,
    }
}

/// A tool exposed to callers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    /// Tool name
    pub name: &'static str,
    /// What the tool does
    pub description: &'static str,
    /// JSON Schema for the arguments
    pub input_schema: Value,
}

/// Every tool the gateway exposes
#[must_use]
pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: GEOCODE_TOOL,
            description: "Convert an address into coordinates",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "address": {
                        "type": "string",
                        "minLength": 1,
                        "maxLength": GeocodeRequest::MAX_ADDRESS_CHARS,
                        "description": "Address or place name"
                    },
                    "region_hint": {
                        "type": "string",
                        "maxLength": GeocodeRequest::MAX_REGION_HINT_CHARS,
                        "description": "City or region to narrow the search"
                    }
                },
                "required": ["address"]
            }),
        },
        ToolDefinition {
            name: REVERSE_GEOCODE_TOOL,
            description: "Convert coordinates into an address",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "latitude": { "type": "number", "minimum": -90, "maximum": 90 },
                    "longitude": { "type": "number", "minimum": -180, "maximum": 180 },
                    "radius_m": {
                        "type": "integer",
                        "minimum": ReverseGeocodeRequest::MIN_RADIUS_M,
                        "maximum": ReverseGeocodeRequest::MAX_RADIUS_M,
                        "default": ReverseGeocodeRequest::DEFAULT_RADIUS_M
                    }
                },
                "required": ["latitude", "longitude"]
            }),
        },
        ToolDefinition {
            name: HEALTH_CHECK_TOOL,
            description: "Report gateway and provider health",
            input_schema: json!({ "type": "object", "properties": {} }),
        },
    ]
}

fn decode_arguments<T: DeserializeOwned>(arguments: Value) -> Result<T, ValidationError> {
    serde_json::from_value(arguments).map_err(|e| ValidationError::InvalidArguments {
        reason: e.to_string(),
    })
}

fn encode<T: Serialize>(value: &T) -> GatewayResult<Value> {
    serde_json::to_value(value).map_err(|e| GatewayError::internal(format!("failed to encode result: {e}")))
}

impl GeocodingGateway {
    /// Invoke a tool by name.
    ///
    /// # Errors
    /// - `Validation` for an unknown tool or arguments that do not decode
    ///   into a valid request
    /// - any error the underlying operation returns
    pub async fn call_tool(&self, name: &str, arguments: Value, client: Option<&str>) -> GatewayResult<Value> {
        match name {
            GEOCODE_TOOL => {
                let request: GeocodeRequest = self.parse_request(Operation::Geocode, arguments)?;
                encode(&self.geocode_for(client, &request).await?)
            }
            REVERSE_GEOCODE_TOOL => {
                let request: ReverseGeocodeRequest = self.parse_request(Operation::ReverseGeocode, arguments)?;
                encode(&self.reverse_geocode_for(client, &request).await?)
            }
            HEALTH_CHECK_TOOL => encode(&self.health()),
            other => {
                let err = GatewayError::from(ValidationError::InvalidArguments {
                    reason: format!("unknown tool '{other}'"),
                });
                self.record_rejected_tool(other, &err);
                Err(err)
            }
        }
    }

    /// Count a tool call rejected before it reached the gateway pipeline,
    /// such as one with an unknown name or an undecodable body
    pub fn record_rejected_tool(&self, name: &str, err: &GatewayError) {
        match tool_operation(name) {
            Some(operation) => self.record_rejected(operation, err),
            None => self.count_rejection(TOOL_LABEL, err),
        }
    }

    /// Decode JSON arguments into a validated request. A failure is counted
    /// as a rejected request for `operation`.
    ///
    /// # Errors
    /// Returns `Validation` with code `invalid_arguments` if the value does
    /// not decode or fails validation
    pub fn parse_request<T: DeserializeOwned>(&self, operation: Operation, arguments: Value) -> GatewayResult<T> {
        decode_arguments(arguments).map_err(|err| {
            let err = GatewayError::from(err);
            self.record_rejected(operation, &err);
            err
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_names() {
        let names: Vec<_> = tool_definitions().iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["geocode", "reverse_geocode", "health_check"]);
    }

    #[test]
    fn test_schema_bounds() {
        let tools = tool_definitions();
        let geocode = &tools[0].input_schema;
        assert_eq!(geocode["properties"]["address"]["maxLength"], 500);
        assert_eq!(geocode["properties"]["region_hint"]["maxLength"], 100);

        let reverse = &tools[1].input_schema;
        assert_eq!(reverse["properties"]["radius_m"]["maximum"], 50000);
        assert_eq!(reverse["required"], json!(["latitude", "longitude"]));
    }

    #[test]
    fn test_tool_operation() {
        assert_eq!(tool_operation("geocode"), Some(Operation::Geocode));
        assert_eq!(tool_operation("reverse_geocode"), Some(Operation::ReverseGeocode));
        assert_eq!(tool_operation("health_check"), None);
        assert_eq!(tool_operation("teleport"), None);
    }

    #[test]
    fn test_decode_validates() {
        let ok: GeocodeRequest = decode_arguments(json!({"address": "  Beijing "})).unwrap();
        assert_eq!(ok.address(), "Beijing");

        let err = decode_arguments::<GeocodeRequest>(json!({"address": "   "})).unwrap_err();
        assert_eq!(err.code(), "invalid_arguments");

        let err = decode_arguments::<ReverseGeocodeRequest>(json!({"latitude": 91.0, "longitude": 0.0})).unwrap_err();
        assert!(err.to_string().contains("atitude"));
    }
}
