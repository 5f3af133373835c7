//! # Geocode Gateway
//!
//! The geocoding gateway service. A lookup passes the inbound rate limiter,
//! is fingerprinted for the result cache, and on a miss is resolved by the
//! fallback executor across the provider registry.
//!
//! ```no_run
//! # async fn run(config: geocode_config::GatewayConfig) -> geocode_core::GatewayResult<()> {
//! use geocode_core::GeocodeRequest;
//! use geocode_gateway::GeocodingGateway;
//!
//! let gateway = GeocodingGateway::from_config(&config)?;
//! let request = GeocodeRequest::new("北京市朝阳区阜通东大街6号", None)?;
//! let outcome = gateway.geocode(&request).await?;
//! println!("{:?}", outcome.result());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod factory;
pub mod service;
pub mod stats;
pub mod tools;

pub use service::{GatewayBuilder, GeocodingGateway, HealthReport};
pub use stats::{ErrorCounters, GatewayStats};
pub use tools::{tool_definitions, tool_operation, ToolDefinition, GEOCODE_TOOL, HEALTH_CHECK_TOOL, REVERSE_GEOCODE_TOOL};
