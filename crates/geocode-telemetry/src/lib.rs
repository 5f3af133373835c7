//! # Geocode Telemetry
//!
//! Observability for the geocoding gateway:
//! - Structured logging through `tracing-subscriber`
//! - Prometheus metrics

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogFormat, LoggingConfig, LoggingError};
pub use metrics::{Metrics, MetricsConfig};
