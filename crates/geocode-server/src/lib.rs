//! # Geocode Server
//!
//! HTTP transport for the geocoding gateway:
//! - `POST /geocode` and `POST /reverse-geocode`
//! - `GET /stats`, `GET /health` and `GET /metrics`
//! - `GET /tools` and `POST /tools/{name}` for tool invocation
//!
//! Callers identify themselves for per-client rate limiting with the
//! `x-client-id` header.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod server;
pub mod state;

pub use error::ApiError;
pub use extractors::{ClientId, RequestId, CLIENT_ID_HEADER, REQUEST_ID_HEADER};
pub use server::{create_router, Server, ServerError};
pub use state::AppState;
