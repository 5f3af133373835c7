//! # Geocode Providers
//!
//! Backend clients for the geocoding gateway:
//! - Amap (Gaode)
//! - Baidu Maps
//! - Google Maps
//!
//! plus the [`ProviderRegistry`] that holds them in fallback order.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod amap;
pub mod baidu;
pub mod config;
pub mod google;
mod http;
pub mod registry;

pub use amap::AmapProvider;
pub use baidu::BaiduProvider;
pub use config::ProviderConfig;
pub use google::GoogleProvider;
pub use registry::{ProviderEntry, ProviderRegistry};
