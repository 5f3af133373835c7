//! # Geocode Resilience
//!
//! Resilience patterns for the geocoding gateway:
//! - Retry policy with capped exponential backoff
//! - Fallback execution across the provider chain
//! - Timeouts per attempt and per chain
//! - Fixed-window rate limiting, global or per client
//! - Result caching with coalescing of identical in-flight requests

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cache;
pub mod fallback;
pub mod rate_limiter;
pub mod retry;
pub mod timeout;

// Re-export main types
pub use cache::{CacheConfig, CacheKey, CacheLookupResult, CacheStats, ResultCache};
pub use fallback::{AttemptObserver, AttemptResult, FallbackExecutor};
pub use rate_limiter::{RateLimitScope, RateLimiter, RateLimiterConfig, RateLimiterStats, RateWindowState};
pub use retry::RetryPolicy;
pub use timeout::{attempt_with_timeout, chain_with_timeout};
