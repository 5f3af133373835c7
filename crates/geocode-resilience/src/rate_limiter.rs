//! Inbound admission control using a fixed-window counter.
//!
//! Each scope holds one constant-size window: a start instant and a count.
//! When the window has elapsed the count resets; otherwise a request is
//! admitted while `count < limit` and rejected with the time remaining until
//! the window rolls over.
//!
//! The limiter is keyed either globally (one shared window) or per client.

use geocode_core::GatewayError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Window key used for the global scope
const GLOBAL_KEY: &str = "global";
/// Window key used for requests without a client key in per-client scope
const ANONYMOUS_KEY: &str = "anonymous";

/// How requests are grouped into windows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitScope {
    /// One window shared by every caller
    #[default]
    Global,
    /// One window per client key
    PerClient,
}

impl RateLimitScope {
    /// Get the scope as a string
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::PerClient => "per_client",
        }
    }
}

impl fmt::Display for RateLimitScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Whether rate limiting is enabled
    pub enabled: bool,
    /// Requests admitted per window
    pub max_requests: u32,
    /// Window duration
    pub window: Duration,
    /// Window grouping
    pub scope: RateLimitScope,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: 100,
            window: Duration::from_secs(60),
            scope: RateLimitScope::Global,
        }
    }
}

/// Counter state for one scope
#[derive(Debug, Clone)]
pub struct RateWindowState {
    window_start: Instant,
    count: u32,
    limit: u32,
    window_duration: Duration,
}

impl RateWindowState {
    fn new(limit: u32, window_duration: Duration, now: Instant) -> Self {
        Self {
            window_start: now,
            count: 0,
            limit,
            window_duration,
        }
    }

    /// Admit one request at `now`, or return the time until the window resets
    fn try_admit(&mut self, now: Instant) -> Result<(), Duration> {
        if now.duration_since(self.window_start) >= self.window_duration {
            self.window_start = now;
            self.count = 0;
        }

        if self.count < self.limit {
            self.count += 1;
            return Ok(());
        }

        let resets_at = self.window_start + self.window_duration;
        let remaining = resets_at.saturating_duration_since(now);
        // A rejection always reports a wait, even at the window edge
        Err(remaining.max(Duration::from_millis(1)))
    }

    /// Requests admitted in the current window
    #[must_use]
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Admission limit per window
    #[must_use]
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Start of the current window
    #[must_use]
    pub fn window_start(&self) -> Instant {
        self.window_start
    }

    /// Window length
    #[must_use]
    pub fn window_duration(&self) -> Duration {
        self.window_duration
    }
}

/// Limiter counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RateLimiterStats {
    /// Requests admitted since startup
    pub admitted: u64,
    /// Requests rejected since startup
    pub rejected: u64,
    /// Windows currently tracked
    pub windows: usize,
}

/// Fixed-window rate limiter
pub struct RateLimiter {
    config: RateLimiterConfig,
    windows: Mutex<HashMap<String, RateWindowState>>,
    admitted: AtomicU64,
    rejected: AtomicU64,
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RateLimiter {
    /// Create a new rate limiter
    #[must_use]
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            config,
            windows: Mutex::new(HashMap::new()),
            admitted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    /// Create with default configuration
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(RateLimiterConfig::default())
    }

    /// Create a disabled rate limiter (always admits)
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(RateLimiterConfig {
            enabled: false,
            ..Default::default()
        })
    }

    /// Check if rate limiting is enabled
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Get the configuration
    #[must_use]
    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }

    fn window_key<'a>(&self, client: Option<&'a str>) -> &'a str {
        match self.config.scope {
            RateLimitScope::Global => GLOBAL_KEY,
            RateLimitScope::PerClient => client.filter(|c| !c.is_empty()).unwrap_or(ANONYMOUS_KEY),
        }
    }

    /// Admit or reject one request.
    ///
    /// `client` selects the window in per-client scope and is ignored in
    /// global scope.
    ///
    /// # Errors
    /// Returns `GatewayError::RateLimited` with the time until the window
    /// resets if the limit has been reached
    pub async fn check(&self, client: Option<&str>) -> Result<(), GatewayError> {
        if !self.config.enabled {
            return Ok(());
        }

        let key = self.window_key(client);
        let now = Instant::now();
        let decision = {
            let mut windows = self.windows.lock().await;
            let window = windows
                .entry(key.to_string())
                .or_insert_with(|| RateWindowState::new(self.config.max_requests, self.config.window, now));
            window.try_admit(now).map(|()| window.count)
        };

        match decision {
            Ok(count) => {
                self.admitted.fetch_add(1, Ordering::Relaxed);
                debug!(
                    key = %key,
                    count,
                    limit = self.config.max_requests,
                    "Rate limit check passed"
                );
                Ok(())
            }
            Err(retry_after) => {
                self.rejected.fetch_add(1, Ordering::Relaxed);
                warn!(
                    key = %key,
                    limit = self.config.max_requests,
                    retry_after_ms = retry_after.as_millis() as u64,
                    "Rate limit exceeded"
                );
                Err(GatewayError::rate_limited(retry_after, self.config.max_requests))
            }
        }
    }

    /// Window state for a key, if tracked
    pub async fn window(&self, key: &str) -> Option<RateWindowState> {
        self.windows.lock().await.get(key).cloned()
    }

    /// Drop windows that ended more than `max_idle` ago, returning how many
    /// were removed. A window that is still running is always kept.
    pub async fn cleanup(&self, max_idle: Duration) -> usize {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;
        let before = windows.len();
        windows.retain(|key, window| {
            let ends_at = window.window_start + window.window_duration;
            let idle = now.saturating_duration_since(ends_at);
            if now > ends_at && idle > max_idle {
                debug!(key = %key, "Cleaned up idle rate limit window");
                false
            } else {
                true
            }
        });
        before - windows.len()
    }

    /// Get limiter counters
    pub async fn stats(&self) -> RateLimiterStats {
        RateLimiterStats {
            admitted: self.admitted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            windows: self.windows.lock().await.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_requests: u32, window: Duration, scope: RateLimitScope) -> RateLimiter {
        RateLimiter::new(RateLimiterConfig {
            enabled: true,
            max_requests,
            window,
            scope,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_sixth_request_rejected() {
        let limiter = limiter(5, Duration::from_secs(60), RateLimitScope::Global);

        for _ in 0..5 {
            assert!(limiter.check(None).await.is_ok());
        }

        match limiter.check(None).await {
            Err(GatewayError::RateLimited { retry_after, limit }) => {
                assert!(retry_after > Duration::ZERO);
                assert!(retry_after <= Duration::from_secs(60));
                assert_eq!(limit, 5);
            }
            other => panic!("Expected rate limit error, got {other:?}"),
        }

        let stats = limiter.stats().await;
        assert_eq!(stats.admitted, 5);
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.windows, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_counts_down() {
        let limiter = limiter(1, Duration::from_secs(60), RateLimitScope::Global);
        limiter.check(None).await.unwrap();

        tokio::time::advance(Duration::from_secs(45)).await;
        let err = limiter.check(None).await.unwrap_err();
        assert_eq!(err.retry_after(), Some(Duration::from_secs(15)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_rollover() {
        let limiter = limiter(2, Duration::from_secs(10), RateLimitScope::Global);
        limiter.check(None).await.unwrap();
        limiter.check(None).await.unwrap();
        assert!(limiter.check(None).await.is_err());

        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(limiter.check(None).await.is_ok());
        assert!(limiter.check(None).await.is_ok());
        assert!(limiter.check(None).await.is_err());

        let window = limiter.window("global").await.unwrap();
        assert_eq!(window.count(), 2);
        assert_eq!(window.limit(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_global_scope_ignores_client() {
        let limiter = limiter(1, Duration::from_secs(60), RateLimitScope::Global);
        limiter.check(Some("alice")).await.unwrap();
        assert!(limiter.check(Some("bob")).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_client_isolation() {
        let limiter = limiter(1, Duration::from_secs(60), RateLimitScope::PerClient);
        limiter.check(Some("alice")).await.unwrap();
        limiter.check(Some("bob")).await.unwrap();
        limiter.check(None).await.unwrap();

        assert!(limiter.check(Some("alice")).await.is_err());
        assert!(limiter.check(Some("")).await.is_err());
        assert_eq!(limiter.stats().await.windows, 3);
        assert!(limiter.window("anonymous").await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_idle_windows() {
        let limiter = limiter(10, Duration::from_secs(60), RateLimitScope::PerClient);
        limiter.check(Some("old")).await.unwrap();
        tokio::time::advance(Duration::from_secs(150)).await;
        limiter.check(Some("new")).await.unwrap();

        assert_eq!(limiter.cleanup(Duration::from_secs(60)).await, 1);
        assert!(limiter.window("old").await.is_none());
        assert!(limiter.window("new").await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_keeps_running_window() {
        let limiter = limiter(1, Duration::from_secs(3600), RateLimitScope::Global);
        limiter.check(None).await.unwrap();
        assert!(limiter.check(None).await.is_err());

        tokio::time::advance(Duration::from_secs(601)).await;
        assert_eq!(limiter.cleanup(Duration::from_secs(600)).await, 0);
        assert!(limiter.check(None).await.is_err());

        tokio::time::advance(Duration::from_secs(3000)).await;
        limiter.check(None).await.unwrap();
    }

    #[tokio::test]
    async fn test_disabled_admits_everything() {
        let limiter = RateLimiter::disabled();
        for _ in 0..1000 {
            assert!(limiter.check(Some("x")).await.is_ok());
        }
        assert_eq!(limiter.stats().await, RateLimiterStats::default());
    }

    #[test]
    fn test_scope_serde() {
        let scope: RateLimitScope = serde_json::from_str("\"per_client\"").unwrap();
        assert_eq!(scope, RateLimitScope::PerClient);
        assert_eq!(RateLimitScope::default().as_str(), "global");
    }
}
