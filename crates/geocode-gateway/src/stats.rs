//! Process-wide counters read by `stats()` without taking any lock.

use geocode_core::{ErrorKind, ProviderStats};
use geocode_resilience::{CacheStats, RateLimiterStats};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Error counts per [`ErrorKind`]
#[derive(Debug, Default)]
pub struct ErrorCounters {
    counts: [AtomicU64; ErrorKind::ALL.len()],
}

impl ErrorCounters {
    /// Count one error
    pub fn record(&self, kind: ErrorKind) {
        self.counts[kind.index()].fetch_add(1, Ordering::Relaxed);
    }

    /// Count for one kind
    #[must_use]
    pub fn get(&self, kind: ErrorKind) -> u64 {
        self.counts[kind.index()].load(Ordering::Relaxed)
    }

    /// Total across kinds
    #[must_use]
    pub fn total(&self) -> u64 {
        ErrorKind::ALL.iter().map(|kind| self.get(*kind)).sum()
    }

    /// Every kind with its count, zeros included
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        ErrorKind::ALL
            .iter()
            .map(|kind| (kind.as_str().to_string(), self.get(*kind)))
            .collect()
    }
}

/// Snapshot returned by `GeocodingGateway::stats`
#[derive(Debug, Clone, Serialize)]
pub struct GatewayStats {
    /// Seconds since the gateway was built
    pub uptime_seconds: u64,
    /// Requests received, rejected ones included
    pub requests_total: u64,
    /// Requests that ended in an error
    pub errors_total: u64,
    /// Errors per kind
    pub errors_by_kind: BTreeMap<String, u64>,
    /// Result cache counters
    pub cache: CacheStats,
    /// Rate limiter counters
    pub rate_limiter: RateLimiterStats,
    /// Per-provider counters
    pub providers: BTreeMap<String, ProviderStats>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_counters() {
        let counters = ErrorCounters::default();
        counters.record(ErrorKind::RateLimited);
        counters.record(ErrorKind::RateLimited);
        counters.record(ErrorKind::Timeout);

        assert_eq!(counters.get(ErrorKind::RateLimited), 2);
        assert_eq!(counters.total(), 3);

        let snapshot = counters.snapshot();
        assert_eq!(snapshot.len(), ErrorKind::ALL.len());
        assert_eq!(snapshot["rate_limited"], 2);
        assert_eq!(snapshot["validation_error"], 0);
    }
}
