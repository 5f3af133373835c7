//! Result caching with request coalescing.
//!
//! Provides a bounded in-memory cache in front of the fallback chain:
//! - Keys are SHA-256 fingerprints of the normalized request
//! - Capacity is enforced with LRU eviction, freshness with a TTL checked on
//!   every lookup
//! - Concurrent misses for the same fingerprint share one resolution, so at
//!   most one upstream call per fingerprint is in flight
//!
//! The entry map and the in-flight table live under one short-held mutex.
//! The resolution itself runs on its own task, outside the lock; waiters
//! suspend on a shared future, never on the lock.

use futures::future::{BoxFuture, FutureExt, Shared};
use geocode_core::{
    GatewayError, GatewayResult, GeocodeOutcome, GeocodeRequest, GeocodeResult, Operation,
    ReverseGeocodeRequest,
};
use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Whether caching and coalescing are enabled
    pub enabled: bool,
    /// Maximum number of entries in the cache
    pub max_entries: usize,
    /// Time-to-live for cache entries
    pub ttl: Duration,
    /// Decimal places kept when fingerprinting coordinates
    pub coordinate_precision: u32,
}

impl CacheConfig {
    /// Largest supported coordinate precision
    pub const MAX_COORDINATE_PRECISION: u32 = 9;
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 1000,
            ttl: Duration::from_secs(3600),
            coordinate_precision: 4,
        }
    }
}

/// Unit separator between fingerprint fields
const FIELD_SEPARATOR: &[u8] = b"\x1f";

/// Cache key: hex SHA-256 over the operation and the normalized request
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    fn from_fields(operation: Operation, fields: &[&str]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(operation.as_str().as_bytes());
        for field in fields {
            hasher.update(FIELD_SEPARATOR);
            hasher.update(field.as_bytes());
        }
        Self(format!("{:x}", hasher.finalize()))
    }

    /// Fingerprint a forward lookup: trimmed, lowercased, whitespace collapsed
    #[must_use]
    pub fn for_geocode(request: &GeocodeRequest) -> Self {
        let address = normalize_text(request.address());
        let hint = request.region_hint().map(normalize_text).unwrap_or_default();
        Self::from_fields(Operation::Geocode, &[&address, &hint])
    }

    /// Fingerprint a reverse lookup with coordinates rounded to `precision`
    /// decimal places
    #[must_use]
    pub fn for_reverse(request: &ReverseGeocodeRequest, precision: u32) -> Self {
        let precision = precision.min(CacheConfig::MAX_COORDINATE_PRECISION);
        let latitude = scale_coordinate(request.latitude(), precision).to_string();
        let longitude = scale_coordinate(request.longitude(), precision).to_string();
        let radius = request.radius_m().to_string();
        Self::from_fields(Operation::ReverseGeocode, &[&latitude, &longitude, &radius])
    }

    /// The hex fingerprint
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn normalize_text(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Round to `precision` decimals as a scaled integer, so -0.0 and 0.0 agree
fn scale_coordinate(value: f64, precision: u32) -> i64 {
    let scale = 10f64.powi(precision as i32);
    (value * scale).round() as i64
}

/// Cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups that were not answered from the cache, coalesced ones included
    pub misses: u64,
    /// Entries removed for expiry or capacity
    pub evictions: u64,
    /// Misses that joined an in-flight resolution
    pub coalesced: u64,
    /// Current number of entries
    pub size: usize,
}

impl CacheStats {
    /// Calculate hit rate as a percentage
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64 * 100.0
        }
    }
}

/// How a lookup was served, for metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheLookupResult {
    /// Served from a fresh entry
    Hit,
    /// Started a new resolution
    Miss,
    /// Joined a resolution already in flight
    Coalesced,
    /// Cache disabled; resolved directly
    Disabled,
}

impl CacheLookupResult {
    /// Label used for metrics
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hit => "hit",
            Self::Miss => "miss",
            Self::Coalesced => "coalesced",
            Self::Disabled => "disabled",
        }
    }
}

/// A cached result
#[derive(Debug, Clone)]
struct CacheEntry {
    value: GeocodeResult,
    #[allow(dead_code)]
    created_at: Instant,
    expires_at: Instant,
    access_count: u64,
}

type SharedResolution = Shared<BoxFuture<'static, GatewayResult<GeocodeOutcome>>>;

struct CacheState {
    entries: LruCache<CacheKey, CacheEntry>,
    in_flight: HashMap<CacheKey, SharedResolution>,
}

struct CacheInner {
    config: CacheConfig,
    state: Mutex<CacheState>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    coalesced: AtomicU64,
}

impl CacheInner {
    /// Finish a resolution: clear its in-flight slot and store a found
    /// result under the same guard, so a concurrent lookup sees either the
    /// in-flight resolution or the stored entry
    fn complete(&self, key: &CacheKey, outcome: &GatewayResult<GeocodeOutcome>) {
        let mut state = self.state.lock();
        state.in_flight.remove(key);
        if let Ok(GeocodeOutcome::Found(result)) = outcome {
            self.store(&mut state, key.clone(), result.clone());
        }
    }

    /// Store a fresh result, counting a capacity eviction if one occurs
    fn store(&self, state: &mut CacheState, key: CacheKey, value: GeocodeResult) {
        let now = Instant::now();
        let entry = CacheEntry {
            value,
            created_at: now,
            expires_at: now + self.config.ttl,
            access_count: 0,
        };
        if let Some((evicted, _)) = state.entries.push(key.clone(), entry) {
            if evicted != key {
                self.evictions.fetch_add(1, Ordering::Relaxed);
                debug!(fingerprint = %evicted, "Evicted least recently used entry");
            }
        }
    }
}

/// Result cache with coalescing of concurrent identical requests
#[derive(Clone)]
pub struct ResultCache {
    inner: Arc<CacheInner>,
}

impl fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultCache")
            .field("config", &self.inner.config)
            .field("stats", &self.stats())
            .finish()
    }
}

impl ResultCache {
    /// Create a new result cache
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Arc::new(CacheInner {
                config,
                state: Mutex::new(CacheState {
                    entries: LruCache::new(capacity),
                    in_flight: HashMap::new(),
                }),
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
                evictions: AtomicU64::new(0),
                coalesced: AtomicU64::new(0),
            }),
        }
    }

    /// Create with default configuration
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(CacheConfig::default())
    }

    /// Create a disabled cache
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(CacheConfig {
            enabled: false,
            ..Default::default()
        })
    }

    /// Check if caching is enabled
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.inner.config.enabled
    }

    /// Get the configuration
    #[must_use]
    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Fingerprint a forward lookup
    #[must_use]
    pub fn key_for_geocode(&self, request: &GeocodeRequest) -> CacheKey {
        CacheKey::for_geocode(request)
    }

    /// Fingerprint a reverse lookup with the configured precision
    #[must_use]
    pub fn key_for_reverse(&self, request: &ReverseGeocodeRequest) -> CacheKey {
        CacheKey::for_reverse(request, self.inner.config.coordinate_precision)
    }

    /// Return the cached result for `key`, or resolve it.
    ///
    /// On a miss, `resolve` is invoked at most once per fingerprint across
    /// all concurrent callers; every caller waiting on the same fingerprint
    /// receives the same outcome. Only `Found` outcomes are stored.
    ///
    /// # Errors
    /// Returns the resolution's error, shared by every coalesced caller
    pub async fn get_or_resolve<F, Fut>(
        &self,
        key: CacheKey,
        resolve: F,
    ) -> (GatewayResult<GeocodeOutcome>, CacheLookupResult)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = GatewayResult<GeocodeOutcome>> + Send + 'static,
    {
        if !self.inner.config.enabled {
            return (resolve().await, CacheLookupResult::Disabled);
        }

        let (resolution, lookup) = {
            let mut state = self.inner.state.lock();
            let now = Instant::now();

            let expired = match state.entries.get_mut(&key) {
                Some(entry) if entry.expires_at > now => {
                    entry.access_count += 1;
                    self.inner.hits.fetch_add(1, Ordering::Relaxed);
                    debug!(fingerprint = %key, access_count = entry.access_count, "Cache hit");
                    return (Ok(GeocodeOutcome::Found(entry.value.clone())), CacheLookupResult::Hit);
                }
                Some(_) => true,
                None => false,
            };
            if expired {
                state.entries.pop(&key);
                self.inner.evictions.fetch_add(1, Ordering::Relaxed);
                debug!(fingerprint = %key, "Cache entry expired");
            }

            self.inner.misses.fetch_add(1, Ordering::Relaxed);
            if let Some(existing) = state.in_flight.get(&key) {
                self.inner.coalesced.fetch_add(1, Ordering::Relaxed);
                debug!(fingerprint = %key, "Joined in-flight resolution");
                (existing.clone(), CacheLookupResult::Coalesced)
            } else {
                debug!(fingerprint = %key, "Cache miss");
                let resolution = self.spawn_resolution(key.clone(), resolve());
                state.in_flight.insert(key, resolution.clone());
                (resolution, CacheLookupResult::Miss)
            }
        };

        (resolution.await, lookup)
    }

    /// Run `future` on its own task and return a handle every waiter can share.
    ///
    /// When it finishes the task swaps the in-flight slot for the stored
    /// result in one step, whether or not anyone is still waiting.
    fn spawn_resolution<Fut>(&self, key: CacheKey, future: Fut) -> SharedResolution
    where
        Fut: Future<Output = GatewayResult<GeocodeOutcome>> + Send + 'static,
    {
        let weak: Weak<CacheInner> = Arc::downgrade(&self.inner);
        let task_key = key.clone();
        let handle = tokio::spawn(async move {
            let outcome = future.await;
            if let Some(inner) = weak.upgrade() {
                inner.complete(&task_key, &outcome);
            }
            outcome
        });

        let weak: Weak<CacheInner> = Arc::downgrade(&self.inner);
        async move {
            match handle.await {
                Ok(outcome) => outcome,
                Err(err) => {
                    if let Some(inner) = weak.upgrade() {
                        inner.state.lock().in_flight.remove(&key);
                    }
                    Err(GatewayError::internal(format!("resolution task failed: {err}")))
                }
            }
        }
        .boxed()
        .shared()
    }

    /// Remove all entries. Counters are kept.
    pub fn clear(&self) {
        self.inner.state.lock().entries.clear();
        info!("Cache cleared");
    }

    /// Remove expired entries, returning how many were removed
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut state = self.inner.state.lock();
        let expired: Vec<CacheKey> = state
            .entries
            .iter()
            .filter(|(_, entry)| entry.expires_at <= now)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            state.entries.pop(key);
        }
        drop(state);

        let removed = expired.len();
        self.inner
            .evictions
            .fetch_add(removed as u64, Ordering::Relaxed);
        if removed > 0 {
            debug!(removed, "Expired cache entries removed");
        }
        removed
    }

    /// Current number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.state.lock().entries.len()
    }

    /// Check if the cache holds no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of resolutions currently in flight
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.inner.state.lock().in_flight.len()
    }

    /// Get cache statistics
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.inner.hits.load(Ordering::Relaxed),
            misses: self.inner.misses.load(Ordering::Relaxed),
            evictions: self.inner.evictions.load(Ordering::Relaxed),
            coalesced: self.inner.coalesced.load(Ordering::Relaxed),
            size: self.len(),
        }
    }
}
