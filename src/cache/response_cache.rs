//! TTL-aware cache of decoded API responses

use std::{fmt, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use compact_str::CompactString;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::{debug, warn};

use super::{
    error::CacheError,
    store::{KeyValueStore, MemoryStore},
};

pub const DEFAULT_CACHE_PREFIX: &str = "api_cache_";

/// Source of "now" in epoch milliseconds
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

/// Stored form of a cached value
#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry<T> {
    data: T,
    /// Write time, epoch milliseconds
    timestamp: i64,
    /// Time to live, milliseconds
    ttl: u64,
}

/// A cache hit together with its freshness
#[derive(Debug, Clone, PartialEq)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
    pub is_expired: bool,
}

/// Read-through cache scoped to a key prefix
///
/// Every key is stored as `prefix + key`, so several caches can share one
/// backing store without seeing each other's entries.
#[derive(Clone)]
pub struct ResponseCache {
    store: Arc<dyn KeyValueStore>,
    prefix: CompactString,
    clock: Clock,
}

impl fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseCache")
            .field("store", &self.store.name())
            .field("prefix", &self.prefix)
            .finish()
    }
}

impl ResponseCache {
    pub fn new(store: Arc<dyn KeyValueStore>, prefix: impl Into<CompactString>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            clock: Arc::new(|| Utc::now().timestamp_millis()),
        }
    }

    /// Cache over a fresh [`MemoryStore`] with the default prefix
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), DEFAULT_CACHE_PREFIX)
    }

    /// Replace the wall clock, used to test expiry
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    fn now(&self) -> i64 {
        (self.clock)()
    }

    /// Return the cached value if it is still fresh.
    ///
    /// Expired entries are deleted. Any storage or decoding failure reads as a miss.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let cached = self.lookup::<T>(key)?;
        if cached.is_expired {
            debug!(key, "Evicting expired cache entry");
            self.clear(key);
            return None;
        }
        Some(cached.data)
    }

    /// Return the cached value with its freshness, without evicting anything.
    pub fn lookup<T: DeserializeOwned>(&self, key: &str) -> Option<CachedData<T>> {
        let bytes = match self.store.get(&self.namespaced(key)) {
            Ok(bytes) => bytes?,
            Err(e) => {
                warn!(key, error = %e, "Cache read error");
                return None;
            },
        };

        let entry: CacheEntry<T> = match serde_json::from_slice(&bytes) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key, error = %e, "Cache entry could not be decoded");
                return None;
            },
        };

        let age = self.now().saturating_sub(entry.timestamp);
        let is_expired = age > i64::try_from(entry.ttl).unwrap_or(i64::MAX);

        Some(CachedData {
            data: entry.data,
            cached_at: DateTime::from_timestamp_millis(entry.timestamp).unwrap_or_default(),
            is_expired,
        })
    }

    /// Store `data` under `key`. Failures are logged, never returned.
    pub fn set<T: Serialize>(&self, key: &str, data: &T, ttl: Duration) {
        if let Err(e) = self.try_set(key, data, ttl) {
            warn!(key, error = %e, "Cache write error");
        }
    }

    fn try_set<T: Serialize>(&self, key: &str, data: &T, ttl: Duration) -> Result<(), CacheError> {
        let entry = CacheEntry {
            data,
            timestamp: self.now(),
            ttl: u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX),
        };
        let bytes = serde_json::to_vec(&entry)?;
        self.store.set(&self.namespaced(key), &bytes)
    }

    /// Remove a single entry
    pub fn clear(&self, key: &str) {
        if let Err(e) = self.store.delete(&self.namespaced(key)) {
            warn!(key, error = %e, "Cache delete error");
        }
    }

    /// Remove every entry under this cache's prefix, returning how many were removed.
    pub fn clear_all(&self) -> usize {
        let keys = match self.store.keys() {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "Cache key listing failed");
                return 0;
            },
        };

        let mut removed = 0;
        for key in keys.iter().filter(|key| key.starts_with(self.prefix.as_str())) {
            match self.store.delete(key) {
                Ok(()) => removed += 1,
                Err(e) => warn!(key = %key, error = %e, "Cache delete error"),
            }
        }
        debug!(removed, prefix = %self.prefix, "Cleared cache namespace");
        removed
    }
}
