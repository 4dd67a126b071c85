//! Namespaced read-through cache for API responses
//!
//! [`ResponseCache`] stores JSON `{data, timestamp, ttl}` entries on top of any
//! [`KeyValueStore`]. Reads never fail: a missing, unreadable or expired entry
//! is a miss, and write failures are logged and dropped.

mod error;
mod response_cache;
mod store;

pub use error::CacheError;
pub use response_cache::{CachedData, Clock, DEFAULT_CACHE_PREFIX, ResponseCache};
pub use store::{DirStore, KeyValueStore, MemoryStore};
