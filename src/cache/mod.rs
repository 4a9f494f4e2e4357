//! Generic caching layer for calendar event sets.
//!
//! This module provides:
//! - Backends that store serialized values with a per-entry expiry
//! - `EventCacheStore`, which stores event sets and reads back their expiry
//! - `CacheLayer`, a cache-first fetch-through for calendar adapters

mod event_store;
mod layer;
mod storage;
mod traits;

pub use event_store::EventCacheStore;
pub use layer::CacheLayer;
pub use storage::{CacheStorage, ExpiryPolicy, MemoryStorage, SqliteStorage};
pub use traits::{CacheResult, CacheSource, CachedEntry, Cacheable, Expiration, Ttl};
