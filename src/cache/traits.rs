//! Core traits and types for the caching system.

use chrono::{DateTime, Duration, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Trait for values that can be stored in a cache backend.
pub trait Cacheable: Clone + Send + Sync + Serialize + DeserializeOwned {
  /// Key this value is stored under
  fn cache_key(&self) -> String;

  /// Value type name for storage organization (e.g., "event_set")
  fn entity_type() -> &'static str;
}

/// Requested lifetime of a cache entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Ttl {
  /// Whatever the backend is configured to apply by default
  #[default]
  CacheDefault,
  /// Never expires due to elapsed time
  Unlimited,
  /// Expires this many seconds after insertion
  Seconds(u32),
}

impl Ttl {
  /// Interpret a signed seconds count: `< 0` is the cache default, `0` is
  /// unlimited, anything else is a lifetime in seconds.
  pub fn from_seconds(seconds: i64) -> Self {
    match seconds {
      s if s < 0 => Ttl::CacheDefault,
      0 => Ttl::Unlimited,
      s => Ttl::Seconds(u32::try_from(s).unwrap_or(u32::MAX)),
    }
  }
}

/// Expiry a backend assigned to an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "at", rename_all = "lowercase")]
pub enum Expiration {
  Never,
  At(DateTime<Utc>),
}

impl Expiration {
  /// Expiry for an entry inserted at `now` that lives for `lifetime`.
  pub fn after(now: DateTime<Utc>, lifetime: Option<Duration>) -> Self {
    match lifetime {
      Some(d) => Expiration::At(now + d),
      None => Expiration::Never,
    }
  }

  pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
    match self {
      Expiration::Never => false,
      Expiration::At(at) => now >= *at,
    }
  }

  pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
    match self {
      Expiration::Never => None,
      Expiration::At(at) => Some(*at),
    }
  }
}

/// A single live cache entry.
#[derive(Debug, Clone)]
pub struct CachedEntry<T> {
  /// The cached value
  pub value: T,
  /// When the value was stored
  pub cached_at: DateTime<Utc>,
  /// When the backend will drop it
  pub expiration: Expiration,
}

/// Result from a cache operation, including data and metadata about the source.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
  /// When the data was cached (if from cache)
  pub cached_at: Option<DateTime<Utc>>,
}

impl<T> CacheResult<T> {
  /// Create a new cache result from freshly fetched data.
  pub fn from_source(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Fetched,
      cached_at: None,
    }
  }

  /// Create a new cache result from cached data.
  pub fn from_cache(data: T, cached_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::Cache,
      cached_at: Some(cached_at),
    }
  }
}

/// Indicates where data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fetched from the backing calendar source and stored
  Fetched,
  /// Served from a live cache entry
  Cache,
}
