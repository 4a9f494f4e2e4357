//! Storing calendar event sets with a per-entry time-to-live.

use color_eyre::Result;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

use super::storage::CacheStorage;
use super::traits::{CachedEntry, Ttl};
use crate::calendar::{CalendarEvent, CalendarEventSet};

/// Puts calendar event sets into a shared cache backend and reports the
/// expiry the backend actually assigned.
///
/// There is no single-flight: two callers storing the same key both write,
/// and the later write wins.
pub struct EventCacheStore<S: CacheStorage> {
  storage: Arc<S>,
}

impl<S: CacheStorage> EventCacheStore<S> {
  pub fn new(storage: Arc<S>) -> Self {
    Self { storage }
  }

  pub fn storage(&self) -> &Arc<S> {
    &self.storage
  }

  /// Wrap `events` in a [`CalendarEventSet`], store it under `key` and copy
  /// the cache's expiry for the new entry into the returned set.
  ///
  /// `ttl_seconds < 0` keeps the cache's default lifetime, `0` never expires
  /// and a positive value expires that many seconds after insertion. Backend
  /// errors are returned as-is.
  pub fn put(
    &self,
    key: &str,
    events: BTreeSet<CalendarEvent>,
    ttl_seconds: i64,
  ) -> Result<CalendarEventSet> {
    let mut event_set = CalendarEventSet::new(key, events);

    if ttl_seconds > 0 {
      debug!(
        key,
        "Storing calendar event set to cache with expiration in {} seconds", ttl_seconds
      );
    } else {
      debug!(key, "Storing calendar event set to cache");
    }

    // The backend may clamp or substitute the TTL; use what it recorded.
    let expiration = self
      .storage
      .put(key, &event_set, Ttl::from_seconds(ttl_seconds))?;
    event_set.set_expiration(expiration);

    Ok(event_set)
  }

  /// Same as [`put`](Self::put) with the cache's default lifetime.
  pub fn put_default(
    &self,
    key: &str,
    events: BTreeSet<CalendarEvent>,
  ) -> Result<CalendarEventSet> {
    self.put(key, events, -1)
  }

  /// Look up a live event set, with its expiry filled in from the cache.
  pub fn get(&self, key: &str) -> Result<Option<CachedEntry<CalendarEventSet>>> {
    Ok(self.storage.get::<CalendarEventSet>(key)?.map(|mut entry| {
      entry.value.set_expiration(entry.expiration);
      entry
    }))
  }
}

impl<S: CacheStorage> Clone for EventCacheStore<S> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
    }
  }
}
