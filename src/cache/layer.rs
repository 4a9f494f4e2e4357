//! Cache layer that orchestrates caching logic with calendar source fetching.

use color_eyre::Result;
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use tracing::trace;

use super::event_store::EventCacheStore;
use super::storage::CacheStorage;
use super::traits::CacheResult;
use crate::calendar::{CalendarEvent, CalendarEventSet};

/// Cache layer that sits between calendar adapters and their sources.
///
/// Concurrent misses for the same key each run the fetcher and each store
/// the result.
pub struct CacheLayer<S: CacheStorage> {
  store: EventCacheStore<S>,
}

impl<S: CacheStorage> CacheLayer<S> {
  /// Create a new cache layer with the given storage backend.
  pub fn new(storage: S) -> Self {
    Self::shared(Arc::new(storage))
  }

  /// Create a cache layer over a backend that is also used elsewhere.
  pub fn shared(storage: Arc<S>) -> Self {
    Self {
      store: EventCacheStore::new(storage),
    }
  }

  pub fn store(&self) -> &EventCacheStore<S> {
    &self.store
  }

  /// Fetch an event set with a cache-first strategy.
  ///
  /// 1. Live cache entry - return it
  /// 2. Missing or expired - run the fetcher and store the result for
  ///    `ttl_seconds` (same convention as [`EventCacheStore::put`])
  pub async fn fetch_event_set<F, Fut>(
    &self,
    key: &str,
    ttl_seconds: i64,
    fetcher: F,
  ) -> Result<CacheResult<CalendarEventSet>>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<BTreeSet<CalendarEvent>>>,
  {
    if let Some(cached) = self.store.get(key)? {
      trace!(key, "Serving calendar event set from cache");
      return Ok(CacheResult::from_cache(cached.value, cached.cached_at));
    }

    let events = fetcher().await?;
    let event_set = self.store.put(key, events, ttl_seconds)?;
    Ok(CacheResult::from_source(event_set))
  }

  /// Drop a cached event set so the next fetch goes to the source.
  pub fn invalidate(&self, key: &str) -> Result<bool> {
    self.store.storage().remove(key)
  }
}

impl<S: CacheStorage> Clone for CacheLayer<S> {
  fn clone(&self) -> Self {
    Self {
      store: self.store.clone(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{CacheSource, MemoryStorage};
  use crate::clock::MockClock;
  use chrono::{Duration, TimeZone, Utc};
  use std::sync::atomic::{AtomicUsize, Ordering};

  #[tokio::test]
  async fn second_fetch_is_served_from_cache_until_expiry() {
    let clock = MockClock::at(Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap());
    let layer = CacheLayer::new(MemoryStorage::new().with_clock(Arc::new(clock.clone())));
    let calls = AtomicUsize::new(0);
    let counter = &calls;

    let fetch = move || async move {
      counter.fetch_add(1, Ordering::SeqCst);
      Ok::<BTreeSet<CalendarEvent>, color_eyre::Report>(BTreeSet::new())
    };

    let first = layer.fetch_event_set("k", 60, fetch).await.unwrap();
    let second = layer.fetch_event_set("k", 60, fetch).await.unwrap();
    assert_eq!(first.source, CacheSource::Fetched);
    assert_eq!(second.source, CacheSource::Cache);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    clock.advance(Duration::seconds(60));
    let third = layer.fetch_event_set("k", 60, fetch).await.unwrap();
    assert_eq!(third.source, CacheSource::Fetched);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn fetch_errors_are_not_cached() {
    let layer = CacheLayer::new(MemoryStorage::new());

    let failed = layer
      .fetch_event_set("k", 0, || async {
        Err::<BTreeSet<CalendarEvent>, _>(color_eyre::eyre::eyre!("source down"))
      })
      .await;
    assert!(failed.is_err());

    let recovered = layer
      .fetch_event_set("k", 0, || async {
        Ok::<BTreeSet<CalendarEvent>, color_eyre::Report>(BTreeSet::new())
      })
      .await
      .unwrap();
    assert_eq!(recovered.source, CacheSource::Fetched);
  }
}
