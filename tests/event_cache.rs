use calagg::cache::{
  CacheLayer, CacheSource, CacheStorage, EventCacheStore, Expiration, ExpiryPolicy, MemoryStorage,
  SqliteStorage,
};
use calagg::calendar::CalendarEvent;
use calagg::clock::{Clock, MockClock};
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn start() -> DateTime<Utc> {
  Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap()
}

fn event(uid: &str, hour: u32) -> CalendarEvent {
  CalendarEvent {
    start: Utc.with_ymd_and_hms(2024, 6, 3, hour, 0, 0).unwrap(),
    end: Some(Utc.with_ymd_and_hms(2024, 6, 3, hour + 1, 0, 0).unwrap()),
    uid: uid.to_string(),
    summary: format!("Meeting {}", uid),
    description: None,
    location: None,
    all_day: false,
  }
}

fn events() -> BTreeSet<CalendarEvent> {
  [event("a", 9), event("b", 13)].into_iter().collect()
}

fn memory(policy: ExpiryPolicy, clock: &MockClock) -> MemoryStorage {
  MemoryStorage::new()
    .with_policy(policy)
    .with_clock(Arc::new(clock.clone()))
}

fn sqlite(policy: ExpiryPolicy, clock: &MockClock) -> SqliteStorage {
  SqliteStorage::open_in_memory()
    .unwrap()
    .with_policy(policy)
    .with_clock(Arc::new(clock.clone()))
}

fn default_300() -> ExpiryPolicy {
  ExpiryPolicy {
    default_ttl: Some(Duration::seconds(300)),
    max_ttl: None,
  }
}

/// Runs the three TTL conventions against a backend and checks that the
/// returned set carries what the backend recorded.
fn check_ttl_conventions<S: CacheStorage>(storage: S, clock: &MockClock) {
  let store = EventCacheStore::new(Arc::new(storage));

  let timed = store.put("timed", events(), 60).unwrap();
  assert_eq!(
    timed.expiration(),
    Some(Expiration::At(clock.now() + Duration::seconds(60)))
  );
  assert_eq!(timed.events(), &events());
  assert_eq!(timed.key(), "timed");

  let forever = store.put("forever", events(), 0).unwrap();
  assert_eq!(forever.expiration(), Some(Expiration::Never));

  let defaulted = store.put("defaulted", events(), -1).unwrap();
  assert_eq!(
    defaulted.expiration(),
    Some(Expiration::At(clock.now() + Duration::seconds(300)))
  );

  for key in ["timed", "forever", "defaulted"] {
    assert_eq!(
      store.storage().expiration_time(key).unwrap(),
      store.get(key).unwrap().unwrap().value.expiration()
    );
  }

  clock.advance(Duration::seconds(61));
  assert!(store.get("timed").unwrap().is_none());
  assert!(store.get("forever").unwrap().is_some());
  assert!(store.get("defaulted").unwrap().is_some());

  clock.advance(Duration::seconds(240));
  assert!(store.get("defaulted").unwrap().is_none());
  assert!(store.get("forever").unwrap().is_some());
}

#[test]
fn memory_backend_honours_ttl_conventions() {
  let clock = MockClock::at(start());
  check_ttl_conventions(memory(default_300(), &clock), &clock);
}

#[test]
fn sqlite_backend_honours_ttl_conventions() {
  let clock = MockClock::at(start());
  check_ttl_conventions(sqlite(default_300(), &clock), &clock);
}

#[test]
fn expiration_reflects_the_backend_maximum() {
  let clock = MockClock::at(start());
  let policy = ExpiryPolicy {
    default_ttl: None,
    max_ttl: Some(Duration::seconds(120)),
  };
  let store = EventCacheStore::new(Arc::new(memory(policy, &clock)));

  let capped = Some(Expiration::At(clock.now() + Duration::seconds(120)));
  assert_eq!(store.put("long", events(), 3600).unwrap().expiration(), capped);
  assert_eq!(store.put("unlimited", events(), 0).unwrap().expiration(), capped);
  assert_eq!(store.put("default", events(), -1).unwrap().expiration(), capped);
  assert_eq!(
    store.put("short", events(), 30).unwrap().expiration(),
    Some(Expiration::At(clock.now() + Duration::seconds(30)))
  );
}

#[test]
fn reusing_a_key_replaces_events_and_expiry() {
  let clock = MockClock::at(start());
  let store = EventCacheStore::new(Arc::new(sqlite(ExpiryPolicy::default(), &clock)));

  store.put("cal", events(), 0).unwrap();
  let replaced = store
    .put("cal", [event("c", 15)].into_iter().collect(), 10)
    .unwrap();

  let cached = store.get("cal").unwrap().unwrap().value;
  assert_eq!(cached.events(), replaced.events());
  assert_eq!(cached.expiration(), replaced.expiration());
  assert_eq!(cached.events().len(), 1);
}

#[test]
fn empty_event_set_is_cached() {
  let clock = MockClock::at(start());
  let store = EventCacheStore::new(Arc::new(memory(ExpiryPolicy::default(), &clock)));

  let set = store.put("empty", BTreeSet::new(), 5).unwrap();

  assert!(set.events().is_empty());
  assert!(store.get("empty").unwrap().unwrap().value.events().is_empty());
}

#[tokio::test]
async fn layer_refetches_once_the_entry_expires() {
  let clock = MockClock::at(start());
  let layer = CacheLayer::new(memory(ExpiryPolicy::default(), &clock));
  let calls = AtomicUsize::new(0);

  let fetch = || {
    let counter = &calls;
    async move {
      counter.fetch_add(1, Ordering::SeqCst);
      Ok::<BTreeSet<CalendarEvent>, color_eyre::Report>(events())
    }
  };

  let first = layer.fetch_event_set("cal", 30, fetch).await.unwrap();
  assert_eq!(first.source, CacheSource::Fetched);

  clock.advance(Duration::seconds(29));
  let second = layer.fetch_event_set("cal", 30, fetch).await.unwrap();
  assert_eq!(second.source, CacheSource::Cache);
  assert_eq!(second.data.expiration(), first.data.expiration());

  clock.advance(Duration::seconds(1));
  let third = layer.fetch_event_set("cal", 30, fetch).await.unwrap();
  assert_eq!(third.source, CacheSource::Fetched);
  assert_eq!(
    third.data.expiration(),
    Some(Expiration::At(clock.now() + Duration::seconds(30)))
  );

  assert_eq!(calls.load(Ordering::SeqCst), 2);
}
