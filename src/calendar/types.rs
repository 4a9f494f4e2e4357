use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::cache::Expiration;

/// Raw event as delivered by a calendar source.
///
/// Field order matters: the derived ordering sorts by start first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CalendarEvent {
  pub start: DateTime<Utc>,
  /// Missing end means the event is instantaneous (or a single all-day date)
  #[serde(default)]
  pub end: Option<DateTime<Utc>>,
  pub uid: String,
  pub summary: String,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub location: Option<String>,
  /// All-day events carry UTC midnight of their first date in `start`
  #[serde(default)]
  pub all_day: bool,
}

/// A cached set of events for one calendar source and interval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarEventSet {
  key: String,
  events: BTreeSet<CalendarEvent>,
  /// Filled in from the cache after insertion; never serialized into it
  #[serde(skip)]
  expiration: Option<Expiration>,
}

impl CalendarEventSet {
  pub fn new(key: impl Into<String>, events: BTreeSet<CalendarEvent>) -> Self {
    Self {
      key: key.into(),
      events,
      expiration: None,
    }
  }

  pub fn key(&self) -> &str {
    &self.key
  }

  pub fn events(&self) -> &BTreeSet<CalendarEvent> {
    &self.events
  }

  /// Expiry reported by the cache, `None` until the set has been stored.
  pub fn expiration(&self) -> Option<Expiration> {
    self.expiration
  }

  /// Record the cache's expiry. Only the first call has any effect.
  pub(crate) fn set_expiration(&mut self, expiration: Expiration) {
    if self.expiration.is_none() {
      self.expiration = Some(expiration);
    }
  }
}
