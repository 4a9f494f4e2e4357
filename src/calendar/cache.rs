//! Caching implementations for calendar types.

use chrono::SecondsFormat;
use sha2::{Digest, Sha256};

use crate::cache::Cacheable;

use super::interval::DateInterval;
use super::types::CalendarEventSet;

impl Cacheable for CalendarEventSet {
  fn cache_key(&self) -> String {
    self.key().to_string()
  }

  fn entity_type() -> &'static str {
    "calendar_event_set"
  }
}

/// Identifies the events of one calendar source over one interval.
#[derive(Clone, Debug)]
pub struct EventSetKey<'a> {
  /// Configuration id of the calendar
  pub calendar_id: u64,
  /// Source location (file path, URL, ...) as configured
  pub source: &'a str,
  pub interval: &'a DateInterval,
}

impl EventSetKey<'_> {
  /// Stable, fixed-length cache key.
  pub fn cache_hash(&self) -> String {
    let input = format!(
      "events:{}:{}:{}:{}",
      self.calendar_id,
      self.source.trim(),
      self.interval.start.to_rfc3339_opts(SecondsFormat::Secs, true),
      self.interval.end.to_rfc3339_opts(SecondsFormat::Secs, true),
    );

    // SHA256 hash for stable, fixed-length keys
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let result = hasher.finalize();
    hex::encode(result)
  }

  pub fn description(&self) -> String {
    format!(
      "calendar {} ({}) from {} to {}",
      self.calendar_id, self.source, self.interval.start, self.interval.end
    )
  }
}
