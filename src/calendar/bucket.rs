//! Grouping display events into per-day buckets with friendly day names.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use super::day_map::{DayKey, DayMap};
use super::display::DisplayEvent;
use super::interval::{local_date, start_of_day};

pub const TODAY: &str = "Today";
pub const TOMORROW: &str = "Tomorrow";

/// Display name for days other than today and tomorrow, e.g. `Monday March 4`
const LABEL_FORMAT: &str = "%A %B %-d";

/// Anything that belongs to a single local day.
pub trait DayStart {
  /// Local midnight of the owning day, as an instant.
  fn day_start(&self) -> DateTime<Utc>;
}

impl DayStart for DisplayEvent {
  fn day_start(&self) -> DateTime<Utc> {
    self.day_start
  }
}

/// Events grouped by day plus a display name for every day present.
///
/// Both maps iterate in the order days were first seen in the input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayBuckets<E> {
  pub days: DayMap<Vec<E>>,
  pub labels: DayMap<String>,
}

/// Splits an ordered event sequence into day buckets for one viewer zone.
#[derive(Debug, Clone)]
pub struct DayBucketer {
  zone: Tz,
  today: DayKey,
  tomorrow: Option<DayKey>,
}

impl DayBucketer {
  /// `reference` decides which days are labelled "Today" and "Tomorrow".
  pub fn new(zone: Tz, reference: DateTime<Utc>) -> Self {
    let today_date = local_date(reference, zone);
    let key_for =
      |date: NaiveDate| DayKey::for_instant(start_of_day(date, zone).with_timezone(&Utc), zone);

    Self {
      zone,
      today: key_for(today_date),
      tomorrow: today_date.succ_opt().map(key_for),
    }
  }

  pub fn day_key(&self, day_start: DateTime<Utc>) -> DayKey {
    DayKey::for_instant(day_start, self.zone)
  }

  /// Name shown for the day starting at `day_start`.
  pub fn label(&self, day_start: DateTime<Utc>) -> String {
    let day = self.day_key(day_start);
    if day == self.today {
      TODAY.to_string()
    } else if self.tomorrow.as_ref() == Some(&day) {
      TOMORROW.to_string()
    } else {
      day_start
        .with_timezone(&self.zone)
        .format(LABEL_FORMAT)
        .to_string()
    }
  }

  /// Group `events` by day. The input order is kept inside each bucket, and
  /// every event lands in exactly one bucket.
  pub fn bucket<E: DayStart>(&self, events: impl IntoIterator<Item = E>) -> DayBuckets<E> {
    let mut days: DayMap<Vec<E>> = DayMap::new();
    let mut labels = DayMap::new();

    for event in events {
      let day_start = event.day_start();
      let day = self.day_key(day_start);

      if !days.contains_key(&day) {
        labels.insert(day.clone(), self.label(day_start));
      }
      days.get_or_insert_with(day, Vec::new).push(event);
    }

    DayBuckets { days, labels }
  }
}

/// Convenience wrapper for a one-off bucketing.
pub fn bucket_by_day<E: DayStart>(
  events: impl IntoIterator<Item = E>,
  zone: Tz,
  reference: DateTime<Utc>,
) -> DayBuckets<E> {
  DayBucketer::new(zone, reference).bucket(events)
}
