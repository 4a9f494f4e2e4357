//! Date intervals and zone-aware day boundaries.

use chrono::{DateTime, Days, LocalResult, Months, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Half-open `[start, end)` span of time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateInterval {
  pub start: DateTime<Utc>,
  pub end: DateTime<Utc>,
}

impl DateInterval {
  pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
    Self { start, end }
  }

  /// `days` whole local days starting at midnight of `start_date` in `zone`.
  pub fn for_days(start_date: NaiveDate, days: u32, zone: Tz) -> Self {
    let end_date = start_date
      .checked_add_days(Days::new(u64::from(days)))
      .unwrap_or(NaiveDate::MAX);
    Self {
      start: start_of_day(start_date, zone).with_timezone(&Utc),
      end: start_of_day(end_date, zone).with_timezone(&Utc),
    }
  }

  /// Whole local days from `years` before `today` through `years` after it.
  ///
  /// Bounds sit on midnights in `zone`, so every call made during one local
  /// day yields the same interval.
  pub fn around(today: NaiveDate, years: u32, zone: Tz) -> Self {
    let months = Months::new(years.saturating_mul(12));
    let first = today.checked_sub_months(months).unwrap_or(NaiveDate::MIN);
    let last = today.checked_add_months(months).unwrap_or(NaiveDate::MAX);
    let end = last.checked_add_days(Days::new(1)).unwrap_or(NaiveDate::MAX);
    Self {
      start: start_of_day(first, zone).with_timezone(&Utc),
      end: start_of_day(end, zone).with_timezone(&Utc),
    }
  }

  pub fn contains(&self, instant: DateTime<Utc>) -> bool {
    self.start <= instant && instant < self.end
  }

  /// Whether `[start, end)` shares any instant with this interval. A zero
  /// length span overlaps when its start is contained.
  pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
    if end <= start {
      return self.contains(start);
    }
    start < self.end && self.start < end
  }
}

/// First instant of `date` in `zone`.
///
/// When local midnight falls in a DST gap the day starts at the first valid
/// local time after it.
pub fn start_of_day(date: NaiveDate, zone: Tz) -> DateTime<Tz> {
  let midnight = date.and_time(chrono::NaiveTime::MIN);
  match zone.from_local_datetime(&midnight) {
    LocalResult::Single(dt) => dt,
    LocalResult::Ambiguous(earliest, _) => earliest,
    LocalResult::None => {
      // Gaps are at most a few hours; step forward until local time exists.
      (1..=24)
        .filter_map(|step: i64| {
          zone
            .from_local_datetime(&(midnight + chrono::Duration::minutes(step * 15)))
            .earliest()
        })
        .next()
        .unwrap_or_else(|| zone.from_utc_datetime(&midnight))
    }
  }
}

/// Local calendar date of `instant` in `zone`.
pub fn local_date(instant: DateTime<Utc>, zone: Tz) -> NaiveDate {
  instant.with_timezone(&zone).date_naive()
}
