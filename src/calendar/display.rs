//! Resolving raw calendar events into per-day display events.

use chrono::{DateTime, Days, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use super::interval::{local_date, start_of_day, DateInterval};
use super::types::CalendarEvent;

/// Display format for local times, e.g. `9:05 AM`
const TIME_FORMAT: &str = "%-I:%M %p";

/// One day's slice of a calendar event, ready for presentation.
///
/// Ordered chronologically: by day, then by event start and end, with the
/// remaining fields as tie-breaks.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayEvent {
  /// Local midnight (viewer zone) of the day this slice belongs to
  pub day_start: DateTime<Utc>,
  pub start: DateTime<Utc>,
  pub end: Option<DateTime<Utc>>,
  pub summary: String,
  pub uid: String,
  pub day_end: DateTime<Utc>,
  pub description: Option<String>,
  pub location: Option<String>,
  pub date_start_time: String,
  pub date_end_time: Option<String>,
  pub all_day: bool,
  pub multi_day: bool,
}

impl DisplayEvent {
  /// Split `event` into one display event per local day of `zone` that it
  /// touches inside `interval`.
  pub fn resolve(event: &CalendarEvent, interval: &DateInterval, zone: Tz) -> Vec<DisplayEvent> {
    let (first, last) = event_dates(event, zone);
    let multi_day = first != last;

    // Only walk the dates the interval can actually contain.
    let from = first.max(local_date(interval.start, zone));
    let to = last.min(local_date(interval.end, zone));

    let mut resolved = Vec::new();
    let mut date = from;
    while date <= to {
      let day_start = start_of_day(date, zone).with_timezone(&Utc);
      let day_end = next_day(date)
        .map(|d| start_of_day(d, zone).with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::MAX_UTC);

      let visible = if event.all_day {
        interval.overlaps(day_start, day_end)
      } else {
        let seg_start = event.start.max(day_start);
        let seg_end = event.end.unwrap_or(event.start).min(day_end);
        interval.overlaps(seg_start, seg_end)
      };

      if visible {
        resolved.push(DisplayEvent {
          day_start,
          start: event.start,
          end: event.end,
          summary: event.summary.clone(),
          uid: event.uid.clone(),
          day_end,
          description: event.description.clone(),
          location: event.location.clone(),
          date_start_time: format_time(event.start, zone),
          date_end_time: event.end.map(|end| format_time(end, zone)),
          all_day: event.all_day,
          multi_day,
        });
      }

      match next_day(date) {
        Some(d) => date = d,
        None => break,
      }
    }

    resolved
  }
}

/// First and last local date covered by `event`.
///
/// All-day events are floating dates and ignore the viewer zone; their end is
/// exclusive. Timed events end exclusively too, so an event ending exactly at
/// midnight does not spill into the next day.
fn event_dates(event: &CalendarEvent, zone: Tz) -> (NaiveDate, NaiveDate) {
  if event.all_day {
    let first = event.start.date_naive();
    let last = event
      .end
      .map(|end| end.date_naive())
      .filter(|end| *end > first)
      .and_then(|end| end.pred_opt())
      .unwrap_or(first);
    return (first, last);
  }

  let first = local_date(event.start, zone);
  let last = match event.end {
    Some(end) if end > event.start => local_date(end - chrono::Duration::nanoseconds(1), zone),
    _ => first,
  };
  (first, last)
}

fn next_day(date: NaiveDate) -> Option<NaiveDate> {
  date.checked_add_days(Days::new(1))
}

fn format_time(instant: DateTime<Utc>, zone: Tz) -> String {
  instant.with_timezone(&zone).format(TIME_FORMAT).to_string()
}
