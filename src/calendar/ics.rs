//! Minimal RFC 5545 writer for exported calendars.

use chrono::{DateTime, Utc};

use super::types::CalendarEvent;

pub const CONTENT_TYPE: &str = "text/calendar";
const PRODUCT_ID: &str = "-//calagg//Calendar Export//EN";
/// Content lines are folded at 75 octets.
const MAX_LINE_OCTETS: usize = 75;

/// Render `events` as a `VCALENDAR` named `name`. `stamp` is written as every
/// event's `DTSTAMP`.
pub fn write_calendar<'a>(
  name: &str,
  events: impl IntoIterator<Item = &'a CalendarEvent>,
  stamp: DateTime<Utc>,
) -> String {
  let mut out = String::new();
  push_line(&mut out, "BEGIN:VCALENDAR");
  push_line(&mut out, "VERSION:2.0");
  push_line(&mut out, &format!("PRODID:{}", PRODUCT_ID));
  push_line(&mut out, "CALSCALE:GREGORIAN");
  push_line(&mut out, &format!("X-WR-CALNAME:{}", escape_text(name)));

  for event in events {
    write_event(&mut out, event, stamp);
  }

  push_line(&mut out, "END:VCALENDAR");
  out
}

fn write_event(out: &mut String, event: &CalendarEvent, stamp: DateTime<Utc>) {
  push_line(out, "BEGIN:VEVENT");
  push_line(out, &format!("UID:{}", escape_text(&event.uid)));
  push_line(out, &format!("DTSTAMP:{}", format_utc(stamp)));

  if event.all_day {
    push_line(out, &format!("DTSTART;VALUE=DATE:{}", format_date(event.start)));
    if let Some(end) = event.end {
      push_line(out, &format!("DTEND;VALUE=DATE:{}", format_date(end)));
    }
  } else {
    push_line(out, &format!("DTSTART:{}", format_utc(event.start)));
    if let Some(end) = event.end {
      push_line(out, &format!("DTEND:{}", format_utc(end)));
    }
  }

  push_line(out, &format!("SUMMARY:{}", escape_text(&event.summary)));
  if let Some(description) = &event.description {
    push_line(out, &format!("DESCRIPTION:{}", escape_text(description)));
  }
  if let Some(location) = &event.location {
    push_line(out, &format!("LOCATION:{}", escape_text(location)));
  }
  push_line(out, "END:VEVENT");
}

fn format_utc(instant: DateTime<Utc>) -> String {
  instant.format("%Y%m%dT%H%M%SZ").to_string()
}

fn format_date(instant: DateTime<Utc>) -> String {
  instant.format("%Y%m%d").to_string()
}

/// Escape a TEXT property value.
fn escape_text(value: &str) -> String {
  let mut escaped = String::with_capacity(value.len());
  for c in value.chars() {
    match c {
      '\\' => escaped.push_str("\\\\"),
      ';' => escaped.push_str("\\;"),
      ',' => escaped.push_str("\\,"),
      '\n' => escaped.push_str("\\n"),
      '\r' => {}
      c => escaped.push(c),
    }
  }
  escaped
}

/// Append a content line, folded and CRLF terminated.
fn push_line(out: &mut String, line: &str) {
  let mut octets = 0;
  for c in line.chars() {
    // Continuation lines start with a space, which counts toward the limit.
    if octets + c.len_utf8() > MAX_LINE_OCTETS {
      out.push_str("\r\n ");
      octets = 1;
    }
    out.push(c);
    octets += c.len_utf8();
  }
  out.push_str("\r\n");
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  fn stamp() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()
  }

  #[test]
  fn writes_timed_and_all_day_events() {
    let timed = CalendarEvent {
      start: Utc.with_ymd_and_hms(2024, 1, 10, 15, 0, 0).unwrap(),
      end: Some(Utc.with_ymd_and_hms(2024, 1, 10, 16, 0, 0).unwrap()),
      uid: "t-1".to_string(),
      summary: "Review; budget, Q1".to_string(),
      description: Some("line one\nline two".to_string()),
      location: None,
      all_day: false,
    };
    let all_day = CalendarEvent {
      start: Utc.with_ymd_and_hms(2024, 1, 12, 0, 0, 0).unwrap(),
      end: None,
      uid: "a-1".to_string(),
      summary: "Holiday".to_string(),
      description: None,
      location: None,
      all_day: true,
    };

    let ics = write_calendar("Team", [&timed, &all_day], stamp());

    assert!(ics.starts_with("BEGIN:VCALENDAR\r\nVERSION:2.0\r\n"));
    assert!(ics.ends_with("END:VCALENDAR\r\n"));
    assert!(ics.contains("DTSTART:20240110T150000Z\r\n"));
    assert!(ics.contains("DTEND:20240110T160000Z\r\n"));
    assert!(ics.contains("SUMMARY:Review\\; budget\\, Q1\r\n"));
    assert!(ics.contains("DESCRIPTION:line one\\nline two\r\n"));
    assert!(ics.contains("DTSTART;VALUE=DATE:20240112\r\n"));
    assert!(ics.contains("DTSTAMP:20240102T030405Z\r\n"));
    assert_eq!(ics.matches("BEGIN:VEVENT").count(), 2);
  }

  #[test]
  fn long_lines_are_folded_at_75_octets() {
    let mut out = String::new();
    push_line(&mut out, &format!("SUMMARY:{}", "é".repeat(60)));

    for line in out.split("\r\n").filter(|l| !l.is_empty()) {
      assert!(line.len() <= MAX_LINE_OCTETS, "line too long: {}", line.len());
    }
    let unfolded = out.replace("\r\n ", "");
    assert_eq!(unfolded, format!("SUMMARY:{}\r\n", "é".repeat(60)));
  }
}
