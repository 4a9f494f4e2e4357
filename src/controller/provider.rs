//! Collecting display events across a user's calendars.

use async_trait::async_trait;
use chrono_tz::Tz;
use color_eyre::{eyre::eyre, Result};
use futures::future::join_all;
use std::collections::BTreeSet;
use tracing::warn;

use crate::adapter::AdapterRegistry;
use crate::calendar::{CalendarEventSet, DateInterval, DisplayEvent};
use crate::config::CalendarConfiguration;

/// Supplies the display events for one request.
#[async_trait]
pub trait EventProvider: Send + Sync {
  /// Display events of all relevant calendars within `interval`, resolved in
  /// `zone`. Calendars that fail are skipped and described in `errors`.
  async fn get_event_list(
    &self,
    errors: &mut Vec<String>,
    interval: &DateInterval,
    zone: Tz,
  ) -> Result<Vec<DisplayEvent>>;
}

/// Event provider that asks each configured calendar's adapter in turn.
#[derive(Debug, Clone)]
pub struct AdapterEventProvider {
  registry: AdapterRegistry,
  calendars: Vec<CalendarConfiguration>,
}

impl AdapterEventProvider {
  pub fn new(registry: AdapterRegistry, calendars: Vec<CalendarConfiguration>) -> Self {
    Self {
      registry,
      calendars,
    }
  }

  async fn fetch_calendar(
    &self,
    calendar: &CalendarConfiguration,
    interval: &DateInterval,
  ) -> Result<CalendarEventSet> {
    let adapter = self
      .registry
      .get(&calendar.adapter)
      .ok_or_else(|| eyre!("no calendar adapter registered as '{}'", calendar.adapter))?;

    adapter.get_events(calendar, interval).await
  }
}

#[async_trait]
impl EventProvider for AdapterEventProvider {
  async fn get_event_list(
    &self,
    errors: &mut Vec<String>,
    interval: &DateInterval,
    zone: Tz,
  ) -> Result<Vec<DisplayEvent>> {
    let results = join_all(
      self
        .calendars
        .iter()
        .map(|calendar| self.fetch_calendar(calendar, interval)),
    )
    .await;

    // A set drops display events duplicated across calendars and sorts them.
    let mut events = BTreeSet::new();
    for (calendar, result) in self.calendars.iter().zip(results) {
      match result {
        Ok(event_set) => {
          for event in event_set.events() {
            events.extend(DisplayEvent::resolve(event, interval, zone));
          }
        }
        Err(e) => {
          warn!(calendar = %calendar.name, error = %e, "Failed to retrieve calendar events");
          errors.push(format!("{}: {}", calendar.name, e));
        }
      }
    }

    Ok(events.into_iter().collect())
  }
}
