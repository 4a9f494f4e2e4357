//! Downloading a calendar as an iCalendar file.

use chrono_tz::Tz;
use std::io::Write;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::adapter::AdapterRegistry;
use crate::calendar::interval::local_date;
use crate::calendar::{ics, DateInterval};
use crate::clock::{Clock, SystemClock};
use crate::config::CalendarConfiguration;

pub const EXPORT_FILENAME: &str = "calendar.ics";

/// Years of events exported on each side of today.
const EXPORT_YEARS: u32 = 1;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum ExportError {
  #[error("No calendar configuration with id {id}")]
  ConfigurationNotFound { id: u64 },

  #[error("Calendar adapter '{adapter}' for calendar {calendar} could not be found")]
  AdapterNotFound { calendar: String, adapter: String },

  #[error("Error sending calendar {calendar} to user for downloading")]
  SendFailed {
    calendar: String,
    #[source]
    source: BoxError,
  },
}

impl ExportError {
  /// Name of the calendar the failure concerns, when one was resolved.
  pub fn calendar(&self) -> Option<&str> {
    match self {
      ExportError::ConfigurationNotFound { .. } => None,
      ExportError::AdapterNotFound { calendar, .. } => Some(calendar),
      ExportError::SendFailed { calendar, .. } => Some(calendar),
    }
  }
}

/// A rendered calendar ready to be sent as an attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarExport {
  pub calendar: String,
  pub content_type: &'static str,
  pub content_disposition: String,
  pub body: String,
}

/// Renders a single configured calendar as iCalendar.
pub struct ExportController {
  registry: AdapterRegistry,
  calendars: Vec<CalendarConfiguration>,
  zone: Tz,
  clock: Arc<dyn Clock>,
}

impl ExportController {
  pub fn new(registry: AdapterRegistry, calendars: Vec<CalendarConfiguration>) -> Self {
    Self {
      registry,
      calendars,
      zone: Tz::UTC,
      clock: Arc::new(SystemClock),
    }
  }

  /// Zone whose midnights bound the exported range.
  pub fn with_zone(mut self, zone: Tz) -> Self {
    self.zone = zone;
    self
  }

  pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
    self.clock = clock;
    self
  }

  /// Render the calendar configured under `id` with a year of events either
  /// side of today. Exports within one local day share an interval, and so
  /// share the adapter's cache entry.
  pub async fn export_calendar(&self, id: u64) -> Result<CalendarExport, ExportError> {
    let calendar = self
      .calendars
      .iter()
      .find(|c| c.id == id)
      .ok_or(ExportError::ConfigurationNotFound { id })?;

    let adapter = self
      .registry
      .get(&calendar.adapter)
      .ok_or_else(|| ExportError::AdapterNotFound {
        calendar: calendar.name.clone(),
        adapter: calendar.adapter.clone(),
      })?;

    let now = self.clock.now();
    let interval = DateInterval::around(local_date(now, self.zone), EXPORT_YEARS, self.zone);
    let event_set = adapter
      .get_events(calendar, &interval)
      .await
      .map_err(|e| ExportError::SendFailed {
        calendar: calendar.name.clone(),
        source: e.into(),
      })?;

    Ok(CalendarExport {
      calendar: calendar.name.clone(),
      content_type: ics::CONTENT_TYPE,
      content_disposition: format!("attachment; filename={}", EXPORT_FILENAME),
      body: ics::write_calendar(&calendar.name, event_set.events(), now),
    })
  }

  /// Render and write the calendar to `out`.
  pub async fn send_calendar<W: Write>(
    &self,
    id: u64,
    out: &mut W,
  ) -> Result<CalendarExport, ExportError> {
    let export = self.export_calendar(id).await?;

    out
      .write_all(export.body.as_bytes())
      .and_then(|_| out.flush())
      .map_err(|e| ExportError::SendFailed {
        calendar: export.calendar.clone(),
        source: Box::new(e),
      })?;

    info!(calendar = %export.calendar, bytes = export.body.len(), "Sent calendar export");
    Ok(export)
  }
}
