//! Adapter that reads events from a JSON file on disk.

use async_trait::async_trait;
use chrono::Duration;
use color_eyre::{eyre::eyre, Result};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::debug;

use super::{CalendarAdapter, Parameter};
use crate::cache::{CacheLayer, CacheSource, CacheStorage};
use crate::calendar::{CalendarEvent, CalendarEventSet, DateInterval, EventSetKey};
use crate::config::CalendarConfiguration;

pub const PATH_PARAMETER: &str = "path";

const PARAMETERS: &[Parameter] = &[Parameter {
  name: PATH_PARAMETER,
  label_key: "adapter.json.path",
  required: true,
}];

/// Serves events from a file holding a JSON array of [`CalendarEvent`]s,
/// caching each calendar/interval combination for the calendar's TTL.
pub struct JsonFileAdapter<S: CacheStorage> {
  cache: CacheLayer<S>,
}

impl<S: CacheStorage> JsonFileAdapter<S> {
  pub fn new(cache: CacheLayer<S>) -> Self {
    Self { cache }
  }
}

#[async_trait]
impl<S: CacheStorage + 'static> CalendarAdapter for JsonFileAdapter<S> {
  fn title_key(&self) -> &str {
    "adapter.json.title"
  }

  fn description_key(&self) -> &str {
    "adapter.json.description"
  }

  fn parameters(&self) -> &[Parameter] {
    PARAMETERS
  }

  async fn get_events(
    &self,
    calendar: &CalendarConfiguration,
    interval: &DateInterval,
  ) -> Result<CalendarEventSet> {
    let path = calendar.parameter(PATH_PARAMETER).ok_or_else(|| {
      eyre!(
        "Calendar '{}' is missing the '{}' parameter",
        calendar.name,
        PATH_PARAMETER
      )
    })?;

    let key = EventSetKey {
      calendar_id: calendar.id,
      source: path,
      interval,
    };

    let result = self
      .cache
      .fetch_event_set(&key.cache_hash(), calendar.ttl_seconds, || {
        read_events(Path::new(path), interval)
      })
      .await?;

    if result.source == CacheSource::Fetched {
      debug!(
        calendar = %calendar.name,
        events = result.data.events().len(),
        "Loaded {}",
        key.description()
      );
    }

    Ok(result.data)
  }

  /// `file://` link to the events file, when it is configured by absolute path.
  fn get_link(&self, calendar: &CalendarConfiguration, _interval: &DateInterval) -> Option<String> {
    calendar
      .parameter(PATH_PARAMETER)
      .filter(|path| Path::new(path).is_absolute())
      .map(|path| format!("file://{}", path))
  }
}

async fn read_events(path: &Path, interval: &DateInterval) -> Result<BTreeSet<CalendarEvent>> {
  let contents = tokio::fs::read(path)
    .await
    .map_err(|e| eyre!("Failed to read events file {}: {}", path.display(), e))?;

  let events: Vec<CalendarEvent> = serde_json::from_slice(&contents)
    .map_err(|e| eyre!("Failed to parse events file {}: {}", path.display(), e))?;

  Ok(
    events
      .into_iter()
      .filter(|event| might_overlap(event, interval))
      .collect(),
  )
}

/// Coarse interval filter. All-day dates float with the viewer zone, so they
/// get a day of slack each side; display resolution clips precisely.
fn might_overlap(event: &CalendarEvent, interval: &DateInterval) -> bool {
  if event.all_day {
    let end = event.end.unwrap_or(event.start + Duration::days(1));
    interval.overlaps(event.start - Duration::days(1), end + Duration::days(1))
  } else {
    interval.overlaps(event.start, event.end.unwrap_or(event.start))
  }
}
