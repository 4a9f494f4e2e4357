//! Day-grouped event lists with ETag-based conditional responses.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use color_eyre::Result;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, trace};

use super::provider::EventProvider;
use crate::calendar::{
  ConditionalResponse, DateInterval, DayBucketer, DayMap, DayStart, DisplayEvent,
};
use crate::clock::{Clock, SystemClock};

/// View marker included in every full response
pub const JSON_VIEW: &str = "jsonView";

/// Start dates in resource ids look like `03142024`.
const START_DATE_FORMAT: &str = "%m%d%Y";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
  #[error("malformed resource id '{0}', expected <MMddyyyy>-<days>[-<refresh>]")]
  MalformedResourceId(String),
  #[error("invalid start date '{0}', expected MMddyyyy")]
  InvalidStartDate(String),
  #[error("invalid number of days '{0}'")]
  InvalidDays(String),
  #[error("unknown time zone '{0}'")]
  UnknownTimeZone(String),
}

/// Parameters of an event list request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventListRequest {
  pub start_date: NaiveDate,
  pub days: u32,
  /// Ignore the client's validator and always send the full model
  pub refresh: bool,
}

impl EventListRequest {
  /// Parse `<MMddyyyy>-<days>[-<refresh>]`.
  ///
  /// `refresh` is true only for a case-insensitive `true`; any other value
  /// means false.
  pub fn from_resource_id(resource_id: &str) -> Result<Self, RequestError> {
    let tokens: Vec<&str> = resource_id.split('-').collect();
    if tokens.len() < 2 {
      return Err(RequestError::MalformedResourceId(resource_id.to_string()));
    }

    let start_date = NaiveDate::parse_from_str(tokens[0], START_DATE_FORMAT)
      .map_err(|_| RequestError::InvalidStartDate(tokens[0].to_string()))?;
    let days = tokens[1]
      .parse::<u32>()
      .map_err(|_| RequestError::InvalidDays(tokens[1].to_string()))?;
    let refresh = tokens
      .get(2)
      .is_some_and(|t| t.eq_ignore_ascii_case("true"));

    Ok(Self {
      start_date,
      days,
      refresh,
    })
  }
}

/// A display event tagged with its position in the provider's output.
///
/// Sorting by `(event, index)` keeps otherwise equal events in discovery
/// order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct IndexedEvent {
  #[serde(flatten)]
  pub event: DisplayEvent,
  #[serde(skip)]
  pub index: usize,
}

impl DayStart for IndexedEvent {
  fn day_start(&self) -> DateTime<Utc> {
    self.event.day_start
  }
}

/// Tag events with their discovery index and sort them for display.
pub fn wrap_events(events: impl IntoIterator<Item = DisplayEvent>) -> Vec<IndexedEvent> {
  let mut wrapped: Vec<IndexedEvent> = events
    .into_iter()
    .enumerate()
    .map(|(index, event)| IndexedEvent { event, index })
    .collect();
  wrapped.sort();
  wrapped
}

/// Everything a client receives for a full event list response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventListModel {
  pub date_map: DayMap<Vec<IndexedEvent>>,
  pub date_names: DayMap<String>,
  pub view_name: String,
  pub errors: Vec<String>,
}

impl EventListModel {
  pub fn event_count(&self) -> usize {
    self.date_map.values().map(Vec::len).sum()
  }
}

pub type EventListResponse = ConditionalResponse<EventListModel>;

/// Builds day-grouped event lists for a viewer.
pub struct EventListController<P: EventProvider> {
  provider: P,
  default_zone: Tz,
  clock: Arc<dyn Clock>,
}

impl<P: EventProvider> EventListController<P> {
  pub fn new(provider: P, default_zone: Tz) -> Self {
    Self {
      provider,
      default_zone,
      clock: Arc::new(SystemClock),
    }
  }

  pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
    self.clock = clock;
    self
  }

  pub fn provider(&self) -> &P {
    &self.provider
  }

  /// Parse `resource_id` and answer it; see [`event_list`](Self::event_list).
  pub async fn handle(
    &self,
    resource_id: &str,
    timezone: Option<&str>,
    client_etag: Option<&str>,
  ) -> Result<EventListResponse> {
    let request = EventListRequest::from_resource_id(resource_id)?;
    self.event_list(&request, timezone, client_etag).await
  }

  /// Events of the requested days, grouped by day in the viewer's zone.
  ///
  /// `timezone` is the viewer's zone id, falling back to the configured
  /// default. When `client_etag` matches the fingerprint of the model and the
  /// request is not a forced refresh, the response tells the client to keep
  /// its cached copy.
  pub async fn event_list(
    &self,
    request: &EventListRequest,
    timezone: Option<&str>,
    client_etag: Option<&str>,
  ) -> Result<EventListResponse> {
    let started = Instant::now();
    let zone = self.resolve_zone(timezone)?;
    let interval = DateInterval::for_days(request.start_date, request.days, zone);

    let mut errors = Vec::new();
    let calendar_events = self
      .provider
      .get_event_list(&mut errors, &interval, zone)
      .await?;

    let buckets = DayBucketer::new(zone, self.clock.now()).bucket(wrap_events(calendar_events));
    trace!(days = buckets.days.len(), "Prepared the eventsByDay collection");

    let model = EventListModel {
      date_map: buckets.days,
      date_names: buckets.labels,
      view_name: JSON_VIEW.to_string(),
      errors,
    };

    let response = ConditionalResponse::evaluate(model, request.refresh, client_etag)?;
    debug!(
      not_modified = response.is_not_modified(),
      "Event list took {} ms to produce",
      started.elapsed().as_millis()
    );

    Ok(response)
  }

  fn resolve_zone(&self, timezone: Option<&str>) -> Result<Tz, RequestError> {
    match timezone {
      Some(id) => id
        .parse::<Tz>()
        .map_err(|_| RequestError::UnknownTimeZone(id.to_string())),
      None => Ok(self.default_zone),
    }
  }
}
