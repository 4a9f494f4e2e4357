use async_trait::async_trait;
use calagg::calendar::{CalendarEvent, DateInterval, DisplayEvent};
use calagg::clock::MockClock;
use calagg::controller::{EventListController, EventListRequest, EventProvider, RequestError};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::America::New_York;
use chrono_tz::Tz;
use color_eyre::Result;
use std::sync::{Arc, Mutex};

/// Provider that resolves a fixed, replaceable list of raw events.
#[derive(Default)]
struct ScriptedProvider {
  events: Mutex<Vec<CalendarEvent>>,
  errors: Vec<String>,
}

impl ScriptedProvider {
  fn with_events(events: Vec<CalendarEvent>) -> Self {
    Self {
      events: Mutex::new(events),
      errors: Vec::new(),
    }
  }

  fn replace(&self, events: Vec<CalendarEvent>) {
    *self.events.lock().unwrap() = events;
  }
}

#[async_trait]
impl EventProvider for ScriptedProvider {
  async fn get_event_list(
    &self,
    errors: &mut Vec<String>,
    interval: &DateInterval,
    zone: Tz,
  ) -> Result<Vec<DisplayEvent>> {
    errors.extend(self.errors.iter().cloned());
    let events = self.events.lock().unwrap().clone();
    let mut resolved: Vec<DisplayEvent> = events
      .iter()
      .flat_map(|e| DisplayEvent::resolve(e, interval, zone))
      .collect();
    resolved.sort();
    Ok(resolved)
  }
}

fn now() -> DateTime<Utc> {
  // Monday morning in New York
  Utc.with_ymd_and_hms(2024, 5, 6, 13, 0, 0).unwrap()
}

fn meeting(uid: &str, start: DateTime<Utc>) -> CalendarEvent {
  CalendarEvent {
    start,
    end: Some(start + Duration::hours(1)),
    uid: uid.to_string(),
    summary: format!("Meeting {}", uid),
    description: None,
    location: Some("Room 2".to_string()),
    all_day: false,
  }
}

fn holiday() -> CalendarEvent {
  CalendarEvent {
    start: Utc.with_ymd_and_hms(2024, 5, 8, 0, 0, 0).unwrap(),
    end: Some(Utc.with_ymd_and_hms(2024, 5, 9, 0, 0, 0).unwrap()),
    uid: "holiday".to_string(),
    summary: "Office closed".to_string(),
    description: None,
    location: None,
    all_day: true,
  }
}

fn week_events() -> Vec<CalendarEvent> {
  vec![
    meeting("planning", Utc.with_ymd_and_hms(2024, 5, 6, 14, 0, 0).unwrap()),
    meeting("retro", Utc.with_ymd_and_hms(2024, 5, 7, 18, 0, 0).unwrap()),
    holiday(),
  ]
}

fn controller(provider: ScriptedProvider) -> EventListController<ScriptedProvider> {
  EventListController::new(provider, New_York).with_clock(Arc::new(MockClock::at(now())))
}

fn request(refresh: bool) -> EventListRequest {
  EventListRequest {
    start_date: NaiveDate::from_ymd_opt(2024, 5, 6).unwrap(),
    days: 7,
    refresh,
  }
}

#[tokio::test]
async fn full_response_groups_events_by_day() {
  let controller = controller(ScriptedProvider::with_events(week_events()));

  let response = controller.handle("05062024-7", None, None).await.unwrap();

  assert_eq!(response.status_code(), 200);
  assert_eq!(response.cache_control().expiration_seconds, 1);
  assert!(!response.cache_control().use_cached_content);

  let model = response.model().unwrap();
  assert_eq!(model.view_name, "jsonView");
  assert_eq!(model.event_count(), 3);
  assert!(model.errors.is_empty());

  let labels: Vec<_> = model
    .date_names
    .iter()
    .map(|(day, label)| (day.as_str(), label.as_str()))
    .collect();
  assert_eq!(
    labels,
    [
      ("2024-05-06", "Today"),
      ("2024-05-07", "Tomorrow"),
      ("2024-05-08", "Wednesday May 8"),
    ]
  );
}

#[tokio::test]
async fn matching_etag_gets_not_modified() {
  let controller = controller(ScriptedProvider::with_events(week_events()));

  let first = controller.event_list(&request(false), None, None).await.unwrap();
  let etag = first.etag().to_string();

  let second = controller
    .event_list(&request(false), None, Some(&etag))
    .await
    .unwrap();

  assert!(second.is_not_modified());
  assert_eq!(second.status_code(), 304);
  assert_eq!(second.etag(), etag);
  assert!(second.model().is_none());
  assert!(second.cache_control().use_cached_content);
}

#[tokio::test]
async fn refresh_ignores_a_matching_etag() {
  let controller = controller(ScriptedProvider::with_events(week_events()));

  let first = controller.event_list(&request(false), None, None).await.unwrap();
  let etag = first.etag().to_string();

  let refreshed = controller
    .handle("05062024-7-true", None, Some(&etag))
    .await
    .unwrap();

  assert_eq!(refreshed.status_code(), 200);
  assert_eq!(refreshed.etag(), etag);
  assert_eq!(refreshed.model(), first.model());
}

#[tokio::test]
async fn changed_events_change_the_etag() {
  let provider = ScriptedProvider::with_events(week_events());
  let controller = controller(provider);

  let first = controller.event_list(&request(false), None, None).await.unwrap();
  let etag = first.etag().to_string();

  let mut changed = week_events();
  changed[0].summary = "Planning (moved)".to_string();
  controller.provider().replace(changed);

  let second = controller
    .event_list(&request(false), None, Some(&etag))
    .await
    .unwrap();

  assert_eq!(second.status_code(), 200);
  assert_ne!(second.etag(), etag);
}

#[tokio::test]
async fn viewer_zone_moves_events_between_days() {
  let late = meeting("late", Utc.with_ymd_and_hms(2024, 5, 7, 2, 30, 0).unwrap());
  let controller = controller(ScriptedProvider::with_events(vec![late]));

  let in_new_york = controller.handle("05062024-3", None, None).await.unwrap();
  let in_tokyo = controller
    .handle("05062024-3", Some("Asia/Tokyo"), None)
    .await
    .unwrap();

  let day = |r: &calagg::controller::EventListResponse| {
    r.model()
      .unwrap()
      .date_map
      .keys()
      .map(|k| k.as_str().to_string())
      .collect::<Vec<_>>()
  };
  assert_eq!(day(&in_new_york), ["2024-05-06"]);
  assert_eq!(day(&in_tokyo), ["2024-05-07"]);
  assert_ne!(in_new_york.etag(), in_tokyo.etag());
}

#[tokio::test]
async fn provider_errors_are_reported_in_the_model() {
  let provider = ScriptedProvider {
    events: Mutex::new(week_events()),
    errors: vec!["Work: connection refused".to_string()],
  };
  let controller = controller(provider);

  let response = controller.handle("05062024-7", None, None).await.unwrap();
  let model = response.model().unwrap();

  assert_eq!(model.errors, ["Work: connection refused"]);
  assert_eq!(model.event_count(), 3);
}

#[tokio::test]
async fn bad_requests_are_rejected() {
  let controller = controller(ScriptedProvider::default());

  let err = controller.handle("5-6-2024", None, None).await.unwrap_err();
  assert!(err.downcast_ref::<RequestError>().is_some());

  let err = controller
    .handle("05062024-7", Some("Mars/Olympus"), None)
    .await
    .unwrap_err();
  assert_eq!(
    err.downcast_ref::<RequestError>(),
    Some(&RequestError::UnknownTimeZone("Mars/Olympus".to_string()))
  );
}

#[tokio::test]
async fn empty_calendar_still_has_a_stable_etag() {
  let controller = controller(ScriptedProvider::default());

  let first = controller.handle("05062024-1", None, None).await.unwrap();
  let model = first.model().unwrap();
  assert!(model.date_map.is_empty());
  assert!(model.date_names.is_empty());

  let second = controller
    .handle("05062024-1", None, Some(first.etag()))
    .await
    .unwrap();
  assert!(second.is_not_modified());
}
