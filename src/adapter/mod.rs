//! Calendar adapters: pluggable sources of calendar events.

mod json_file;

pub use json_file::JsonFileAdapter;

use async_trait::async_trait;
use color_eyre::Result;
use std::collections::HashMap;
use std::sync::Arc;

use crate::calendar::{CalendarEventSet, DateInterval};
use crate::config::CalendarConfiguration;

/// A configuration parameter an adapter understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
  pub name: &'static str,
  pub label_key: &'static str,
  pub required: bool,
}

/// A source of calendar events.
///
/// Implementations are expected to cache what they fetch, typically through
/// [`CacheLayer`](crate::cache::CacheLayer), so repeated requests for the
/// same interval are cheap.
#[async_trait]
pub trait CalendarAdapter: Send + Sync {
  /// Message key for the adapter's display name
  fn title_key(&self) -> &str;

  /// Message key for the adapter's description
  fn description_key(&self) -> &str;

  /// Parameters a calendar configuration may set for this adapter
  fn parameters(&self) -> &[Parameter] {
    &[]
  }

  /// Events of `calendar` that overlap `interval`.
  async fn get_events(
    &self,
    calendar: &CalendarConfiguration,
    interval: &DateInterval,
  ) -> Result<CalendarEventSet>;

  /// Link to the calendar in its native application, if there is one.
  fn get_link(&self, _calendar: &CalendarConfiguration, _interval: &DateInterval) -> Option<String> {
    None
  }
}

/// Adapters by the name calendar configurations refer to them with.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
  adapters: HashMap<String, Arc<dyn CalendarAdapter>>,
}

impl AdapterRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register `adapter` under `name`, replacing any previous registration.
  pub fn register(&mut self, name: impl Into<String>, adapter: Arc<dyn CalendarAdapter>) {
    self.adapters.insert(name.into(), adapter);
  }

  pub fn with(mut self, name: impl Into<String>, adapter: Arc<dyn CalendarAdapter>) -> Self {
    self.register(name, adapter);
    self
  }

  pub fn get(&self, name: &str) -> Option<Arc<dyn CalendarAdapter>> {
    self.adapters.get(name).cloned()
  }

  pub fn names(&self) -> impl Iterator<Item = &str> {
    self.adapters.keys().map(String::as_str)
  }
}

impl std::fmt::Debug for AdapterRegistry {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("AdapterRegistry")
      .field("adapters", &self.adapters.keys().collect::<Vec<_>>())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::{TimeZone, Utc};
  use std::collections::BTreeMap;

  struct Fixed;

  #[async_trait]
  impl CalendarAdapter for Fixed {
    fn title_key(&self) -> &str {
      "adapter.fixed.title"
    }

    fn description_key(&self) -> &str {
      "adapter.fixed.description"
    }

    async fn get_events(
      &self,
      calendar: &CalendarConfiguration,
      _interval: &DateInterval,
    ) -> Result<CalendarEventSet> {
      Ok(CalendarEventSet::new(calendar.name.clone(), Default::default()))
    }
  }

  fn config() -> CalendarConfiguration {
    CalendarConfiguration {
      id: 1,
      name: "Fixed".to_string(),
      adapter: "fixed".to_string(),
      ttl_seconds: -1,
      parameters: BTreeMap::new(),
    }
  }

  #[test]
  fn registry_looks_adapters_up_by_name() {
    let mut registry = AdapterRegistry::new().with("fixed", Arc::new(Fixed));
    registry.register("other", Arc::new(Fixed));

    let mut names: Vec<_> = registry.names().collect();
    names.sort();
    assert_eq!(names, ["fixed", "other"]);
    assert!(registry.get("fixed").is_some());
    assert!(registry.get("caldav").is_none());
  }

  #[test]
  fn adapters_have_no_parameters_or_link_by_default() {
    let interval = DateInterval::new(
      Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
      Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
    );

    assert!(Fixed.parameters().is_empty());
    assert_eq!(Fixed.get_link(&config(), &interval), None);
  }
}
