//! Wall-clock abstraction so cache expiry and "today" can be driven in tests.

use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, Mutex};

/// Source of the current instant.
pub trait Clock: Send + Sync {
  fn now(&self) -> DateTime<Utc>;
}

/// Real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> {
    Utc::now()
  }
}

/// Manually advanced clock.
///
/// Clones share the same underlying instant, so a clone handed to a cache
/// backend moves together with the one kept by the test.
#[derive(Debug, Clone)]
pub struct MockClock {
  now: Arc<Mutex<DateTime<Utc>>>,
}

impl MockClock {
  /// Create a mock clock frozen at `start`.
  pub fn at(start: DateTime<Utc>) -> Self {
    Self {
      now: Arc::new(Mutex::new(start)),
    }
  }

  /// Move the clock forward.
  pub fn advance(&self, by: Duration) {
    let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
    *now += by;
  }
}

impl Default for MockClock {
  fn default() -> Self {
    Self::at(Utc::now())
  }
}

impl Clock for MockClock {
  fn now(&self) -> DateTime<Utc> {
    *self.now.lock().unwrap_or_else(|e| e.into_inner())
  }
}
