//! Day keys and a map that iterates in first-insertion order.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::HashMap;
use std::fmt;

/// `YYYY-MM-DD` is both unique per date and sorts lexicographically by date.
const DAY_KEY_FORMAT: &str = "%Y-%m-%d";

/// Calendar date of an instant in a given zone, as a sortable string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
#[serde(transparent)]
pub struct DayKey(String);

impl DayKey {
  pub fn for_instant(instant: DateTime<Utc>, zone: Tz) -> Self {
    DayKey(instant.with_timezone(&zone).format(DAY_KEY_FORMAT).to_string())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for DayKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// Map from [`DayKey`] to `V` that iterates in the order keys were first
/// inserted, not in sorted or hash order.
#[derive(Debug, Clone)]
pub struct DayMap<V> {
  entries: Vec<(DayKey, V)>,
  index: HashMap<DayKey, usize>,
}

impl<V> DayMap<V> {
  pub fn new() -> Self {
    Self {
      entries: Vec::new(),
      index: HashMap::new(),
    }
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn contains_key(&self, key: &DayKey) -> bool {
    self.index.contains_key(key)
  }

  pub fn get(&self, key: &DayKey) -> Option<&V> {
    self.index.get(key).map(|&i| &self.entries[i].1)
  }

  /// Insert or replace. A replaced key keeps its original position.
  pub fn insert(&mut self, key: DayKey, value: V) -> Option<V> {
    match self.index.get(&key) {
      Some(&i) => Some(std::mem::replace(&mut self.entries[i].1, value)),
      None => {
        self.index.insert(key.clone(), self.entries.len());
        self.entries.push((key, value));
        None
      }
    }
  }

  /// Value for `key`, inserting `default()` at the end if it is new.
  pub fn get_or_insert_with(&mut self, key: DayKey, default: impl FnOnce() -> V) -> &mut V {
    let i = match self.index.get(&key) {
      Some(&i) => i,
      None => {
        let i = self.entries.len();
        self.index.insert(key.clone(), i);
        self.entries.push((key, default()));
        i
      }
    };
    &mut self.entries[i].1
  }

  pub fn keys(&self) -> impl Iterator<Item = &DayKey> {
    self.entries.iter().map(|(k, _)| k)
  }

  pub fn values(&self) -> impl Iterator<Item = &V> {
    self.entries.iter().map(|(_, v)| v)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&DayKey, &V)> {
    self.entries.iter().map(|(k, v)| (k, v))
  }
}

impl<V> Default for DayMap<V> {
  fn default() -> Self {
    Self::new()
  }
}

impl<V: PartialEq> PartialEq for DayMap<V> {
  fn eq(&self, other: &Self) -> bool {
    self.entries == other.entries
  }
}

impl<V: Eq> Eq for DayMap<V> {}

impl<V> IntoIterator for DayMap<V> {
  type Item = (DayKey, V);
  type IntoIter = std::vec::IntoIter<(DayKey, V)>;

  fn into_iter(self) -> Self::IntoIter {
    self.entries.into_iter()
  }
}

impl<V> FromIterator<(DayKey, V)> for DayMap<V> {
  fn from_iter<I: IntoIterator<Item = (DayKey, V)>>(iter: I) -> Self {
    let mut map = DayMap::new();
    for (k, v) in iter {
      map.insert(k, v);
    }
    map
  }
}

impl<V: Serialize> Serialize for DayMap<V> {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(self.entries.len()))?;
    for (k, v) in &self.entries {
      map.serialize_entry(k, v)?;
    }
    map.end()
  }
}
