use chrono::Duration;
use chrono_tz::Tz;
use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::cache::ExpiryPolicy;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  /// Viewer time zone used when a request does not carry one
  #[serde(default = "default_timezone", deserialize_with = "deserialize_tz")]
  pub timezone: Tz,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub calendars: Vec<CalendarConfiguration>,
}

fn default_timezone() -> Tz {
  Tz::UTC
}

fn deserialize_tz<'de, D>(deserializer: D) -> Result<Tz, D::Error>
where
  D: serde::Deserializer<'de>,
{
  let name = String::deserialize(deserializer)?;
  name
    .parse::<Tz>()
    .map_err(|_| serde::de::Error::custom(format!("unknown time zone '{}'", name)))
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
  /// In-process map, lost on exit
  #[default]
  Memory,
  /// SQLite file under the data directory (or `cache.path`)
  Sqlite,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheConfig {
  #[serde(default)]
  pub backend: CacheBackend,
  /// Lifetime for entries stored with the cache default; absent = never expire
  pub default_ttl_seconds: Option<u32>,
  /// Upper bound the cache applies to every entry
  pub max_ttl_seconds: Option<u32>,
  pub path: Option<PathBuf>,
}

impl CacheConfig {
  pub fn policy(&self) -> ExpiryPolicy {
    ExpiryPolicy {
      default_ttl: self.default_ttl_seconds.map(|s| Duration::seconds(i64::from(s))),
      max_ttl: self.max_ttl_seconds.map(|s| Duration::seconds(i64::from(s))),
    }
  }
}

/// One calendar a user has subscribed to.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CalendarConfiguration {
  pub id: u64,
  pub name: String,
  /// Name the adapter is registered under (e.g. "json")
  pub adapter: String,
  /// `< 0` cache default, `0` never expire, otherwise seconds
  #[serde(default = "default_ttl_seconds")]
  pub ttl_seconds: i64,
  /// Adapter-specific settings
  #[serde(default)]
  pub parameters: BTreeMap<String, String>,
}

fn default_ttl_seconds() -> i64 {
  -1
}

impl CalendarConfiguration {
  pub fn parameter(&self, name: &str) -> Option<&str> {
    self.parameters.get(name).map(String::as_str)
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./calagg.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/calagg/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/calagg/config.yaml"
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("calagg.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("calagg").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn from_yaml(contents: &str) -> Result<Self> {
    serde_yaml::from_str(contents).map_err(|e| eyre!("{}", e))
  }

  /// Look up a calendar configuration by id.
  pub fn calendar(&self, id: u64) -> Option<&CalendarConfiguration> {
    self.calendars.iter().find(|c| c.id == id)
  }
}
