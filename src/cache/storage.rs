//! Cache storage trait with in-memory and SQLite implementations.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::traits::{CachedEntry, Cacheable, Expiration, Ttl};
use crate::clock::{Clock, SystemClock};

/// Trait for cache storage backends.
///
/// Each call is atomic on its own; callers get no cross-call locking.
pub trait CacheStorage: Send + Sync {
  /// Store a value under `key`, replacing any existing entry, and return the
  /// expiry the backend recorded for it. Expired entries are purged first.
  fn put<T: Cacheable>(&self, key: &str, value: &T, ttl: Ttl) -> Result<Expiration>;

  /// Get a live entry. Expired entries are dropped and reported as missing.
  fn get<T: Cacheable>(&self, key: &str) -> Result<Option<CachedEntry<T>>>;

  /// Expiry the backend assigned to the entry under `key`.
  fn expiration_time(&self, key: &str) -> Result<Option<Expiration>>;

  /// Remove an entry, returning whether one was present.
  fn remove(&self, key: &str) -> Result<bool>;

  /// Drop every expired entry, returning how many were removed.
  fn purge_expired(&self) -> Result<usize>;

  /// Number of stored entries, expired or not.
  fn entry_count(&self) -> Result<usize>;
}

/// Backend-wide expiry rules.
///
/// `default_ttl` applies to entries stored with [`Ttl::CacheDefault`]
/// (`None` means such entries never expire). `max_ttl`, when set, caps every
/// lifetime including unlimited ones.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpiryPolicy {
  pub default_ttl: Option<Duration>,
  pub max_ttl: Option<Duration>,
}

impl ExpiryPolicy {
  /// Effective lifetime for a requested TTL.
  pub fn lifetime(&self, ttl: Ttl) -> Option<Duration> {
    let requested = match ttl {
      Ttl::CacheDefault => self.default_ttl,
      Ttl::Unlimited => None,
      Ttl::Seconds(s) => Some(Duration::seconds(i64::from(s))),
    };

    match (requested, self.max_ttl) {
      (Some(l), Some(max)) => Some(l.min(max)),
      (None, Some(max)) => Some(max),
      (l, None) => l,
    }
  }
}

struct StoredEntry {
  entity_type: &'static str,
  data: Vec<u8>,
  cached_at: DateTime<Utc>,
  expiration: Expiration,
}

/// In-process cache backed by a hash map.
pub struct MemoryStorage {
  entries: Mutex<HashMap<String, StoredEntry>>,
  policy: ExpiryPolicy,
  clock: Arc<dyn Clock>,
}

impl MemoryStorage {
  pub fn new() -> Self {
    Self {
      entries: Mutex::new(HashMap::new()),
      policy: ExpiryPolicy::default(),
      clock: Arc::new(SystemClock),
    }
  }

  pub fn with_policy(mut self, policy: ExpiryPolicy) -> Self {
    self.policy = policy;
    self
  }

  pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
    self.clock = clock;
    self
  }
}

impl Default for MemoryStorage {
  fn default() -> Self {
    Self::new()
  }
}

impl CacheStorage for MemoryStorage {
  fn put<T: Cacheable>(&self, key: &str, value: &T, ttl: Ttl) -> Result<Expiration> {
    let data =
      serde_json::to_vec(value).map_err(|e| eyre!("Failed to serialize cache entry: {}", e))?;
    let now = self.clock.now();
    let expiration = Expiration::after(now, self.policy.lifetime(ttl));
    let entry = StoredEntry {
      entity_type: T::entity_type(),
      data,
      cached_at: now,
      expiration,
    };

    let mut entries = self
      .entries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    entries.retain(|_, e| !e.expiration.is_expired(now));
    entries.insert(key.to_string(), entry);

    Ok(expiration)
  }

  fn get<T: Cacheable>(&self, key: &str) -> Result<Option<CachedEntry<T>>> {
    let mut entries = self
      .entries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let Some(entry) = entries.get(key) else {
      return Ok(None);
    };

    if entry.expiration.is_expired(self.clock.now()) {
      entries.remove(key);
      return Ok(None);
    }

    if entry.entity_type != T::entity_type() {
      return Ok(None);
    }

    let value: T = serde_json::from_slice(&entry.data)
      .map_err(|e| eyre!("Failed to deserialize cache entry {}: {}", key, e))?;

    Ok(Some(CachedEntry {
      value,
      cached_at: entry.cached_at,
      expiration: entry.expiration,
    }))
  }

  fn expiration_time(&self, key: &str) -> Result<Option<Expiration>> {
    let entries = self
      .entries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(entries.get(key).map(|e| e.expiration))
  }

  fn remove(&self, key: &str) -> Result<bool> {
    let mut entries = self
      .entries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(entries.remove(key).is_some())
  }

  fn purge_expired(&self) -> Result<usize> {
    let now = self.clock.now();
    let mut entries = self
      .entries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let before = entries.len();
    entries.retain(|_, e| !e.expiration.is_expired(now));
    Ok(before - entries.len())
  }

  fn entry_count(&self) -> Result<usize> {
    let entries = self
      .entries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(entries.len())
  }
}

/// SQLite-based cache storage implementation.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
  policy: ExpiryPolicy,
  clock: Arc<dyn Clock>,
}

impl SqliteStorage {
  /// Open the cache database at `path`, or at the default location.
  pub fn open(path: Option<&Path>) -> Result<Self> {
    let path = match path {
      Some(p) => p.to_path_buf(),
      None => Self::default_path()?,
    };

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(&path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::from_connection(conn)
  }

  /// Open a private database that lives as long as this value.
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory cache database: {}", e))?;
    Self::from_connection(conn)
  }

  fn from_connection(conn: Connection) -> Result<Self> {
    let storage = Self {
      conn: Mutex::new(conn),
      policy: ExpiryPolicy::default(),
      clock: Arc::new(SystemClock),
    };
    storage.run_migrations()?;

    Ok(storage)
  }

  pub fn with_policy(mut self, policy: ExpiryPolicy) -> Self {
    self.policy = policy;
    self
  }

  pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
    self.clock = clock;
    self
  }

  /// Get the default database path.
  fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("calagg").join("cache.db"))
  }

  /// Run database migrations for cache tables.
  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(())
  }
}

/// Schema for cache tables.
const CACHE_SCHEMA: &str = r#"
-- Serialized cache entries; NULL expires_at never expires
CREATE TABLE IF NOT EXISTS event_cache (
    cache_key TEXT PRIMARY KEY,
    entity_type TEXT NOT NULL,
    data BLOB NOT NULL,
    cached_at TEXT NOT NULL,
    expires_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_event_cache_expires
    ON event_cache(expires_at);
"#;

impl CacheStorage for SqliteStorage {
  fn put<T: Cacheable>(&self, key: &str, value: &T, ttl: Ttl) -> Result<Expiration> {
    let data =
      serde_json::to_vec(value).map_err(|e| eyre!("Failed to serialize cache entry: {}", e))?;
    let now = self.clock.now();
    let expires_at = Expiration::after(now, self.policy.lifetime(ttl))
      .as_datetime()
      .map(format_datetime);

    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    purge_expired_rows(&conn, now)?;

    conn
      .execute(
        "INSERT OR REPLACE INTO event_cache (cache_key, entity_type, data, cached_at, expires_at)
         VALUES (?, ?, ?, ?, ?)",
        params![key, T::entity_type(), data, format_datetime(now), expires_at],
      )
      .map_err(|e| eyre!("Failed to store cache entry: {}", e))?;

    // Read back under the same lock so a concurrent put cannot interleave.
    let stored: Option<String> = conn
      .query_row(
        "SELECT expires_at FROM event_cache WHERE cache_key = ?",
        params![key],
        |row| row.get(0),
      )
      .map_err(|e| eyre!("Failed to read back cache expiration: {}", e))?;

    parse_expiration(stored.as_deref())
  }

  fn get<T: Cacheable>(&self, key: &str) -> Result<Option<CachedEntry<T>>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let row: Option<(Vec<u8>, String, Option<String>)> = conn
      .query_row(
        "SELECT data, cached_at, expires_at FROM event_cache
         WHERE cache_key = ? AND entity_type = ?",
        params![key, T::entity_type()],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
      )
      .optional()
      .map_err(|e| eyre!("Failed to query cache entry: {}", e))?;

    let Some((data, cached_at, expires_at)) = row else {
      return Ok(None);
    };

    let expiration = parse_expiration(expires_at.as_deref())?;
    if expiration.is_expired(self.clock.now()) {
      conn
        .execute("DELETE FROM event_cache WHERE cache_key = ?", params![key])
        .map_err(|e| eyre!("Failed to evict expired cache entry: {}", e))?;
      return Ok(None);
    }

    let value: T = serde_json::from_slice(&data)
      .map_err(|e| eyre!("Failed to deserialize cache entry {}: {}", key, e))?;

    Ok(Some(CachedEntry {
      value,
      cached_at: parse_datetime(&cached_at)?,
      expiration,
    }))
  }

  fn expiration_time(&self, key: &str) -> Result<Option<Expiration>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let row: Option<Option<String>> = conn
      .query_row(
        "SELECT expires_at FROM event_cache WHERE cache_key = ?",
        params![key],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to query cache expiration: {}", e))?;

    row.map(|expires_at| parse_expiration(expires_at.as_deref())).transpose()
  }

  fn remove(&self, key: &str) -> Result<bool> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let removed = conn
      .execute("DELETE FROM event_cache WHERE cache_key = ?", params![key])
      .map_err(|e| eyre!("Failed to remove cache entry: {}", e))?;

    Ok(removed > 0)
  }

  fn purge_expired(&self) -> Result<usize> {
    let now = self.clock.now();
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    purge_expired_rows(&conn, now)
  }

  fn entry_count(&self) -> Result<usize> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let count: i64 = conn
      .query_row("SELECT COUNT(*) FROM event_cache", [], |row| row.get(0))
      .map_err(|e| eyre!("Failed to count cache entries: {}", e))?;

    Ok(usize::try_from(count).unwrap_or(0))
  }
}

/// Timestamps are fixed-width RFC 3339 in UTC, so text order is time order.
fn purge_expired_rows(conn: &Connection, now: DateTime<Utc>) -> Result<usize> {
  conn
    .execute(
      "DELETE FROM event_cache WHERE expires_at IS NOT NULL AND expires_at <= ?",
      params![format_datetime(now)],
    )
    .map_err(|e| eyre!("Failed to purge expired cache entries: {}", e))
}

fn format_datetime(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Parse a stored RFC 3339 timestamp.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}

fn parse_expiration(s: Option<&str>) -> Result<Expiration> {
  match s {
    Some(s) => parse_datetime(s).map(Expiration::At),
    None => Ok(Expiration::Never),
  }
}
