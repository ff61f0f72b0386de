//! Stored entry format, TTL classes and read results.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A value together with the moment it was written.
///
/// Entries are never updated in place. A refresh writes a whole new entry
/// with a new `stored_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry<T> {
  pub value: T,
  /// Epoch milliseconds.
  pub stored_at: i64,
}

impl<T> CacheEntry<T> {
  pub fn new(value: T, stored_at: i64) -> Self {
    Self { value, stored_at }
  }

  /// Milliseconds elapsed between `stored_at` and `now`.
  ///
  /// An entry stamped in the future (clock moved backwards) has age zero.
  pub fn age_ms(&self, now: i64) -> u64 {
    u64::try_from(now.saturating_sub(self.stored_at)).unwrap_or(0)
  }

  /// Fresh while `age <= max_age`.
  pub fn is_fresh(&self, now: i64, max_age: Duration) -> bool {
    u128::from(self.age_ms(now)) <= max_age.as_millis()
  }
}

/// Named staleness budgets. Call sites pick one of these instead of writing
/// millisecond literals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TtlClass {
  /// 2 minutes
  Short,
  /// 5 minutes
  #[default]
  Medium,
  /// 15 minutes
  Long,
  /// 60 minutes
  VeryLong,
}

impl TtlClass {
  pub const SHORT: Duration = Duration::from_secs(2 * 60);
  pub const MEDIUM: Duration = Duration::from_secs(5 * 60);
  pub const LONG: Duration = Duration::from_secs(15 * 60);
  pub const VERY_LONG: Duration = Duration::from_secs(60 * 60);

  pub const fn duration(self) -> Duration {
    match self {
      TtlClass::Short => Self::SHORT,
      TtlClass::Medium => Self::MEDIUM,
      TtlClass::Long => Self::LONG,
      TtlClass::VeryLong => Self::VERY_LONG,
    }
  }
}

impl From<TtlClass> for Duration {
  fn from(class: TtlClass) -> Self {
    class.duration()
  }
}

/// Result from a read-through fetch, including where the data came from.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
  /// When the data was stored (epoch milliseconds)
  pub stored_at: i64,
}

impl<T> CacheResult<T> {
  /// Data that was just fetched from the network.
  pub fn from_network(data: T, stored_at: i64) -> Self {
    Self {
      data,
      source: CacheSource::Network,
      stored_at,
    }
  }

  /// Data served from a fresh cache entry.
  pub fn from_cache(entry: CacheEntry<T>) -> Self {
    Self {
      data: entry.value,
      source: CacheSource::Cache,
      stored_at: entry.stored_at,
    }
  }

  pub fn stored_at_utc(&self) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(self.stored_at).single()
  }
}

/// Indicates where returned data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fetched from the API during this call
  Network,
  /// Served from a cache entry still within its max age
  Cache,
}
