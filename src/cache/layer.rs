//! The freshness cache: timestamped entries with TTL judged at read time.

use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::clock::{Clock, SystemClock};
use super::entry::{CacheEntry, CacheResult, TtlClass};
use super::key::{CacheKey, KEY_PREFIX};
use super::storage::KeyValueStore;
use crate::diagnostics::{default_sink, Diagnostic, DiagnosticSink};

/// Memoization layer over a durable key-value store.
///
/// Every operation is total. Storage and decoding failures are reported to
/// the diagnostic sink and turn into a miss (reads) or a no-op (writes and
/// removals). Expiry is evaluated lazily: a read that finds a stale entry
/// removes it, there is no background sweep.
///
/// Eviction only deletes the exact value that was judged stale, so a writer
/// racing between the read and the delete keeps its fresh entry.
pub struct FreshnessCache<S: KeyValueStore> {
  storage: Arc<S>,
  clock: Arc<dyn Clock>,
  sink: Arc<dyn DiagnosticSink>,
  /// Max age used by [`FreshnessCache::get`]
  default_max_age: Duration,
}

impl<S: KeyValueStore> FreshnessCache<S> {
  /// Create a cache over `storage` using the system clock, the tracing sink
  /// and a MEDIUM default max age.
  pub fn new(storage: S) -> Self {
    Self {
      storage: Arc::new(storage),
      clock: Arc::new(SystemClock),
      sink: default_sink(),
      default_max_age: TtlClass::default().duration(),
    }
  }

  pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
    self.clock = clock;
    self
  }

  pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
    self.sink = sink;
    self
  }

  pub fn with_default_max_age(mut self, max_age: impl Into<Duration>) -> Self {
    self.default_max_age = max_age.into();
    self
  }

  pub fn default_max_age(&self) -> Duration {
    self.default_max_age
  }

  /// Store `value` under `key`, stamped with the current time.
  pub fn set<T: Serialize>(&self, key: &CacheKey, value: &T) {
    self.store_entry(key, value, self.clock.now_millis());
  }

  /// Read `key` using the default max age.
  pub fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
    self.get_within(key, self.default_max_age)
  }

  /// Read `key` if it is at most `max_age` old. A stale entry is removed.
  pub fn get_within<T: DeserializeOwned>(
    &self,
    key: &CacheKey,
    max_age: impl Into<Duration>,
  ) -> Option<T> {
    self.get_entry(key, max_age).map(|entry| entry.value)
  }

  /// Like [`FreshnessCache::get_within`] but keeps the timestamp.
  pub fn get_entry<T: DeserializeOwned>(
    &self,
    key: &CacheKey,
    max_age: impl Into<Duration>,
  ) -> Option<CacheEntry<T>> {
    let max_age = max_age.into();
    let raw = self.load_raw(key)?;
    let entry: CacheEntry<T> = self.decode(key, &raw)?;
    let now = self.clock.now_millis();

    if entry.is_fresh(now, max_age) {
      return Some(entry);
    }

    let age_ms = entry.age_ms(now);
    if self.try_evict(key, &raw) {
      self.sink.emit(Diagnostic::Evicted {
        key: key.to_string(),
        age_ms,
      });
    }
    None
  }

  /// Delete `key`. Removing a missing key is fine.
  pub fn remove(&self, key: &CacheKey) {
    self.try_remove(key);
  }

  /// Delete every entry in the cache namespace and nothing else.
  pub fn clear_all(&self) {
    self.remove_prefixed(KEY_PREFIX);
  }

  /// Delete every entry of one resource kind, across all scopes and pages.
  pub fn invalidate_kind(&self, kind: &str) {
    self.remove_prefixed(&CacheKey::kind_prefix(kind));
  }

  /// Whether `key` exists and is at most `max_age` old. Never evicts.
  pub fn is_valid(&self, key: &CacheKey, max_age: impl Into<Duration>) -> bool {
    let max_age = max_age.into();
    self
      .load::<IgnoredAny>(key)
      .is_some_and(|entry| entry.is_fresh(self.clock.now_millis(), max_age))
  }

  /// Time since `key` was stored, or `None` if there is no entry.
  pub fn age(&self, key: &CacheKey) -> Option<Duration> {
    self
      .load::<IgnoredAny>(key)
      .map(|entry| Duration::from_millis(entry.age_ms(self.clock.now_millis())))
  }

  /// Read-through fetch.
  ///
  /// A fresh entry is returned as-is. Otherwise `fetcher` runs; its result is
  /// stored and returned, and its error is handed back untouched. Concurrent
  /// misses on the same key each run their own fetcher.
  pub async fn fetch_with<T, E, F, Fut>(
    &self,
    key: &CacheKey,
    max_age: impl Into<Duration>,
    fetcher: F,
  ) -> Result<CacheResult<T>, E>
  where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
  {
    if let Some(entry) = self.get_entry::<T>(key, max_age) {
      return Ok(CacheResult::from_cache(entry));
    }
    self.refresh_with(key, fetcher).await
  }

  /// Always run `fetcher` and overwrite the entry on success.
  pub async fn refresh_with<T, E, F, Fut>(
    &self,
    key: &CacheKey,
    fetcher: F,
  ) -> Result<CacheResult<T>, E>
  where
    T: Serialize,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
  {
    let data = fetcher().await?;
    let stored_at = self.clock.now_millis();
    self.store_entry(key, &data, stored_at);
    Ok(CacheResult::from_network(data, stored_at))
  }

  fn store_entry<T: Serialize>(&self, key: &CacheKey, value: &T, stored_at: i64) {
    let encoded = match serde_json::to_string(&CacheEntry::new(value, stored_at)) {
      Ok(encoded) => encoded,
      Err(e) => {
        self.sink.emit(Diagnostic::StoreFailed {
          key: key.to_string(),
          error: e.to_string(),
        });
        return;
      }
    };

    if let Err(e) = self.storage.set(key.as_str(), &encoded) {
      self.sink.emit(Diagnostic::StoreFailed {
        key: key.to_string(),
        error: e.to_string(),
      });
    }
  }

  /// Fetch and decode an entry without judging its age.
  fn load<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<CacheEntry<T>> {
    let raw = self.load_raw(key)?;
    self.decode(key, &raw)
  }

  fn load_raw(&self, key: &CacheKey) -> Option<String> {
    match self.storage.get(key.as_str()) {
      Ok(raw) => raw,
      Err(e) => {
        self.sink.emit(Diagnostic::ReadFailed {
          key: key.to_string(),
          error: e.to_string(),
        });
        None
      }
    }
  }

  fn decode<T: DeserializeOwned>(&self, key: &CacheKey, raw: &str) -> Option<CacheEntry<T>> {
    match serde_json::from_str(raw) {
      Ok(entry) => Some(entry),
      Err(e) => {
        self.sink.emit(Diagnostic::CorruptEntry {
          key: key.to_string(),
          error: e.to_string(),
        });
        None
      }
    }
  }

  /// Remove `key` only if it still holds `stale`. True when it was removed.
  fn try_evict(&self, key: &CacheKey, stale: &str) -> bool {
    match self.storage.remove_if(key.as_str(), stale) {
      Ok(removed) => removed,
      Err(e) => {
        self.sink.emit(Diagnostic::RemoveFailed {
          key: key.to_string(),
          error: e.to_string(),
        });
        false
      }
    }
  }

  fn try_remove(&self, key: &CacheKey) -> bool {
    match self.storage.remove(key.as_str()) {
      Ok(()) => true,
      Err(e) => {
        self.sink.emit(Diagnostic::RemoveFailed {
          key: key.to_string(),
          error: e.to_string(),
        });
        false
      }
    }
  }

  fn remove_prefixed(&self, prefix: &str) {
    // Never let a caller-supplied prefix escape the namespace.
    if !prefix.starts_with(KEY_PREFIX) {
      return;
    }

    let keys = match self.storage.keys_with_prefix(prefix) {
      Ok(keys) => keys,
      Err(e) => {
        self.sink.emit(Diagnostic::ClearFailed {
          prefix: prefix.to_string(),
          error: e.to_string(),
        });
        return;
      }
    };

    for key in keys {
      if let Err(e) = self.storage.remove(&key) {
        self.sink.emit(Diagnostic::RemoveFailed {
          key,
          error: e.to_string(),
        });
      }
    }
  }
}

impl<S: KeyValueStore> Clone for FreshnessCache<S> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      clock: Arc::clone(&self.clock),
      sink: Arc::clone(&self.sink),
      default_max_age: self.default_max_age,
    }
  }
}
