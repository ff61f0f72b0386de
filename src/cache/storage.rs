//! Key-value storage trait and its SQLite, in-memory and no-op backends.

use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

/// Failures inside a storage backend. These never leave the cache layer.
#[derive(Debug, Error)]
pub enum StorageError {
  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  #[error("storage lock poisoned")]
  LockPoisoned,

  #[error("could not determine data directory")]
  NoDataDir,
}

/// Durable string-to-string store shared by the whole process.
///
/// Implementations serialize access per key; callers never hold a lock
/// across calls.
pub trait KeyValueStore: Send + Sync {
  fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

  /// Insert or overwrite.
  fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

  /// Delete a key. Deleting a missing key succeeds.
  fn remove(&self, key: &str) -> Result<(), StorageError>;

  /// Delete `key` only while it still holds `expected`. Returns whether a
  /// row was deleted. Backends that can should do this atomically.
  fn remove_if(&self, key: &str, expected: &str) -> Result<bool, StorageError> {
    if self.get(key)?.as_deref() != Some(expected) {
      return Ok(false);
    }
    self.remove(key)?;
    Ok(true)
  }

  /// Every key starting with `prefix`, matched literally.
  fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError>;
}

/// Storage implementation that doesn't keep anything.
/// Used when caching is disabled - every read misses.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopStore;

impl KeyValueStore for NoopStore {
  fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
    Ok(None) // Always miss
  }

  fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
    Ok(()) // Discard
  }

  fn remove(&self, _key: &str) -> Result<(), StorageError> {
    Ok(())
  }

  fn keys_with_prefix(&self, _prefix: &str) -> Result<Vec<String>, StorageError> {
    Ok(Vec::new())
  }
}

/// Process-local store, lost on exit.
#[derive(Debug, Default)]
pub struct MemoryStore {
  entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, String>>, StorageError> {
    self.entries.lock().map_err(|_| StorageError::LockPoisoned)
  }
}

impl KeyValueStore for MemoryStore {
  fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
    Ok(self.lock()?.get(key).cloned())
  }

  fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
    self.lock()?.insert(key.to_string(), value.to_string());
    Ok(())
  }

  fn remove(&self, key: &str) -> Result<(), StorageError> {
    self.lock()?.remove(key);
    Ok(())
  }

  fn remove_if(&self, key: &str, expected: &str) -> Result<bool, StorageError> {
    let mut entries = self.lock()?;
    if entries.get(key).map(String::as_str) != Some(expected) {
      return Ok(false);
    }
    entries.remove(key);
    Ok(true)
  }

  fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
    Ok(
      self
        .lock()?
        .keys()
        .filter(|k| k.starts_with(prefix))
        .cloned()
        .collect(),
    )
  }
}

/// SQLite-backed store; survives restarts.
pub struct SqliteStore {
  conn: Mutex<Connection>,
}

/// Schema for the shared key-value table.
const KV_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS kv_store (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

impl SqliteStore {
  /// Open the store at the default location.
  pub fn open_default() -> Result<Self, StorageError> {
    Self::open(&Self::default_path()?)
  }

  /// Open (creating if needed) a store at `path`.
  pub fn open(path: &Path) -> Result<Self, StorageError> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }

    let conn = Connection::open(path)?;
    let store = Self {
      conn: Mutex::new(conn),
    };
    store.run_migrations()?;

    tracing::debug!(path = %path.display(), "opened cache store");
    Ok(store)
  }

  /// Get the default database path.
  pub fn default_path() -> Result<PathBuf, StorageError> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or(StorageError::NoDataDir)?;

    Ok(data_dir.join("v9s").join("cache.db"))
  }

  fn run_migrations(&self) -> Result<(), StorageError> {
    self.lock()?.execute_batch(KV_SCHEMA)?;
    Ok(())
  }

  fn lock(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
    self.conn.lock().map_err(|_| StorageError::LockPoisoned)
  }
}

impl KeyValueStore for SqliteStore {
  fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
    let conn = self.lock()?;
    let value = conn
      .query_row(
        "SELECT value FROM kv_store WHERE key = ?",
        params![key],
        |row| row.get(0),
      )
      .optional()?;
    Ok(value)
  }

  fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
    self.lock()?.execute(
      "INSERT OR REPLACE INTO kv_store (key, value) VALUES (?, ?)",
      params![key, value],
    )?;
    Ok(())
  }

  fn remove(&self, key: &str) -> Result<(), StorageError> {
    self
      .lock()?
      .execute("DELETE FROM kv_store WHERE key = ?", params![key])?;
    Ok(())
  }

  fn remove_if(&self, key: &str, expected: &str) -> Result<bool, StorageError> {
    let deleted = self.lock()?.execute(
      "DELETE FROM kv_store WHERE key = ? AND value = ?",
      params![key, expected],
    )?;
    Ok(deleted > 0)
  }

  fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
    let conn = self.lock()?;
    // substr instead of LIKE so '%' and '_' in the prefix are not wildcards
    let mut stmt = conn.prepare(
      "SELECT key FROM kv_store WHERE substr(key, 1, length(?1)) = ?1 ORDER BY key",
    )?;
    let keys = stmt
      .query_map(params![prefix], |row| row.get(0))?
      .collect::<Result<Vec<String>, _>>()?;
    Ok(keys)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn temp_store() -> (tempfile::TempDir, SqliteStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::open(&dir.path().join("nested").join("cache.db")).unwrap();
    (dir, store)
  }

  #[test]
  fn test_sqlite_set_get_overwrite() {
    let (_dir, store) = temp_store();
    assert_eq!(store.get("a").unwrap(), None);
    store.set("a", "1").unwrap();
    store.set("a", "2").unwrap();
    assert_eq!(store.get("a").unwrap().as_deref(), Some("2"));
  }

  #[test]
  fn test_sqlite_remove_missing_is_ok() {
    let (_dir, store) = temp_store();
    store.set("keep", "x").unwrap();
    store.remove("missing").unwrap();
    assert_eq!(store.get("keep").unwrap().as_deref(), Some("x"));
  }

  #[test]
  fn test_sqlite_remove_if_compares_value() {
    let (_dir, store) = temp_store();
    store.set("k", "new").unwrap();
    assert!(!store.remove_if("k", "old").unwrap());
    assert_eq!(store.get("k").unwrap().as_deref(), Some("new"));
    assert!(store.remove_if("k", "new").unwrap());
    assert_eq!(store.get("k").unwrap(), None);
    assert!(!store.remove_if("k", "new").unwrap());
  }

  #[test]
  fn test_sqlite_prefix_is_literal() {
    let (_dir, store) = temp_store();
    store.set("v9s_cache:a", "1").unwrap();
    store.set("v9s_cache:b", "2").unwrap();
    store.set("v9sXcacheXc", "3").unwrap();
    store.set("session", "4").unwrap();

    let keys = store.keys_with_prefix("v9s_cache:").unwrap();
    assert_eq!(keys, vec!["v9s_cache:a".to_string(), "v9s_cache:b".to_string()]);
  }

  #[test]
  fn test_sqlite_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.db");
    {
      let store = SqliteStore::open(&path).unwrap();
      store.set("k", "v").unwrap();
    }
    let store = SqliteStore::open(&path).unwrap();
    assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));
  }

  #[test]
  fn test_memory_store_prefix() {
    let store = MemoryStore::new();
    store.set("p:1", "a").unwrap();
    store.set("q:1", "b").unwrap();
    assert_eq!(store.keys_with_prefix("p:").unwrap(), vec!["p:1".to_string()]);
  }

  #[test]
  fn test_memory_store_remove_if() {
    let store = MemoryStore::new();
    store.set("k", "a").unwrap();
    assert!(!store.remove_if("k", "b").unwrap());
    assert!(store.remove_if("k", "a").unwrap());
    assert_eq!(store.get("k").unwrap(), None);
  }

  #[test]
  fn test_noop_store_always_misses() {
    let store = NoopStore;
    store.set("k", "v").unwrap();
    assert_eq!(store.get("k").unwrap(), None);
    assert!(store.keys_with_prefix("").unwrap().is_empty());
  }
}
