//! Client-side data-freshness cache.
//!
//! This module provides a resource-agnostic time-to-live cache that:
//! - Stores timestamped JSON entries in a durable key-value store
//! - Judges staleness at read time, so each call site picks its own max age
//! - Evicts lazily: an expired read removes the entry, nothing sweeps in the background
//! - Never surfaces storage failures; they degrade to a miss and a diagnostic

mod clock;
mod entry;
mod key;
mod layer;
mod storage;

pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::{CacheEntry, CacheResult, CacheSource, TtlClass};
pub use key::{CacheKey, CacheKeyBuilder, KEY_PREFIX};
pub use layer::FreshnessCache;
pub use storage::{KeyValueStore, MemoryStore, NoopStore, SqliteStore, StorageError};
