//! Structured diagnostics reported by the cache and the resource client.
//!
//! Both components take an `Arc<dyn DiagnosticSink>` at construction. The
//! default sink forwards everything to `tracing`; tests swap in a
//! [`RecordingSink`] and assert on the events instead of scraping logs.

use std::sync::{Arc, Mutex};

/// Something worth reporting that never reaches the caller as an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
  /// A write to durable storage failed; the next read will miss.
  StoreFailed { key: String, error: String },
  /// Reading from durable storage failed; treated as a miss.
  ReadFailed { key: String, error: String },
  /// A stored payload could not be decoded into the expected shape.
  CorruptEntry { key: String, error: String },
  /// A stale entry was removed after a read judged it expired.
  Evicted { key: String, age_ms: u64 },
  /// Removing an entry failed.
  RemoveFailed { key: String, error: String },
  /// Enumerating the cache namespace failed during a clear.
  ClearFailed { prefix: String, error: String },
  /// An HTTP request completed.
  Request {
    method: String,
    path: String,
    status: u16,
  },
  /// An HTTP request failed before or after reaching the server.
  RequestFailed {
    method: String,
    path: String,
    error: String,
  },
}

/// Destination for [`Diagnostic`] events.
pub trait DiagnosticSink: Send + Sync {
  fn emit(&self, event: Diagnostic);
}

/// Forwards diagnostics to the global `tracing` subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
  fn emit(&self, event: Diagnostic) {
    match event {
      Diagnostic::StoreFailed { key, error } => {
        tracing::warn!(%key, %error, "cache write failed");
      }
      Diagnostic::ReadFailed { key, error } => {
        tracing::warn!(%key, %error, "cache read failed");
      }
      Diagnostic::CorruptEntry { key, error } => {
        tracing::warn!(%key, %error, "cache entry could not be decoded");
      }
      Diagnostic::Evicted { key, age_ms } => {
        tracing::debug!(%key, age_ms, "evicted stale cache entry");
      }
      Diagnostic::RemoveFailed { key, error } => {
        tracing::warn!(%key, %error, "cache removal failed");
      }
      Diagnostic::ClearFailed { prefix, error } => {
        tracing::warn!(%prefix, %error, "cache clear failed");
      }
      Diagnostic::Request {
        method,
        path,
        status,
      } => {
        tracing::debug!(%method, %path, status, "api request");
      }
      Diagnostic::RequestFailed {
        method,
        path,
        error,
      } => {
        tracing::warn!(%method, %path, %error, "api request failed");
      }
    }
  }
}

/// Keeps every emitted event in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
  events: Mutex<Vec<Diagnostic>>,
}

impl RecordingSink {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  /// Snapshot of the events recorded so far.
  pub fn events(&self) -> Vec<Diagnostic> {
    match self.events.lock() {
      Ok(events) => events.clone(),
      Err(poisoned) => poisoned.into_inner().clone(),
    }
  }
}

impl DiagnosticSink for RecordingSink {
  fn emit(&self, event: Diagnostic) {
    match self.events.lock() {
      Ok(mut events) => events.push(event),
      Err(poisoned) => poisoned.into_inner().push(event),
    }
  }
}

/// The sink used when none is supplied.
pub fn default_sink() -> Arc<dyn DiagnosticSink> {
  Arc::new(TracingSink)
}
