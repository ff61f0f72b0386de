//! Cache keys inside the reserved storage namespace.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Every key this cache writes starts with this prefix. Anything else in the
/// shared store belongs to someone else.
pub const KEY_PREFIX: &str = "v9s_cache:";

/// Opaque, deterministic storage key: `v9s_cache:<kind>:<sha256 of params>`.
///
/// The parameter hash covers every resolution input (tenant scope, cursor,
/// filters), so the same logical request always maps to the same key and
/// different scopes never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
  pub fn builder(kind: &'static str) -> CacheKeyBuilder {
    CacheKeyBuilder {
      kind,
      params: BTreeMap::new(),
    }
  }

  /// Prefix shared by every key of a resource kind, across all scopes.
  pub fn kind_prefix(kind: &str) -> String {
    format!("{}{}:", KEY_PREFIX, kind)
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for CacheKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

#[derive(Debug, Clone)]
pub struct CacheKeyBuilder {
  kind: &'static str,
  params: BTreeMap<String, String>,
}

impl CacheKeyBuilder {
  pub fn param(mut self, name: &str, value: impl ToString) -> Self {
    self.params.insert(name.to_string(), value.to_string());
    self
  }

  /// Adds the parameter only when a value is present. An absent value and an
  /// empty string hash differently.
  pub fn param_opt<V: ToString>(self, name: &str, value: Option<V>) -> Self {
    match value {
      Some(v) => self.param(name, v),
      None => self,
    }
  }

  pub fn build(self) -> CacheKey {
    // BTreeMap keeps parameter order stable; JSON keeps the encoding unambiguous.
    let canonical = serde_json::to_string(&self.params).unwrap_or_default();

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let digest = hex::encode(hasher.finalize());

    CacheKey(format!("{}{}", CacheKey::kind_prefix(self.kind), digest))
  }
}
