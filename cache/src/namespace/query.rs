use super::{Namespace, NamespaceStats};
use crate::entry::CacheValue;
use crate::error::Result;
use crate::handles::Cache;
use crate::options::SetOptions;

use std::error::Error as StdError;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

/// API responses cache for half an hour unless told otherwise.
pub const QUERY_TTL: Duration = Duration::from_secs(30 * 60);

/// Caches API query results keyed by endpoint and parameters.
///
/// Keys are `query:{endpoint}` or `query:{endpoint}?{params}` where `params`
/// is the canonical JSON of the parameters, so the same parameters in any
/// order map to the same entry.
#[derive(Debug)]
pub struct QueryCache<V> {
  ns: Namespace<V>,
}

impl<V: CacheValue> QueryCache<V> {
  pub fn new(cache: Cache<V>) -> Self {
    Self::with_ttl(cache, QUERY_TTL)
  }

  pub fn with_ttl(cache: Cache<V>, ttl: Duration) -> Self {
    Self {
      ns: Namespace::new(cache, "query", ttl),
    }
  }

  pub fn namespace(&self) -> &Namespace<V> {
    &self.ns
  }

  /// The cache key for `endpoint` called with `params`.
  pub fn key(&self, endpoint: &str, params: &Value) -> String {
    if is_empty(params) {
      self.ns.key(endpoint)
    } else {
      self.ns.key(&format!("{endpoint}?{}", canonical_json(params)))
    }
  }

  pub fn get(&self, endpoint: &str, params: &Value) -> Option<Arc<V>> {
    self.ns.get(&self.key(endpoint, params))
  }

  pub fn set(&self, endpoint: &str, params: &Value, value: V, tags: &[&str]) -> Result<()> {
    let options = SetOptions::new().tags(tags.iter().copied());
    self.ns.set(self.key(endpoint, params), value, options)
  }

  /// Returns the cached result or calls `fetch`, sharing one call among
  /// concurrent requests for the same endpoint and parameters.
  pub async fn get_or_fetch<F, Fut, E>(
    &self,
    endpoint: &str,
    params: &Value,
    tags: &[&str],
    fetch: F,
  ) -> Result<Arc<V>>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = std::result::Result<V, E>>,
    E: Into<Box<dyn StdError + Send + Sync>>,
  {
    let options = SetOptions::new().tags(tags.iter().copied());
    self
      .ns
      .get_or_fetch(self.key(endpoint, params), options, fetch)
      .await
  }

  /// Removes every cached parameter variant of `endpoint`.
  pub fn invalidate(&self, endpoint: &str) -> usize {
    let bare = self.ns.key(endpoint);
    let with_params = format!("{bare}?");
    self
      .ns
      .invalidate_where(|key| key == bare || key.starts_with(&with_params))
  }

  pub fn invalidate_tags(&self, tags: &[&str]) -> usize {
    self.ns.invalidate_tags(tags)
  }

  pub fn clear(&self) -> usize {
    self.ns.clear()
  }

  pub fn stats(&self) -> NamespaceStats {
    self.ns.stats()
  }
}

fn is_empty(params: &Value) -> bool {
  match params {
    Value::Null => true,
    Value::Object(map) => map.is_empty(),
    _ => false,
  }
}

/// Serializes `value` with object keys sorted at every level.
pub(crate) fn canonical_json(value: &Value) -> String {
  fn sorted(value: &Value) -> Value {
    match value {
      Value::Object(map) => {
        let mut entries: Vec<(&String, &Value)> = map.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        Value::Object(entries.into_iter().map(|(k, v)| (k.clone(), sorted(v))).collect())
      }
      Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
      other => other.clone(),
    }
  }
  sorted(value).to_string()
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn canonical_json_ignores_key_order() {
    let a = json!({"page": 2, "filter": {"b": 1, "a": [ {"y": 1, "x": 2} ]}});
    let b = json!({"filter": {"a": [ {"x": 2, "y": 1} ], "b": 1}, "page": 2});
    assert_eq!(canonical_json(&a), canonical_json(&b));
    assert_eq!(canonical_json(&a), r#"{"filter":{"a":[{"x":2,"y":1}],"b":1},"page":2}"#);
  }
}
