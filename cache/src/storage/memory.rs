use super::KeyValueStore;
use crate::error::StorageError;

use ahash::{HashMap, HashMapExt};
use parking_lot::Mutex;

/// A process-local store.
///
/// Wrapped in an `Arc` and handed to several caches in turn, it behaves like
/// browser storage across a page reload. An optional quota caps the total
/// number of value bytes held.
#[derive(Debug, Default)]
pub struct MemoryStore {
  values: Mutex<HashMap<String, String>>,
  quota: Option<usize>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self {
      values: Mutex::new(HashMap::new()),
      quota: None,
    }
  }

  pub fn with_quota(bytes: usize) -> Self {
    Self {
      values: Mutex::new(HashMap::new()),
      quota: Some(bytes),
    }
  }

  pub fn len(&self) -> usize {
    self.values.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Total value bytes currently held.
  pub fn used_bytes(&self) -> usize {
    self.values.lock().values().map(String::len).sum()
  }
}

impl KeyValueStore for MemoryStore {
  fn name(&self) -> &'static str {
    "memory"
  }

  fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
    Ok(self.values.lock().get(key).cloned())
  }

  fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
    let mut values = self.values.lock();
    if let Some(limit) = self.quota {
      let others: usize = values
        .iter()
        .filter(|(k, _)| k.as_str() != key)
        .map(|(_, v)| v.len())
        .sum();
      let needed = others + value.len();
      if needed > limit {
        return Err(StorageError::QuotaExceeded {
          key: key.to_string(),
          needed,
          limit,
        });
      }
    }
    values.insert(key.to_string(), value.to_string());
    Ok(())
  }

  fn remove(&self, key: &str) -> Result<(), StorageError> {
    self.values.lock().remove(key);
    Ok(())
  }
}
