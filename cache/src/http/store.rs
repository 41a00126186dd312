use super::types::HttpResponse;
use crate::error::Result;
use crate::handles::Cache;

use ahash::{HashMap, HashMapExt};
use parking_lot::Mutex;

/// Where cached HTTP responses live, keyed by URL.
pub trait ResponseStore: Send + Sync {
  fn lookup(&self, url: &str) -> Option<HttpResponse>;

  fn put(&self, url: &str, response: HttpResponse) -> Result<()>;

  /// Returns whether a response was removed.
  fn delete(&self, url: &str) -> bool;

  fn keys(&self) -> Vec<String>;
}

/// A plain in-process response store.
#[derive(Debug, Default)]
pub struct MemoryResponseStore {
  responses: Mutex<HashMap<String, HttpResponse>>,
}

impl MemoryResponseStore {
  pub fn new() -> Self {
    Self {
      responses: Mutex::new(HashMap::new()),
    }
  }

  pub fn len(&self) -> usize {
    self.responses.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

impl ResponseStore for MemoryResponseStore {
  fn lookup(&self, url: &str) -> Option<HttpResponse> {
    self.responses.lock().get(url).cloned()
  }

  fn put(&self, url: &str, response: HttpResponse) -> Result<()> {
    self.responses.lock().insert(url.to_string(), response);
    Ok(())
  }

  fn delete(&self, url: &str) -> bool {
    self.responses.lock().remove(url).is_some()
  }

  fn keys(&self) -> Vec<String> {
    let mut keys: Vec<String> = self.responses.lock().keys().cloned().collect();
    keys.sort();
    keys
  }
}

/// Backs the HTTP layer with a full `Cache`, gaining its TTL, eviction and
/// persistence.
impl ResponseStore for Cache<HttpResponse> {
  fn lookup(&self, url: &str) -> Option<HttpResponse> {
    self.get_uncounted(url).map(|response| (*response).clone())
  }

  fn put(&self, url: &str, response: HttpResponse) -> Result<()> {
    self.set(url, response)
  }

  fn delete(&self, url: &str) -> bool {
    Cache::delete(self, url)
  }

  fn keys(&self) -> Vec<String> {
    Cache::keys(self)
  }
}
