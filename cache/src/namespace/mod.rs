//! Key-prefixed views over a shared `Cache`, with deduplicated loading.
//!
//! A [`Namespace`] owns a key prefix, a default TTL and a tag it stamps on
//! every entry it writes. Concurrent `get_or_fetch` calls for the same key
//! share a single fetch. The query, image and asset caches are thin layers
//! that derive keys and add domain statistics.

mod asset;
mod image;
mod query;

pub use asset::{AssetCache, AssetCacheStats, CachedAsset};
pub use image::{CachedImage, ImageCache, ImageCacheStats};
pub use query::QueryCache;

use crate::entry::{CacheEntry, CacheValue};
use crate::error::{CacheError, FetchError, Result};
use crate::handles::Cache;
use crate::loader::{LoadError, LoadFuture};
use crate::options::{SetOptions, TtlChoice};

use std::error::Error as StdError;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ahash::{HashMap, HashMapExt};
use parking_lot::Mutex;
use tracing::debug;

type Pending<V> = Mutex<HashMap<String, Arc<LoadFuture<V>>>>;

/// Statistics scoped to one namespace.
#[derive(Debug, Clone, PartialEq)]
pub struct NamespaceStats {
  pub hits: u64,
  pub misses: u64,
  pub hit_rate: f64,
  /// Entries under this namespace's prefix, expired or not.
  pub entries: usize,
  /// Serialized size of those entries, in bytes.
  pub size: u64,
  /// Fetches currently running.
  pub in_flight: usize,
}

/// A prefix-scoped view of a cache.
pub struct Namespace<V> {
  cache: Cache<V>,
  prefix: String,
  tag: String,
  default_ttl: Duration,
  pending: Pending<V>,
  hits: AtomicU64,
  misses: AtomicU64,
}

impl<V> std::fmt::Debug for Namespace<V> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Namespace")
      .field("prefix", &self.prefix)
      .field("default_ttl", &self.default_ttl)
      .finish_non_exhaustive()
  }
}

impl<V: CacheValue> Namespace<V> {
  /// Keys are `{name}:{id}` and every entry is tagged `ns:{name}`.
  pub fn new(cache: Cache<V>, name: &str, default_ttl: Duration) -> Self {
    Self {
      cache,
      prefix: format!("{name}:"),
      tag: format!("ns:{name}"),
      default_ttl,
      pending: Mutex::new(HashMap::new()),
      hits: AtomicU64::new(0),
      misses: AtomicU64::new(0),
    }
  }

  pub fn cache(&self) -> &Cache<V> {
    &self.cache
  }

  pub fn prefix(&self) -> &str {
    &self.prefix
  }

  /// The tag stamped on every entry this namespace writes.
  pub fn tag(&self) -> &str {
    &self.tag
  }

  pub fn default_ttl(&self) -> Duration {
    self.default_ttl
  }

  /// The full cache key for `id`.
  pub fn key(&self, id: &str) -> String {
    format!("{}{}", self.prefix, id)
  }

  /// Reads a full key, counting the lookup against this namespace.
  pub fn get(&self, key: &str) -> Option<Arc<V>> {
    let value = self.cache.get(key);
    let counter = if value.is_some() { &self.hits } else { &self.misses };
    counter.fetch_add(1, Ordering::Relaxed);
    value
  }

  /// Writes a full key with this namespace's TTL and tag applied.
  pub fn set(&self, key: String, value: V, options: SetOptions) -> Result<()> {
    self.cache.insert_arc(key, Arc::new(value), self.scoped(options))
  }

  fn scoped(&self, mut options: SetOptions) -> SetOptions {
    if options.ttl == TtlChoice::Default {
      options.ttl = TtlChoice::For(self.default_ttl);
    }
    options.tags.insert(self.tag.clone());
    options
  }

  /// Returns the cached value for `key`, or runs `fetch`, caches its result
  /// and returns it.
  ///
  /// While a fetch for `key` is running, further callers wait for it instead
  /// of fetching again, and all of them receive its result. A failed fetch
  /// caches nothing and every waiter gets the same error. A fetched value
  /// that overruns the storage quota stays cached in memory, but every caller
  /// gets the quota error. If the caller driving the fetch is dropped first,
  /// waiters get a cancellation error.
  pub async fn get_or_fetch<F, Fut, E>(&self, key: String, options: SetOptions, fetch: F) -> Result<Arc<V>>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = std::result::Result<V, E>>,
    E: Into<Box<dyn StdError + Send + Sync>>,
  {
    if let Some(value) = self.get(&key) {
      return Ok(value);
    }

    let (load, leader) = {
      let mut pending = self.pending.lock();
      match pending.get(&key) {
        Some(load) => (load.clone(), false),
        None => {
          // The previous leader stores its value before leaving `pending`.
          if let Some(value) = self.cache.get_uncounted(&key) {
            return Ok(value);
          }
          let load = Arc::new(LoadFuture::new());
          pending.insert(key.clone(), load.clone());
          (load, true)
        }
      }
    };

    if !leader {
      if self.cache.config().enable_debug {
        debug!(key = %key, "joining in-flight fetch");
      }
      return (&*load).await.map_err(CacheError::from);
    }

    let in_flight = InFlight {
      pending: &self.pending,
      key: &key,
      load,
    };

    match fetch().await {
      Ok(value) => {
        let value = Arc::new(value);
        let stored = self
          .cache
          .insert_arc(key.clone(), value.clone(), self.scoped(options));
        match &stored {
          Ok(()) => in_flight.load.complete(Ok(value.clone())),
          Err(e) => in_flight.load.complete(Err(LoadError::from_store(e))),
        }
        drop(in_flight);
        stored.map(|()| value)
      }
      Err(e) => {
        let err = FetchError::new(e);
        in_flight.load.complete(Err(err.clone().into()));
        Err(CacheError::Fetch(err))
      }
    }
  }

  /// Removes this namespace's entries whose key matches `predicate`.
  pub fn invalidate_where<P>(&self, mut predicate: P) -> usize
  where
    P: FnMut(&str) -> bool,
  {
    self
      .cache
      .remove_where(|entry| entry.key.starts_with(&self.prefix) && predicate(&entry.key))
  }

  /// Removes this namespace's entries carrying any of `tags`.
  pub fn invalidate_tags<T: AsRef<str>>(&self, tags: &[T]) -> usize {
    self.cache.remove_where(|entry| {
      entry.key.starts_with(&self.prefix) && tags.iter().any(|tag| entry.has_tag(tag.as_ref()))
    })
  }

  /// Removes every entry under this namespace's prefix and resets its
  /// counters. Other namespaces sharing the cache are untouched.
  pub fn clear(&self) -> usize {
    self.hits.store(0, Ordering::Relaxed);
    self.misses.store(0, Ordering::Relaxed);
    self.invalidate_where(|_| true)
  }

  pub fn stats(&self) -> NamespaceStats {
    let infos = self.cache.infos_where(|entry| entry.key.starts_with(&self.prefix));
    let hits = self.hits.load(Ordering::Relaxed);
    let misses = self.misses.load(Ordering::Relaxed);
    let total = hits + misses;
    NamespaceStats {
      hits,
      misses,
      hit_rate: if total == 0 { 0.0 } else { hits as f64 / total as f64 },
      entries: infos.len(),
      size: infos.iter().map(|i| i.metadata.original_size as u64).sum(),
      in_flight: self.pending.lock().len(),
    }
  }

  /// Decoded live entries under this prefix.
  pub(crate) fn values(&self) -> Vec<(String, Arc<V>)> {
    let now = self.cache.clock().now_millis();
    self
      .cache
      .collect_where(|entry: &CacheEntry<V>| entry.key.starts_with(&self.prefix) && !entry.is_expired(now))
  }
}

/// Owned by the caller driving a fetch. Leaves the pending table on drop and
/// releases waiters if the fetch never completed.
struct InFlight<'a, V> {
  pending: &'a Pending<V>,
  key: &'a str,
  load: Arc<LoadFuture<V>>,
}

impl<V> Drop for InFlight<'_, V> {
  fn drop(&mut self) {
    if !self.load.is_complete() {
      self.load.complete(Err(FetchError::cancelled().into()));
    }
    let mut pending = self.pending.lock();
    if pending
      .get(self.key)
      .is_some_and(|load| Arc::ptr_eq(load, &self.load))
    {
      pending.remove(self.key);
    }
  }
}
