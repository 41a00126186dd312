use crate::builder::CacheBuilder;
use crate::config::CacheConfig;
use crate::entry::{CacheEntry, CacheValue, EntryInfo};
use crate::error::{Result, StorageError};
use crate::listener::EvictionReason;
use crate::metrics::CacheStats;
use crate::options::{GetOptions, SetOptions, TtlChoice};
use crate::shared::CacheShared;
use crate::time::{duration_to_millis, Clock};

use std::fmt;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

/// A thread-safe, string-keyed cache.
///
/// `Cache` is a cheap handle: clones share the same entries, statistics and
/// background threads. Values are handed out as `Arc<V>`.
pub struct Cache<V> {
  pub(crate) shared: Arc<CacheShared<V>>,
}

impl<V> fmt::Debug for Cache<V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Cache").field("shared", &self.shared).finish()
  }
}

impl<V> Clone for Cache<V> {
  fn clone(&self) -> Self {
    Self {
      shared: self.shared.clone(),
    }
  }
}

enum Lookup<V> {
  Hit(Arc<V>),
  Miss,
}

impl<V: CacheValue> Cache<V> {
  /// Creates a builder with the default configuration.
  pub fn builder() -> CacheBuilder<V> {
    CacheBuilder::new()
  }

  /// Stores `value` under `key` with the cache's default TTL and no tags.
  ///
  /// See [`Cache::set_with`].
  pub fn set(&self, key: impl Into<String>, value: V) -> Result<()> {
    self.set_with(key, value, SetOptions::default())
  }

  /// Stores `value` under `key`, replacing any existing entry.
  ///
  /// Inserting a new key into a full cache first evicts by the configured
  /// strategy, or by `options.strategy` if set. Overwrites never evict.
  ///
  /// The in-memory write always succeeds. The only error is
  /// [`StorageError::QuotaExceeded`] from a persistent backend, in which case
  /// the value is cached but not persisted.
  pub fn set_with(&self, key: impl Into<String>, value: V, options: SetOptions) -> Result<()> {
    self.insert_arc(key.into(), Arc::new(value), options)
  }

  pub(crate) fn insert_arc(&self, key: String, value: Arc<V>, options: SetOptions) -> Result<()> {
    let shared = &self.shared;
    let config = &shared.config;

    let ttl = match options.ttl {
      TtlChoice::Default => config.default_ttl,
      TtlChoice::Never => None,
      TtlChoice::For(ttl) => Some(ttl),
    }
    .map(duration_to_millis)
    .filter(|ttl| *ttl > 0);
    let compress = options.compress.unwrap_or(config.enable_compression);
    let encrypt = options.encrypt.unwrap_or(config.enable_encryption);
    let strategy = options.strategy.unwrap_or(config.strategy);

    let (data, metadata) = shared.encode(&key, value, options.tags, compress, encrypt);

    let mut state = shared.state.lock();
    let now = shared.now();
    if !state.store.contains(&key) {
      shared.evict_for_insert(&mut state, strategy);
    }

    let entry = CacheEntry {
      key: key.clone(),
      data,
      timestamp: now,
      ttl,
      metadata,
    };
    let inserted = state.store.insert(entry, now);
    if inserted.previous.is_some() {
      state.engine.on_update(&key, &inserted.meta);
    } else {
      state.engine.on_insert(&key, &inserted.meta);
    }
    if shared.debug_enabled() {
      debug!(key = %key, ttl_ms = ?ttl, replaced = inserted.previous.is_some(), "cache set");
    }

    match shared.persist_locked(&state) {
      Err(e) if e.is_quota_exceeded() => {
        warn!(key = %key, error = %e, "Storage quota exceeded; entry cached in memory only.");
        Err(e.into())
      }
      Err(e) => {
        warn!(error = %e, "Failed to persist cache state; skipping this cycle.");
        Ok(())
      }
      Ok(()) => Ok(()),
    }
  }

  /// Returns the value for `key` if present and not expired.
  ///
  /// An expired entry is removed by the read. Every call counts as a hit or
  /// a miss in [`Cache::stats`].
  pub fn get(&self, key: &str) -> Option<Arc<V>> {
    self.get_with(key, GetOptions::default())
  }

  pub fn get_with(&self, key: &str, options: GetOptions) -> Option<Arc<V>> {
    let started = Instant::now();
    let result = self.lookup(key, options.refresh_access);
    let hit = matches!(result, Lookup::Hit(_));
    if self.shared.config.enable_stats {
      self.shared.metrics.record_lookup(hit, started.elapsed());
    }
    if self.shared.debug_enabled() {
      debug!(key, hit, "cache get");
    }
    match result {
      Lookup::Hit(value) => Some(value),
      Lookup::Miss => None,
    }
  }

  /// A read that leaves statistics untouched.
  pub(crate) fn get_uncounted(&self, key: &str) -> Option<Arc<V>> {
    match self.lookup(key, false) {
      Lookup::Hit(value) => Some(value),
      Lookup::Miss => None,
    }
  }

  fn lookup(&self, key: &str, refresh_access: bool) -> Lookup<V> {
    let shared = &self.shared;
    let mut state = shared.state.lock();
    let now = shared.now();

    let decoded = match state.store.get(key) {
      None => return Lookup::Miss,
      Some(entry) if entry.is_expired(now) => None,
      Some(entry) => Some(shared.decode(entry)),
    };

    match decoded {
      None => {
        shared.remove_locked(&mut state, key, EvictionReason::Expired);
        shared.persist_or_log(&state);
        Lookup::Miss
      }
      Some(Err(e)) => {
        warn!(key, error = %e, "Dropping entry that could not be decoded.");
        shared.remove_locked(&mut state, key, EvictionReason::Invalidated);
        shared.persist_or_log(&state);
        Lookup::Miss
      }
      Some(Ok(value)) => {
        if refresh_access {
          if let Some(meta) = state.store.record_access(key, now) {
            state.engine.on_access(key, &meta);
          }
        }
        Lookup::Hit(value)
      }
    }
  }

  /// Returns `true` if `key` holds an unexpired entry. Touches neither the
  /// statistics nor the access metadata, and leaves expired entries for the
  /// next read or sweep.
  pub fn has(&self, key: &str) -> bool {
    let state = self.shared.state.lock();
    let now = self.shared.now();
    state
      .store
      .get(key)
      .map_or(false, |entry| !entry.is_expired(now))
  }

  /// Removes `key`. Returns whether anything was removed.
  pub fn delete(&self, key: &str) -> bool {
    let shared = &self.shared;
    let mut state = shared.state.lock();
    let removed = shared
      .remove_locked(&mut state, key, EvictionReason::Invalidated)
      .is_some();
    if removed {
      shared.persist_or_log(&state);
    }
    removed
  }

  /// Removes every entry, zeroes the statistics and deletes the persisted
  /// snapshot.
  pub fn clear(&self) {
    let shared = &self.shared;
    let mut state = shared.state.lock();
    if let Some(notifier) = &shared.notifier {
      for entry in state.store.ordered() {
        notifier.notify(entry.info(), EvictionReason::Invalidated);
      }
    }
    state.store.clear();
    state.engine.clear();
    shared.metrics.reset();

    if let Some(persistence) = &shared.persistence {
      if let Err(e) = persistence.clear() {
        warn!(error = %e, "Failed to clear persisted cache state.");
      }
    }
    if shared.debug_enabled() {
      debug!("cache cleared");
    }
  }

  /// Keys in insertion order, including entries that have expired but not
  /// yet been purged.
  pub fn keys(&self) -> Vec<String> {
    let state = self.shared.state.lock();
    state.store.ordered().into_iter().map(|e| e.key.clone()).collect()
  }

  /// Values in insertion order. Entries that fail to decode are skipped.
  pub fn values(&self) -> Vec<Arc<V>> {
    self.entries().into_iter().map(|(_, value)| value).collect()
  }

  /// Key/value pairs in insertion order. Entries that fail to decode are
  /// skipped.
  pub fn entries(&self) -> Vec<(String, Arc<V>)> {
    self.collect_where(|_| true)
  }

  /// Live entries carrying `tag`, decoded.
  pub fn get_by_tag(&self, tag: &str) -> Vec<(String, Arc<V>)> {
    let now = self.shared.now();
    self.collect_where(|entry| entry.has_tag(tag) && !entry.is_expired(now))
  }

  /// Removes every entry carrying `tag`. Returns how many were removed.
  pub fn delete_by_tag(&self, tag: &str) -> usize {
    self.remove_where(|entry| entry.has_tag(tag))
  }

  pub fn len(&self) -> usize {
    self.shared.state.lock().store.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Bookkeeping for `key` without reading its value or touching access
  /// metadata.
  pub fn entry_info(&self, key: &str) -> Option<EntryInfo> {
    self.shared.state.lock().store.get(key).map(CacheEntry::info)
  }

  pub fn stats(&self) -> CacheStats {
    let state = self.shared.state.lock();
    self
      .shared
      .metrics
      .snapshot(state.store.len(), state.store.total_size())
  }

  /// Purges every expired entry in one sweep and persists the result.
  /// Returns the number of entries purged.
  ///
  /// The background janitor calls this every `cleanup_interval`.
  pub fn cleanup(&self) -> usize {
    let shared = &self.shared;
    let mut state = shared.state.lock();
    let now = shared.now();

    let expired = state.store.expired_keys(now);
    for key in &expired {
      shared.remove_locked(&mut state, key, EvictionReason::Expired);
    }
    shared.metrics.last_cleanup.store(now, Ordering::Relaxed);
    shared.persist_or_log(&state);

    if shared.debug_enabled() {
      debug!(purged = expired.len(), remaining = state.store.len(), "cache cleanup");
    }
    expired.len()
  }

  /// Writes the current state to the persistent backend now.
  pub fn flush(&self) -> std::result::Result<(), StorageError> {
    let state = self.shared.state.lock();
    self.shared.persist_locked(&state)
  }

  pub fn config(&self) -> &CacheConfig {
    &self.shared.config
  }

  pub fn clock(&self) -> &Arc<dyn Clock> {
    &self.shared.clock
  }

  /// Removes every entry matching `predicate` as an invalidation.
  pub(crate) fn remove_where<F>(&self, mut predicate: F) -> usize
  where
    F: FnMut(&CacheEntry<V>) -> bool,
  {
    let shared = &self.shared;
    let mut state = shared.state.lock();
    let keys: Vec<String> = state
      .store
      .iter()
      .filter(|(_, entry)| predicate(entry))
      .map(|(key, _)| key.clone())
      .collect();
    for key in &keys {
      shared.remove_locked(&mut state, key, EvictionReason::Invalidated);
    }
    if !keys.is_empty() {
      shared.persist_or_log(&state);
    }
    keys.len()
  }

  /// Decoded values of every entry matching `predicate`, in insertion order.
  pub(crate) fn collect_where<F>(&self, mut predicate: F) -> Vec<(String, Arc<V>)>
  where
    F: FnMut(&CacheEntry<V>) -> bool,
  {
    let state = self.shared.state.lock();
    state
      .store
      .ordered()
      .into_iter()
      .filter(|entry| predicate(entry))
      .filter_map(|entry| match self.shared.decode(entry) {
        Ok(value) => Some((entry.key.clone(), value)),
        Err(e) => {
          warn!(key = %entry.key, error = %e, "Skipping entry that could not be decoded.");
          None
        }
      })
      .collect()
  }

  /// Bookkeeping of every entry matching `predicate`.
  pub(crate) fn infos_where<F>(&self, mut predicate: F) -> Vec<EntryInfo>
  where
    F: FnMut(&CacheEntry<V>) -> bool,
  {
    let state = self.shared.state.lock();
    state
      .store
      .ordered()
      .into_iter()
      .filter(|entry| predicate(entry))
      .map(CacheEntry::info)
      .collect()
  }
}

// Gives the janitor a way to run a sweep without holding a strong handle.
pub(crate) fn sweep<V: CacheValue>(shared: &std::sync::Weak<CacheShared<V>>) -> bool {
  match shared.upgrade() {
    Some(shared) => {
      Cache { shared }.cleanup();
      true
    }
    None => false,
  }
}
