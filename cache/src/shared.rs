use crate::codec::Codec;
use crate::config::CacheConfig;
use crate::entry::{CacheEntry, CacheValue, EntryData, EntryMetadata};
use crate::error::{CodecError, StorageError};
use crate::listener::EvictionReason;
use crate::metrics::Metrics;
use crate::policy::engine::EvictionEngine;
use crate::policy::Strategy;
use crate::snapshot::{PersistedState, PersistedStateRef};
use crate::storage::SnapshotStore;
use crate::store::EntryStore;
use crate::task::janitor::Janitor;
use crate::task::notifier::Notifier;
use crate::time::Clock;

use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

/// Everything guarded by the cache lock. The store and the engine always
/// change together.
pub(crate) struct CacheState<V> {
  pub(crate) store: EntryStore<V>,
  pub(crate) engine: EvictionEngine,
}

/// The internal, thread-safe core of the cache.
pub(crate) struct CacheShared<V> {
  pub(crate) state: Mutex<CacheState<V>>,
  pub(crate) config: CacheConfig,
  pub(crate) metrics: Metrics,
  pub(crate) clock: Arc<dyn Clock>,
  pub(crate) compressor: Arc<dyn Codec>,
  pub(crate) encryptor: Arc<dyn Codec>,
  pub(crate) persistence: Option<SnapshotStore<PersistedState<V>>>,
  pub(crate) janitor: Mutex<Option<Janitor>>,
  pub(crate) notifier: Option<Notifier>,
}

impl<V> fmt::Debug for CacheShared<V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheShared")
      .field("max_size", &self.config.max_size)
      .field("strategy", &self.config.strategy)
      .field("default_ttl", &self.config.default_ttl)
      .field("persistence", &self.persistence)
      .finish_non_exhaustive()
  }
}

impl<V> Drop for CacheShared<V> {
  fn drop(&mut self) {
    if let Some(janitor) = self.janitor.get_mut().take() {
      janitor.stop();
    }
    if let Some(notifier) = self.notifier.take() {
      notifier.stop();
    }
  }
}

impl<V> CacheShared<V> {
  #[inline]
  pub(crate) fn now(&self) -> u64 {
    self.clock.now_millis()
  }

  #[inline]
  pub(crate) fn debug_enabled(&self) -> bool {
    self.config.enable_debug
  }

  /// Removes `key` from the store and every policy, counting and reporting
  /// the removal according to `reason`.
  pub(crate) fn remove_locked(
    &self,
    state: &mut CacheState<V>,
    key: &str,
    reason: EvictionReason,
  ) -> Option<CacheEntry<V>> {
    let entry = state.store.remove(key)?;
    state.engine.on_remove(key);

    match reason {
      EvictionReason::Capacity => {
        self.metrics.evictions.fetch_add(1, Ordering::Relaxed);
      }
      EvictionReason::Expired => {
        self.metrics.expirations.fetch_add(1, Ordering::Relaxed);
      }
      EvictionReason::Invalidated => {}
    }
    if self.debug_enabled() {
      debug!(key, reason = %reason, "removed cache entry");
    }
    if let Some(notifier) = &self.notifier {
      notifier.notify(entry.info(), reason);
    }
    Some(entry)
  }

  /// Makes room for a new key: evicts the head candidate of `strategy`
  /// until the store is strictly below `max_size`.
  pub(crate) fn evict_for_insert(&self, state: &mut CacheState<V>, strategy: Strategy) {
    if state.store.len() < self.config.max_size {
      return;
    }
    {
      let CacheState { store, engine } = &mut *state;
      engine.track(strategy, || store.metas());
    }
    while state.store.len() >= self.config.max_size {
      let Some(victim) = state.engine.pop_victim(strategy) else {
        warn!(strategy = %strategy, len = state.store.len(), "Eviction policy ran out of candidates.");
        break;
      };
      self.remove_locked(state, &victim, EvictionReason::Capacity);
    }
  }

  /// Writes the current state to the persistent backend, if there is one.
  pub(crate) fn persist_locked(&self, state: &CacheState<V>) -> Result<(), StorageError>
  where
    V: CacheValue,
  {
    let Some(persistence) = &self.persistence else {
      return Ok(());
    };
    persistence.save(&PersistedStateRef::capture(&state.store, self.now()))
  }

  /// Like `persist_locked`, but a failure only skips this cycle.
  pub(crate) fn persist_or_log(&self, state: &CacheState<V>)
  where
    V: CacheValue,
  {
    if let Err(e) = self.persist_locked(state) {
      warn!(error = %e, "Failed to persist cache state; skipping this cycle.");
    }
  }
}

impl<V: CacheValue> CacheShared<V> {
  /// Builds the stored form of `value`. A failing codec is skipped and the
  /// value is kept in its previous form.
  pub(crate) fn encode(
    &self,
    key: &str,
    value: Arc<V>,
    tags: BTreeSet<String>,
    compress: bool,
    encrypt: bool,
  ) -> (EntryData<V>, EntryMetadata) {
    let mut metadata = EntryMetadata {
      tags,
      ..Default::default()
    };

    let serialized = match serde_json::to_vec(&*value) {
      Ok(bytes) => bytes,
      Err(e) => {
        warn!(key, error = %e, "Failed to serialize value; storing it untransformed.");
        return (EntryData::Plain(value), metadata);
      }
    };
    metadata.original_size = serialized.len();

    if !compress && !encrypt {
      return (EntryData::Plain(value), metadata);
    }

    let mut bytes = serialized;
    if compress {
      match self.compressor.encode(&bytes) {
        Ok(packed) => {
          bytes = packed;
          metadata.compressed = true;
        }
        Err(e) => warn!(key, error = %e, "Compression failed; storing uncompressed."),
      }
    }
    if encrypt {
      match self.encryptor.encode(&bytes) {
        Ok(sealed) => {
          bytes = sealed;
          metadata.encrypted = true;
        }
        Err(e) => warn!(key, error = %e, "Encryption failed; storing unencrypted."),
      }
    }

    if metadata.compressed || metadata.encrypted {
      (EntryData::Encoded(bytes), metadata)
    } else {
      (EntryData::Plain(value), metadata)
    }
  }

  /// Recovers the value of a stored entry by undoing its transforms.
  pub(crate) fn decode(&self, entry: &CacheEntry<V>) -> Result<Arc<V>, CodecError> {
    let bytes = match &entry.data {
      EntryData::Plain(value) => return Ok(value.clone()),
      EntryData::Encoded(bytes) => bytes,
    };

    let mut bytes = std::borrow::Cow::Borrowed(bytes.as_slice());
    if entry.metadata.encrypted {
      bytes = std::borrow::Cow::Owned(self.encryptor.decode(&bytes)?);
    }
    if entry.metadata.compressed {
      bytes = std::borrow::Cow::Owned(self.compressor.decode(&bytes)?);
    }
    serde_json::from_slice(&bytes)
      .map(Arc::new)
      .map_err(|e| CodecError::new("json", e.to_string()))
  }
}
