use crate::codec::{Codec, GzipCodec, NullCodec};
use crate::config::CacheConfig;
use crate::entry::CacheValue;
use crate::error::BuildError;
use crate::handles::{sweep, Cache};
use crate::listener::{EvictionListener, EvictionReason};
use crate::metrics::Metrics;
use crate::policy::engine::EvictionEngine;
use crate::policy::Strategy;
use crate::shared::{CacheShared, CacheState};
use crate::snapshot::PersistedState;
use crate::storage::{SnapshotStore, StorageBackend};
use crate::store::EntryStore;
use crate::task::janitor::Janitor;
use crate::task::notifier::Notifier;
use crate::time::{system_clock, Clock};

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info};

/// A builder for creating `Cache` instances.
pub struct CacheBuilder<V> {
  config: CacheConfig,
  clock: Option<Arc<dyn Clock>>,
  compressor: Option<Arc<dyn Codec>>,
  encryptor: Option<Arc<dyn Codec>>,
  listener: Option<Arc<dyn EvictionListener>>,
  _value_marker: PhantomData<fn() -> V>,
}

// Manual Debug implementation for CacheBuilder.
impl<V> fmt::Debug for CacheBuilder<V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheBuilder")
      .field("config", &self.config)
      .field("compressor", &self.compressor)
      .field("encryptor", &self.encryptor)
      .field("has_listener", &self.listener.is_some())
      .finish_non_exhaustive()
  }
}

impl<V> Default for CacheBuilder<V> {
  fn default() -> Self {
    Self::from_config(CacheConfig::default())
  }
}

impl<V> CacheBuilder<V> {
  pub fn new() -> Self {
    Self::default()
  }

  /// Starts from an existing configuration, e.g. one parsed from YAML.
  pub fn from_config(config: CacheConfig) -> Self {
    Self {
      config,
      clock: None,
      compressor: None,
      encryptor: None,
      listener: None,
      _value_marker: PhantomData,
    }
  }

  /// Sets the entry count at which inserting a new key evicts.
  pub fn max_size(mut self, max_size: usize) -> Self {
    self.config.max_size = max_size;
    self
  }

  /// Sets the TTL for entries written without one.
  pub fn default_ttl(mut self, ttl: Duration) -> Self {
    self.config.default_ttl = (!ttl.is_zero()).then_some(ttl);
    self
  }

  /// Entries written without a TTL never expire.
  pub fn no_default_ttl(mut self) -> Self {
    self.config.default_ttl = None;
    self
  }

  /// Sets the period of the background expiry sweep.
  pub fn cleanup_interval(mut self, interval: Duration) -> Self {
    self.config.cleanup_interval = Some(interval);
    self
  }

  /// Disables the background sweep. Expired entries are then only removed
  /// when read, or by an explicit `Cache::cleanup`.
  pub fn disable_cleanup(mut self) -> Self {
    self.config.cleanup_interval = None;
    self
  }

  pub fn strategy(mut self, strategy: Strategy) -> Self {
    self.config.strategy = strategy;
    self
  }

  pub fn enable_compression(mut self, enabled: bool) -> Self {
    self.config.enable_compression = enabled;
    self
  }

  pub fn enable_encryption(mut self, enabled: bool) -> Self {
    self.config.enable_encryption = enabled;
    self
  }

  pub fn enable_stats(mut self, enabled: bool) -> Self {
    self.config.enable_stats = enabled;
    self
  }

  pub fn enable_debug(mut self, enabled: bool) -> Self {
    self.config.enable_debug = enabled;
    self
  }

  pub fn storage_backend(mut self, backend: StorageBackend) -> Self {
    self.config.storage_backend = backend;
    self
  }

  /// Sets the key the snapshot is stored under in the backend.
  pub fn storage_key(mut self, key: impl Into<String>) -> Self {
    self.config.storage_key = key.into();
    self
  }

  /// Replaces the system clock, typically with a `ManualClock` in tests.
  pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
    self.clock = Some(clock);
    self
  }

  /// Sets the compression codec. Defaults to gzip.
  pub fn compression_codec<C: Codec + 'static>(mut self, codec: C) -> Self {
    self.compressor = Some(Arc::new(codec));
    self
  }

  /// Sets the encryption codec. Defaults to `NullCodec`, so enabling
  /// encryption without one only marks entries as encrypted.
  pub fn encryption_codec<C: Codec + 'static>(mut self, codec: C) -> Self {
    self.encryptor = Some(Arc::new(codec));
    self
  }

  /// Sets the eviction listener for the cache.
  pub fn eviction_listener<Listener>(mut self, listener: Listener) -> Self
  where
    Listener: EvictionListener + 'static,
  {
    self.listener = Some(Arc::new(listener));
    self
  }

  fn validate(&self) -> Result<(), BuildError> {
    if self.config.max_size == 0 {
      return Err(BuildError::ZeroCapacity);
    }
    if self.config.cleanup_interval.is_some_and(|i| i.is_zero()) {
      return Err(BuildError::ZeroCleanupInterval);
    }
    Ok(())
  }
}

impl<V: CacheValue> CacheBuilder<V> {
  /// Builds the cache, loading any persisted state and starting the
  /// background sweep.
  ///
  /// Fails if the configuration is invalid or the persistent backend cannot
  /// be opened. A missing or corrupt snapshot is not an error; the cache
  /// simply starts empty.
  pub fn build(self) -> Result<Cache<V>, BuildError> {
    self.validate()?;

    let Self {
      config,
      clock,
      compressor,
      encryptor,
      listener,
      ..
    } = self;

    let clock = clock.unwrap_or_else(system_clock);
    let compressor = compressor.unwrap_or_else(|| Arc::new(GzipCodec::default()));
    let encryptor = encryptor.unwrap_or_else(|| Arc::new(NullCodec));

    let persistence = config
      .storage_backend
      .open()?
      .map(|store| SnapshotStore::<PersistedState<V>>::new(store, config.storage_key.clone()));

    let mut store = EntryStore::new();
    let mut engine = EvictionEngine::new(config.strategy);
    if let Some(persistence) = &persistence {
      if let Some(state) = persistence.load() {
        if state.restore_into(&mut store, clock.now_millis()) {
          engine.rebuild(&store.metas());
          info!(
            backend = persistence.backend_name(),
            entries = store.len(),
            "Restored cache state."
          );
        }
      }
    }

    let notifier = listener.map(Notifier::spawn);
    let cleanup_interval = config.cleanup_interval;

    let shared = Arc::new(CacheShared {
      state: Mutex::new(CacheState { store, engine }),
      config,
      metrics: Metrics::new(),
      clock,
      compressor,
      encryptor,
      persistence,
      janitor: Mutex::new(None),
      notifier,
    });

    // Restored entries may exceed a smaller max_size.
    {
      let mut state = shared.state.lock();
      if state.store.len() > shared.config.max_size {
        let strategy = shared.config.strategy;
        while state.store.len() > shared.config.max_size {
          let Some(victim) = state.engine.pop_victim(strategy) else {
            break;
          };
          shared.remove_locked(&mut state, &victim, EvictionReason::Capacity);
        }
        shared.persist_or_log(&state);
      }
    }

    if let Some(interval) = cleanup_interval {
      let weak = Arc::downgrade(&shared);
      let janitor = Janitor::spawn(interval, move || sweep(&weak));
      *shared.janitor.lock() = Some(janitor);
      debug!(interval = ?interval, "Started cache janitor.");
    }

    Ok(Cache { shared })
  }
}
