//! Persistent key/value backends and the snapshot adapter built on them.
//!
//! Backends only ever see opaque strings. The cache state and the offline
//! queue are each serialized to JSON and stored under their own key.

mod file;
mod memory;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use file::FileStore;
pub use memory::MemoryStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

use crate::error::StorageError;

use std::fmt;
use std::marker::PhantomData;
use std::path::PathBuf;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Key under which a cache stores its state unless configured otherwise.
pub const DEFAULT_STATE_KEY: &str = "skein_cache_state";

/// A string-keyed persistent store.
pub trait KeyValueStore: Send + Sync {
  /// Short backend name used in logs.
  fn name(&self) -> &'static str;

  fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

  fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

  /// Removing a missing key is not an error.
  fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Where a cache keeps its state between runs.
#[derive(Clone, Default)]
pub enum StorageBackend {
  /// Nothing is persisted.
  #[default]
  Memory,
  /// One file per key under a directory.
  Simple { path: PathBuf },
  /// A SQLite database file. Requires the `sqlite` feature.
  Structured { path: PathBuf },
  /// A caller-supplied store, e.g. a `MemoryStore` shared between caches.
  Custom(Arc<dyn KeyValueStore>),
}

impl StorageBackend {
  /// Opens the configured backend, or returns `None` for `Memory`.
  pub fn open(&self) -> Result<Option<Arc<dyn KeyValueStore>>, StorageError> {
    match self {
      StorageBackend::Memory => Ok(None),
      StorageBackend::Simple { path } => Ok(Some(Arc::new(FileStore::open(path)?))),
      #[cfg(feature = "sqlite")]
      StorageBackend::Structured { path } => Ok(Some(Arc::new(SqliteStore::open(path)?))),
      #[cfg(not(feature = "sqlite"))]
      StorageBackend::Structured { path } => Err(StorageError::Unavailable(format!(
        "structured backend at {} needs the `sqlite` feature",
        path.display()
      ))),
      StorageBackend::Custom(store) => Ok(Some(store.clone())),
    }
  }

  pub fn is_persistent(&self) -> bool {
    !matches!(self, StorageBackend::Memory)
  }
}

impl fmt::Debug for StorageBackend {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      StorageBackend::Memory => write!(f, "Memory"),
      StorageBackend::Simple { path } => f.debug_struct("Simple").field("path", path).finish(),
      StorageBackend::Structured { path } => {
        f.debug_struct("Structured").field("path", path).finish()
      }
      StorageBackend::Custom(store) => f.debug_tuple("Custom").field(&store.name()).finish(),
    }
  }
}

/// Binds a store to a single key and moves typed snapshots in and out of it.
pub struct SnapshotStore<T> {
  store: Arc<dyn KeyValueStore>,
  key: String,
  _marker: PhantomData<fn() -> T>,
}

impl<T> SnapshotStore<T> {
  pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
    Self {
      store,
      key: key.into(),
      _marker: PhantomData,
    }
  }

  pub fn key(&self) -> &str {
    &self.key
  }

  pub fn backend_name(&self) -> &'static str {
    self.store.name()
  }

  /// Deletes the stored snapshot.
  pub fn clear(&self) -> Result<(), StorageError> {
    self.store.remove(&self.key)
  }
}

impl<T: DeserializeOwned> SnapshotStore<T> {
  /// Reads the stored snapshot. Missing, unreadable and corrupt data all
  /// come back as `None`, so a bad snapshot only costs the prior state.
  pub fn load(&self) -> Option<T> {
    let raw = match self.store.get(&self.key) {
      Ok(Some(raw)) => raw,
      Ok(None) => return None,
      Err(e) => {
        tracing::warn!(backend = self.store.name(), key = %self.key, error = %e, "Failed to read snapshot; starting empty.");
        return None;
      }
    };
    match serde_json::from_str(&raw) {
      Ok(state) => Some(state),
      Err(e) => {
        tracing::warn!(backend = self.store.name(), key = %self.key, error = %e, "Discarding corrupt snapshot.");
        None
      }
    }
  }
}

impl<T> SnapshotStore<T> {
  /// Serializes and writes `state`. Takes any serializable view so callers
  /// can save borrowed forms of `T`.
  pub fn save<S: Serialize + ?Sized>(&self, state: &S) -> Result<(), StorageError> {
    let raw = serde_json::to_string(state)?;
    self.store.set(&self.key, &raw)
  }
}

impl<T> fmt::Debug for SnapshotStore<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SnapshotStore")
      .field("backend", &self.store.name())
      .field("key", &self.key)
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde::Deserialize;

  #[derive(Debug, PartialEq, Serialize, Deserialize)]
  struct State {
    items: Vec<u32>,
  }

  #[test]
  fn corrupt_snapshot_loads_as_none() {
    let store = Arc::new(MemoryStore::new());
    store.set("state", "{not json").unwrap();
    let snapshots: SnapshotStore<State> = SnapshotStore::new(store, "state");
    assert_eq!(snapshots.load(), None);
  }

  #[test]
  fn save_then_load() {
    let snapshots: SnapshotStore<State> = SnapshotStore::new(Arc::new(MemoryStore::new()), "state");
    assert_eq!(snapshots.load(), None);
    snapshots.save(&State { items: vec![1, 2] }).unwrap();
    assert_eq!(snapshots.load(), Some(State { items: vec![1, 2] }));
    snapshots.clear().unwrap();
    assert_eq!(snapshots.load(), None);
  }

  #[test]
  fn memory_backend_opens_nothing() {
    assert!(StorageBackend::Memory.open().unwrap().is_none());
    assert!(!StorageBackend::Memory.is_persistent());
  }
}
