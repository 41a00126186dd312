use crate::entry::CacheEntry;
use crate::store::EntryStore;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Bumped whenever the persisted layout changes. Snapshots written under a
/// different version are discarded on load.
pub(crate) const SNAPSHOT_VERSION: u32 = 2;

/// The persisted form of a cache: its entries in insertion order plus both
/// access maps.
#[derive(Debug, Deserialize)]
pub(crate) struct PersistedState<V> {
  pub(crate) version: u32,
  #[allow(dead_code)]
  pub(crate) saved_at: u64,
  pub(crate) entries: Vec<CacheEntry<V>>,
  pub(crate) last_access: HashMap<String, u64>,
  pub(crate) access_count: HashMap<String, u64>,
}

/// A borrowed view of a store, written without cloning any value.
#[derive(Debug, Serialize)]
pub(crate) struct PersistedStateRef<'a, V> {
  version: u32,
  saved_at: u64,
  entries: Vec<&'a CacheEntry<V>>,
  last_access: &'a ahash::HashMap<String, u64>,
  access_count: &'a ahash::HashMap<String, u64>,
}

impl<'a, V> PersistedStateRef<'a, V> {
  /// Captures `store` as of `now`. Entries already expired are left out;
  /// their access records are filtered again on load.
  pub(crate) fn capture(store: &'a EntryStore<V>, now: u64) -> Self {
    Self {
      version: SNAPSHOT_VERSION,
      saved_at: now,
      entries: store
        .ordered()
        .into_iter()
        .filter(|entry| !entry.is_expired(now))
        .collect(),
      last_access: store.last_access(),
      access_count: store.access_count(),
    }
  }
}

impl<V> PersistedState<V> {
  /// Loads this state into `store`, dropping entries that expired while
  /// persisted. Returns `false` for an incompatible version.
  pub(crate) fn restore_into(self, store: &mut EntryStore<V>, now: u64) -> bool {
    if self.version != SNAPSHOT_VERSION {
      tracing::warn!(
        found = self.version,
        expected = SNAPSHOT_VERSION,
        "Ignoring snapshot written by an incompatible version."
      );
      return false;
    }
    let live: Vec<CacheEntry<V>> = self
      .entries
      .into_iter()
      .filter(|entry| !entry.is_expired(now))
      .collect();
    store.restore(live, self.last_access, self.access_count);
    true
  }
}
