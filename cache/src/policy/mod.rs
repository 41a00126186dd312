//! Eviction policies. Each one keeps its own ordering of the cached keys so
//! that choosing a victim never needs a full sort of the access maps.

pub(crate) mod engine;
pub mod fifo;
pub mod lfu;
pub mod lru;
pub(crate) mod lru_list;
pub mod ttl;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Selects which entry is removed when the cache is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
  /// Least recently accessed first.
  #[default]
  #[serde(alias = "recency")]
  Lru,
  /// Least frequently accessed first.
  #[serde(alias = "frequency")]
  Lfu,
  /// First inserted first, regardless of access.
  #[serde(alias = "insertion_order")]
  Fifo,
  /// Shortest remaining lifetime first.
  #[serde(alias = "shortest_lifetime")]
  Ttl,
}

impl Strategy {
  pub(crate) fn new_policy(self) -> Box<dyn EvictionPolicy> {
    match self {
      Strategy::Lru => Box::new(lru::Lru::new()),
      Strategy::Lfu => Box::new(lfu::Lfu::new()),
      Strategy::Fifo => Box::new(fifo::Fifo::new()),
      Strategy::Ttl => Box::new(ttl::Ttl::new()),
    }
  }
}

impl fmt::Display for Strategy {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Strategy::Lru => write!(f, "lru"),
      Strategy::Lfu => write!(f, "lfu"),
      Strategy::Fifo => write!(f, "fifo"),
      Strategy::Ttl => write!(f, "ttl"),
    }
  }
}

/// The access bookkeeping the store holds for one key, handed to policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryMeta {
  /// Insertion sequence number, assigned when the key first enters the store.
  pub seq: u64,
  /// Epoch milliseconds of the last read or write.
  pub last_access: u64,
  /// Number of reads and writes since the key entered the store.
  pub access_count: u64,
  /// Epoch milliseconds at which the entry expires, if it has a TTL.
  pub expires_at: Option<u64>,
}

/// A trait for implementing cache eviction policies.
///
/// The policy tracks the keys currently in the store and yields them in
/// victim order. It is only ever called with the store lock held.
pub trait EvictionPolicy: Send + Sync + fmt::Debug {
  /// A key entered the store.
  fn on_insert(&mut self, key: &str, meta: &EntryMeta);

  /// An existing key was overwritten.
  fn on_update(&mut self, key: &str, meta: &EntryMeta);

  /// An existing key was read.
  fn on_access(&mut self, key: &str, meta: &EntryMeta);

  /// A key left the store for any reason.
  fn on_remove(&mut self, key: &str);

  /// Removes and returns the next key to evict.
  fn pop_victim(&mut self) -> Option<String>;

  /// Number of keys tracked.
  fn len(&self) -> usize;

  fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Clears all state from the policy.
  fn clear(&mut self);

  /// Rebuilds the ordering from scratch, e.g. after loading a snapshot.
  fn rebuild(&mut self, entries: &mut [(String, EntryMeta)]) {
    self.clear();
    entries.sort_by_key(|(_, meta)| meta.seq);
    for (key, meta) in entries.iter() {
      self.on_insert(key, meta);
    }
  }
}
