use super::lru_list::LruList;
use super::{EntryMeta, EvictionPolicy};

use std::collections::{BTreeSet, HashMap};

/// An eviction policy that evicts the entry closest to expiring.
///
/// Entries without a TTL are only considered once no expiring entry is left,
/// and then in insertion order, so the size bound always holds.
#[derive(Debug)]
pub struct Ttl {
  expiring: BTreeSet<(u64, u64, String)>,
  deadlines: HashMap<String, (u64, u64)>,
  untimed: LruList<String>,
}

impl Ttl {
  pub fn new() -> Self {
    Self {
      expiring: BTreeSet::new(),
      deadlines: HashMap::new(),
      untimed: LruList::new(),
    }
  }

  fn forget(&mut self, key: &str) {
    if let Some((expires_at, seq)) = self.deadlines.remove(key) {
      self.expiring.remove(&(expires_at, seq, key.to_string()));
    }
    self.untimed.remove(key);
  }

  fn track(&mut self, key: &str, meta: &EntryMeta) {
    match meta.expires_at {
      Some(expires_at) => {
        self.deadlines.insert(key.to_string(), (expires_at, meta.seq));
        self.expiring.insert((expires_at, meta.seq, key.to_string()));
      }
      None => self.untimed.push_front(key.to_string()),
    }
  }
}

impl Default for Ttl {
  fn default() -> Self {
    Self::new()
  }
}

impl EvictionPolicy for Ttl {
  fn on_insert(&mut self, key: &str, meta: &EntryMeta) {
    self.forget(key);
    self.track(key, meta);
  }

  /// A rewrite resets the entry's timestamp and possibly its TTL.
  fn on_update(&mut self, key: &str, meta: &EntryMeta) {
    self.forget(key);
    self.track(key, meta);
  }

  fn on_access(&mut self, _key: &str, _meta: &EntryMeta) {}

  fn on_remove(&mut self, key: &str) {
    self.forget(key);
  }

  fn pop_victim(&mut self) -> Option<String> {
    if let Some((_, _, key)) = self.expiring.pop_first() {
      self.deadlines.remove(&key);
      return Some(key);
    }
    self.untimed.pop_back()
  }

  fn len(&self) -> usize {
    self.deadlines.len() + self.untimed.len()
  }

  fn clear(&mut self) {
    self.expiring.clear();
    self.deadlines.clear();
    self.untimed.clear();
  }
}
