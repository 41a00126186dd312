use super::{EntryMeta, EvictionPolicy};

use std::collections::{BTreeSet, HashMap};

/// An eviction policy that evicts the least frequently used entries.
///
/// Keys are kept in an ordered set on `(access_count, last_access, key)`, so
/// ties between equally used keys go to the one touched longest ago.
#[derive(Debug, Default)]
pub struct Lfu {
  order: BTreeSet<(u64, u64, String)>,
  positions: HashMap<String, (u64, u64)>,
}

impl Lfu {
  pub fn new() -> Self {
    Self::default()
  }

  fn reposition(&mut self, key: &str, meta: &EntryMeta) {
    let position = (meta.access_count, meta.last_access);
    match self.positions.get_mut(key) {
      Some(current) => {
        if *current == position {
          return;
        }
        self.order.remove(&(current.0, current.1, key.to_string()));
        *current = position;
      }
      None => {
        self.positions.insert(key.to_string(), position);
      }
    }
    self.order.insert((position.0, position.1, key.to_string()));
  }
}

impl EvictionPolicy for Lfu {
  fn on_insert(&mut self, key: &str, meta: &EntryMeta) {
    self.reposition(key, meta);
  }

  fn on_update(&mut self, key: &str, meta: &EntryMeta) {
    self.reposition(key, meta);
  }

  fn on_access(&mut self, key: &str, meta: &EntryMeta) {
    self.reposition(key, meta);
  }

  fn on_remove(&mut self, key: &str) {
    if let Some((count, last_access)) = self.positions.remove(key) {
      self.order.remove(&(count, last_access, key.to_string()));
    }
  }

  fn pop_victim(&mut self) -> Option<String> {
    let (_, _, key) = self.order.pop_first()?;
    self.positions.remove(&key);
    Some(key)
  }

  fn len(&self) -> usize {
    self.positions.len()
  }

  fn clear(&mut self) {
    self.order.clear();
    self.positions.clear();
  }
}
