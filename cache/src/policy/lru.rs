use super::lru_list::LruList;
use super::{EntryMeta, EvictionPolicy};

/// An eviction policy that evicts the least recently used entries.
#[derive(Debug)]
pub struct Lru {
  list: LruList<String>,
}

impl Lru {
  pub fn new() -> Self {
    Self {
      list: LruList::new(),
    }
  }
}

impl Default for Lru {
  fn default() -> Self {
    Self::new()
  }
}

impl EvictionPolicy for Lru {
  fn on_insert(&mut self, key: &str, _meta: &EntryMeta) {
    self.list.push_front(key.to_string());
  }

  /// A write counts as a use.
  fn on_update(&mut self, key: &str, _meta: &EntryMeta) {
    self.list.move_to_front(key);
  }

  fn on_access(&mut self, key: &str, _meta: &EntryMeta) {
    self.list.move_to_front(key);
  }

  fn on_remove(&mut self, key: &str) {
    self.list.remove(key);
  }

  fn pop_victim(&mut self) -> Option<String> {
    self.list.pop_back()
  }

  fn len(&self) -> usize {
    self.list.len()
  }

  fn clear(&mut self) {
    self.list.clear();
  }

  /// Replays keys oldest-access first so the list ends up in recency order.
  fn rebuild(&mut self, entries: &mut [(String, EntryMeta)]) {
    self.clear();
    entries.sort_by_key(|(_, meta)| (meta.last_access, meta.seq));
    for (key, _) in entries.iter() {
      self.list.push_front(key.clone());
    }
  }
}
