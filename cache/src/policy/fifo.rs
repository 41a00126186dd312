use super::lru_list::LruList;
use super::{EntryMeta, EvictionPolicy};

/// An eviction policy that evicts entries in a First-In, First-Out (FIFO) manner.
#[derive(Debug)]
pub struct Fifo {
  list: LruList<String>,
}

impl Fifo {
  pub fn new() -> Self {
    Self {
      list: LruList::new(),
    }
  }
}

impl Default for Fifo {
  fn default() -> Self {
    Self::new()
  }
}

impl EvictionPolicy for Fifo {
  fn on_insert(&mut self, key: &str, _meta: &EntryMeta) {
    if !self.list.contains(key) {
      self.list.push_front(key.to_string());
    }
  }

  /// Overwriting keeps the original insertion position.
  fn on_update(&mut self, _key: &str, _meta: &EntryMeta) {}

  /// A FIFO policy does not care about access patterns. This is a no-op.
  fn on_access(&mut self, _key: &str, _meta: &EntryMeta) {}

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
}

#[cfg(test)]
mod tests {
  use super::*;

  fn meta(seq: u64) -> EntryMeta {
    EntryMeta {
      seq,
      last_access: seq,
      access_count: 1,
      expires_at: None,
    }
  }

  #[test]
  fn access_is_a_noop() {
    let mut policy = Fifo::new();
    policy.on_insert("a", &meta(0));
    policy.on_insert("b", &meta(1));

    policy.on_access("a", &meta(0));
    policy.on_update("a", &meta(0));

    assert_eq!(policy.list.keys_as_vec(), vec!["b".to_string(), "a".to_string()]);
    assert_eq!(policy.pop_victim().as_deref(), Some("a"));
  }

  #[test]
  fn re_insert_existing_key_is_a_noop() {
    let mut policy = Fifo::new();
    policy.on_insert("a", &meta(0));
    policy.on_insert("b", &meta(1));
    policy.on_insert("a", &meta(0));

    assert_eq!(policy.len(), 2);
    assert_eq!(policy.pop_victim().as_deref(), Some("a"));
  }

  #[test]
  fn rebuild_follows_insertion_sequence() {
    let mut policy = Fifo::new();
    let mut entries = vec![("late".to_string(), meta(7)), ("early".to_string(), meta(2))];
    policy.rebuild(&mut entries);

    assert_eq!(policy.pop_victim().as_deref(), Some("early"));
    assert_eq!(policy.pop_victim().as_deref(), Some("late"));
  }

  #[test]
  fn clear_resets_state() {
    let mut policy = Fifo::new();
    policy.on_insert("a", &meta(0));
    policy.clear();

    assert!(policy.is_empty());
    assert_eq!(policy.pop_victim(), None);
  }
}
