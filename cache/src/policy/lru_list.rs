use std::borrow::Borrow;
use std::{collections::HashMap, hash::Hash};

use generational_arena::{Arena, Index};

#[derive(Debug)]
pub(super) struct Node<K> {
  pub(crate) key: K,
  pub(crate) next: Option<Index>,
  pub(crate) prev: Option<Index>,
}

// An intrusive doubly linked list of keys stored in an arena.
// Head is the most recently pushed key, tail the oldest.
#[derive(Debug)]
pub(super) struct LruList<K: Eq + Hash + Clone> {
  pub(crate) nodes: Arena<Node<K>>,
  // O(1) lookup of a key to its node index in the arena.
  pub(crate) lookup: HashMap<K, Index>,
  pub(crate) head: Option<Index>,
  pub(crate) tail: Option<Index>,
}

impl<K: Eq + Hash + Clone> LruList<K> {
  pub fn new() -> Self {
    Self {
      nodes: Arena::new(),
      lookup: HashMap::new(),
      head: None,
      tail: None,
    }
  }

  // Doesn't touch the arena or the lookup map.
  fn unlink(&mut self, index: Index) {
    let node = &self.nodes[index];
    let prev_node_idx = node.prev;
    let next_node_idx = node.next;

    if let Some(prev_idx) = prev_node_idx {
      self.nodes[prev_idx].next = next_node_idx;
    } else {
      self.head = next_node_idx;
    }

    if let Some(next_idx) = next_node_idx {
      self.nodes[next_idx].prev = prev_node_idx;
    } else {
      self.tail = prev_node_idx;
    }
  }

  // Assumes the node is already in the arena.
  fn push_front_node(&mut self, index: Index) {
    let old_head_idx = self.head;
    self.nodes[index].next = old_head_idx;
    self.nodes[index].prev = None;
    self.head = Some(index);

    if let Some(old_head) = old_head_idx {
      self.nodes[old_head].prev = Some(index);
    }

    if self.tail.is_none() {
      self.tail = Some(index);
    }
  }

  pub fn contains<Q>(&self, key: &Q) -> bool
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    self.lookup.contains_key(key)
  }

  pub fn len(&self) -> usize {
    self.lookup.len()
  }

  /// Inserts `key` at the head, or moves it there if already present.
  pub fn push_front(&mut self, key: K) {
    if self.lookup.contains_key(&key) {
      self.move_to_front::<K>(&key);
    } else {
      let index = self.nodes.insert(Node {
        key: key.clone(),
        next: None,
        prev: None,
      });
      self.lookup.insert(key, index);
      self.push_front_node(index);
    }
  }

  pub fn move_to_front<Q>(&mut self, key: &Q)
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    if let Some(&index) = self.lookup.get(key) {
      if self.head != Some(index) {
        self.unlink(index);
        self.push_front_node(index);
      }
    }
  }

  pub fn pop_back(&mut self) -> Option<K> {
    let tail_index = self.tail?;
    let key = self.nodes.get(tail_index)?.key.clone();
    self.remove::<K>(&key);
    Some(key)
  }

  pub fn remove<Q>(&mut self, key: &Q) -> bool
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    match self.lookup.remove(key) {
      Some(index) => {
        self.unlink(index);
        self.nodes.remove(index);
        true
      }
      None => false,
    }
  }

  pub fn clear(&mut self) {
    self.nodes.clear();
    self.lookup.clear();
    self.head = None;
    self.tail = None;
  }

  // A helper for tests, to get the order of keys from head to tail.
  #[cfg(test)]
  pub(crate) fn keys_as_vec(&self) -> Vec<K> {
    let mut keys = Vec::new();
    let mut current = self.head;
    while let Some(index) = current {
      keys.push(self.nodes[index].key.clone());
      current = self.nodes[index].next;
    }
    keys
  }
}
