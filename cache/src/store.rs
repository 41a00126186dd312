use crate::entry::CacheEntry;
use crate::policy::EntryMeta;

use ahash::{HashMap, HashMapExt};

/// A stored entry together with the sequence number it was inserted under.
#[derive(Debug)]
pub(crate) struct Slot<V> {
  pub(crate) entry: CacheEntry<V>,
  pub(crate) seq: u64,
}

/// What `EntryStore::insert` replaced, if anything.
pub(crate) struct Inserted<V> {
  pub(crate) previous: Option<CacheEntry<V>>,
  pub(crate) meta: EntryMeta,
}

/// The associative container behind a cache: entries plus the two access
/// maps. An access record exists exactly as long as its entry does.
#[derive(Debug)]
pub(crate) struct EntryStore<V> {
  entries: HashMap<String, Slot<V>>,
  last_access: HashMap<String, u64>,
  access_count: HashMap<String, u64>,
  next_seq: u64,
  total_size: u64,
}

impl<V> EntryStore<V> {
  pub(crate) fn new() -> Self {
    Self {
      entries: HashMap::new(),
      last_access: HashMap::new(),
      access_count: HashMap::new(),
      next_seq: 0,
      total_size: 0,
    }
  }

  #[inline]
  pub(crate) fn len(&self) -> usize {
    self.entries.len()
  }

  #[inline]
  pub(crate) fn contains(&self, key: &str) -> bool {
    self.entries.contains_key(key)
  }

  #[inline]
  pub(crate) fn get(&self, key: &str) -> Option<&CacheEntry<V>> {
    self.entries.get(key).map(|slot| &slot.entry)
  }

  /// Sum of the serialized sizes of every stored entry.
  pub(crate) fn total_size(&self) -> u64 {
    self.total_size
  }

  /// Inserts or overwrites an entry. Overwrites keep the insertion sequence;
  /// both cases count as an access.
  pub(crate) fn insert(&mut self, entry: CacheEntry<V>, now: u64) -> Inserted<V> {
    let key = entry.key.clone();
    self.total_size += entry.metadata.original_size as u64;

    let previous = match self.entries.get_mut(&key) {
      Some(slot) => Some(std::mem::replace(&mut slot.entry, entry)),
      None => {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(key.clone(), Slot { entry, seq });
        None
      }
    };
    if let Some(old) = &previous {
      self.total_size = self.total_size.saturating_sub(old.metadata.original_size as u64);
    }

    let meta = self.record_access(&key, now).unwrap_or(EntryMeta {
      seq: 0,
      last_access: now,
      access_count: 1,
      expires_at: None,
    });
    Inserted { previous, meta }
  }

  /// Bumps the access maps for `key` and returns its updated metadata.
  pub(crate) fn record_access(&mut self, key: &str, now: u64) -> Option<EntryMeta> {
    if !self.entries.contains_key(key) {
      return None;
    }
    self.last_access.insert(key.to_string(), now);
    *self.access_count.entry(key.to_string()).or_insert(0) += 1;
    self.meta(key)
  }

  pub(crate) fn meta(&self, key: &str) -> Option<EntryMeta> {
    let slot = self.entries.get(key)?;
    Some(EntryMeta {
      seq: slot.seq,
      last_access: self.last_access.get(key).copied().unwrap_or(slot.entry.timestamp),
      access_count: self.access_count.get(key).copied().unwrap_or(0),
      expires_at: slot.entry.expires_at(),
    })
  }

  /// Removes the entry and both of its access records.
  pub(crate) fn remove(&mut self, key: &str) -> Option<CacheEntry<V>> {
    let slot = self.entries.remove(key)?;
    self.last_access.remove(key);
    self.access_count.remove(key);
    self.total_size = self
      .total_size
      .saturating_sub(slot.entry.metadata.original_size as u64);
    Some(slot.entry)
  }

  pub(crate) fn clear(&mut self) {
    self.entries.clear();
    self.last_access.clear();
    self.access_count.clear();
    self.total_size = 0;
  }

  /// Every stored entry, oldest insertion first.
  pub(crate) fn ordered(&self) -> Vec<&CacheEntry<V>> {
    let mut slots: Vec<&Slot<V>> = self.entries.values().collect();
    slots.sort_by_key(|slot| slot.seq);
    slots.into_iter().map(|slot| &slot.entry).collect()
  }

  pub(crate) fn iter(&self) -> impl Iterator<Item = (&String, &CacheEntry<V>)> {
    self.entries.iter().map(|(key, slot)| (key, &slot.entry))
  }

  pub(crate) fn metas(&self) -> Vec<(String, EntryMeta)> {
    self
      .entries
      .keys()
      .filter_map(|key| self.meta(key).map(|meta| (key.clone(), meta)))
      .collect()
  }

  pub(crate) fn expired_keys(&self, now: u64) -> Vec<String> {
    self
      .entries
      .iter()
      .filter(|(_, slot)| slot.entry.is_expired(now))
      .map(|(key, _)| key.clone())
      .collect()
  }

  pub(crate) fn last_access(&self) -> &HashMap<String, u64> {
    &self.last_access
  }

  pub(crate) fn access_count(&self) -> &HashMap<String, u64> {
    &self.access_count
  }

  /// Re-populates the store from persisted parts. Entries are given in
  /// insertion order; access records for unknown keys are dropped.
  pub(crate) fn restore(
    &mut self,
    entries: Vec<CacheEntry<V>>,
    last_access: impl IntoIterator<Item = (String, u64)>,
    access_count: impl IntoIterator<Item = (String, u64)>,
  ) {
    self.clear();
    for entry in entries {
      let key = entry.key.clone();
      self.total_size += entry.metadata.original_size as u64;
      let seq = self.next_seq;
      self.next_seq += 1;
      if let Some(old) = self.entries.insert(key, Slot { entry, seq }) {
        self.total_size = self
          .total_size
          .saturating_sub(old.entry.metadata.original_size as u64);
      }
    }
    for (key, at) in last_access {
      if self.entries.contains_key(&key) {
        self.last_access.insert(key, at);
      }
    }
    for (key, count) in access_count {
      if self.entries.contains_key(&key) {
        self.access_count.insert(key, count);
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::entry::{EntryData, EntryMetadata};
  use std::sync::Arc;

  fn entry(key: &str, size: usize) -> CacheEntry<u32> {
    CacheEntry {
      key: key.to_string(),
      data: EntryData::Plain(Arc::new(7)),
      timestamp: 100,
      ttl: None,
      metadata: EntryMetadata {
        original_size: size,
        ..Default::default()
      },
    }
  }

  #[test]
  fn access_records_live_and_die_with_entries() {
    let mut store = EntryStore::new();
    store.insert(entry("a", 10), 100);
    store.record_access("a", 150);

    let meta = store.meta("a").unwrap();
    assert_eq!(meta.last_access, 150);
    assert_eq!(meta.access_count, 2);

    store.remove("a");
    assert!(store.last_access().is_empty());
    assert!(store.access_count().is_empty());
    assert_eq!(store.record_access("a", 200), None);
    assert!(store.last_access().is_empty());
  }

  #[test]
  fn overwrite_keeps_sequence_and_tracks_size() {
    let mut store = EntryStore::new();
    store.insert(entry("a", 10), 100);
    store.insert(entry("b", 5), 101);
    let replaced = store.insert(entry("a", 3), 102);

    assert!(replaced.previous.is_some());
    assert_eq!(replaced.meta.seq, 0);
    assert_eq!(store.total_size(), 8);
    let order: Vec<&str> = store.ordered().iter().map(|e| e.key.as_str()).collect();
    assert_eq!(order, vec!["a", "b"]);
  }

  #[test]
  fn restore_drops_orphan_access_records() {
    let mut store = EntryStore::new();
    store.restore(
      vec![entry("a", 1), entry("b", 2)],
      vec![("a".to_string(), 5), ("ghost".to_string(), 9)],
      vec![("b".to_string(), 4)],
    );

    assert_eq!(store.len(), 2);
    assert_eq!(store.total_size(), 3);
    assert_eq!(store.last_access().len(), 1);
    assert_eq!(store.meta("b").unwrap().access_count, 4);
  }
}
