use super::{EntryMeta, EvictionPolicy, Strategy};

use tracing::debug;

/// Feeds store events to every policy in use and picks victims.
///
/// The configured strategy is always tracked. A per-call strategy override
/// starts tracking on first use, rebuilt from the store's access metadata.
#[derive(Debug)]
pub(crate) struct EvictionEngine {
  policies: Vec<(Strategy, Box<dyn EvictionPolicy>)>,
}

impl EvictionEngine {
  pub(crate) fn new(primary: Strategy) -> Self {
    Self {
      policies: vec![(primary, primary.new_policy())],
    }
  }

  pub(crate) fn is_tracking(&self, strategy: Strategy) -> bool {
    self.policies.iter().any(|(s, _)| *s == strategy)
  }

  /// Starts tracking `strategy` if it isn't already.
  pub(crate) fn track<F>(&mut self, strategy: Strategy, entries: F)
  where
    F: FnOnce() -> Vec<(String, EntryMeta)>,
  {
    if self.is_tracking(strategy) {
      return;
    }
    let mut policy = strategy.new_policy();
    let mut entries = entries();
    policy.rebuild(&mut entries);
    debug!(strategy = %strategy, keys = entries.len(), "tracking additional eviction strategy");
    self.policies.push((strategy, policy));
  }

  pub(crate) fn on_insert(&mut self, key: &str, meta: &EntryMeta) {
    for (_, policy) in self.policies.iter_mut() {
      policy.on_insert(key, meta);
    }
  }

  pub(crate) fn on_update(&mut self, key: &str, meta: &EntryMeta) {
    for (_, policy) in self.policies.iter_mut() {
      policy.on_update(key, meta);
    }
  }

  pub(crate) fn on_access(&mut self, key: &str, meta: &EntryMeta) {
    for (_, policy) in self.policies.iter_mut() {
      policy.on_access(key, meta);
    }
  }

  pub(crate) fn on_remove(&mut self, key: &str) {
    for (_, policy) in self.policies.iter_mut() {
      policy.on_remove(key);
    }
  }

  /// Pops the head candidate of `strategy`. The caller must then remove the
  /// key from the store, which in turn calls `on_remove` on every policy.
  pub(crate) fn pop_victim(&mut self, strategy: Strategy) -> Option<String> {
    self
      .policies
      .iter_mut()
      .find(|(s, _)| *s == strategy)
      .and_then(|(_, policy)| policy.pop_victim())
  }

  pub(crate) fn clear(&mut self) {
    for (_, policy) in self.policies.iter_mut() {
      policy.clear();
    }
  }

  pub(crate) fn rebuild(&mut self, entries: &[(String, EntryMeta)]) {
    for (_, policy) in self.policies.iter_mut() {
      let mut entries = entries.to_vec();
      policy.rebuild(&mut entries);
    }
  }
}
