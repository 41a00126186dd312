use crate::entry::EntryInfo;

use std::fmt;

/// Describes the reason an entry was removed from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionReason {
  /// The store reached `max_size` and the eviction strategy picked this key.
  Capacity,
  /// The entry's TTL ran out, found by a read or by the cleanup sweep.
  Expired,
  /// Removed by `delete`, a tag or namespace invalidation, or `clear`.
  Invalidated,
}

impl fmt::Display for EvictionReason {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      EvictionReason::Capacity => write!(f, "evicted due to capacity"),
      EvictionReason::Expired => write!(f, "expired"),
      EvictionReason::Invalidated => write!(f, "invalidated"),
    }
  }
}

/// A listener that can be registered with the cache to receive notifications
/// when entries leave it.
///
/// Notifications are delivered on a dedicated background thread, so a slow
/// listener never blocks cache operations. If the listener falls too far
/// behind, further notifications are dropped.
pub trait EvictionListener: Send + Sync {
  fn on_evict(&self, info: EntryInfo, reason: EvictionReason);
}
