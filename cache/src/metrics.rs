use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crossbeam_utils::CachePadded;

/// Lock-free counters behind `Cache::stats`.
#[derive(Debug, Default)]
pub(crate) struct Metrics {
  pub(crate) hits: CachePadded<AtomicU64>,
  pub(crate) misses: CachePadded<AtomicU64>,
  // Sum of lookup durations, in nanoseconds.
  pub(crate) access_nanos: CachePadded<AtomicU64>,
  pub(crate) evictions: CachePadded<AtomicU64>,
  pub(crate) expirations: CachePadded<AtomicU64>,
  // Epoch millis of the last sweep; zero means never.
  pub(crate) last_cleanup: CachePadded<AtomicU64>,
}

impl Metrics {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  #[inline]
  pub(crate) fn record_lookup(&self, hit: bool, took: Duration) {
    if hit {
      self.hits.fetch_add(1, Ordering::Relaxed);
    } else {
      self.misses.fetch_add(1, Ordering::Relaxed);
    }
    self
      .access_nanos
      .fetch_add(took.as_nanos().min(u64::MAX as u128) as u64, Ordering::Relaxed);
  }

  /// Zeroes every counter. Only `clear` calls this.
  pub(crate) fn reset(&self) {
    self.hits.store(0, Ordering::Relaxed);
    self.misses.store(0, Ordering::Relaxed);
    self.access_nanos.store(0, Ordering::Relaxed);
    self.evictions.store(0, Ordering::Relaxed);
    self.expirations.store(0, Ordering::Relaxed);
    self.last_cleanup.store(0, Ordering::Relaxed);
  }

  /// Creates a point-in-time snapshot. `entries` and `size` come from the
  /// store, which the caller reads under its lock.
  pub(crate) fn snapshot(&self, entries: usize, size: u64) -> CacheStats {
    let hits = self.hits.load(Ordering::Relaxed);
    let misses = self.misses.load(Ordering::Relaxed);
    let total_requests = hits + misses;
    let access_nanos = self.access_nanos.load(Ordering::Relaxed);
    let last_cleanup = self.last_cleanup.load(Ordering::Relaxed);

    CacheStats {
      hits,
      misses,
      total_requests,
      hit_rate: if total_requests == 0 {
        0.0
      } else {
        hits as f64 / total_requests as f64
      },
      entries,
      size,
      average_access_time: if total_requests == 0 {
        Duration::ZERO
      } else {
        Duration::from_nanos(access_nanos / total_requests)
      },
      last_cleanup: (last_cleanup != 0).then_some(last_cleanup),
      evictions: self.evictions.load(Ordering::Relaxed),
      expirations: self.expirations.load(Ordering::Relaxed),
    }
  }
}

/// A point-in-time, public-facing snapshot of a cache's statistics.
#[derive(Clone, PartialEq)]
pub struct CacheStats {
  /// Lookups that found a live entry.
  pub hits: u64,
  /// Lookups that found nothing, or an expired entry.
  pub misses: u64,
  /// Always `hits + misses`.
  pub total_requests: u64,
  /// `hits / total_requests`, or `0.0` before the first lookup.
  pub hit_rate: f64,
  /// Entries currently stored.
  pub entries: usize,
  /// Sum of the serialized sizes of the stored entries, in bytes.
  pub size: u64,
  pub average_access_time: Duration,
  /// Epoch milliseconds of the last expiry sweep.
  pub last_cleanup: Option<u64>,
  /// Entries removed to make room.
  pub evictions: u64,
  /// Entries removed because their TTL ran out.
  pub expirations: u64,
}

impl fmt::Debug for CacheStats {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheStats")
      .field("hits", &self.hits)
      .field("misses", &self.misses)
      .field("total_requests", &self.total_requests)
      .field("hit_rate", &format!("{:.2}%", self.hit_rate * 100.0))
      .field("entries", &self.entries)
      .field("size", &self.size)
      .field("average_access_time", &self.average_access_time)
      .field("last_cleanup", &self.last_cleanup)
      .field("evictions", &self.evictions)
      .field("expirations", &self.expirations)
      .finish()
  }
}
