use once_cell::sync::Lazy;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

// Shared by every cache and queue that doesn't inject its own clock.
static SYSTEM_CLOCK: Lazy<Arc<dyn Clock>> = Lazy::new(|| Arc::new(SystemClock));

/// A source of wall-clock time in epoch milliseconds.
///
/// Entry timestamps, TTL checks and queue item timestamps all go through a
/// `Clock` so that expiry can be driven deterministically in tests.
pub trait Clock: Send + Sync + fmt::Debug {
  fn now_millis(&self) -> u64;
}

/// The real clock, backed by `SystemTime`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now_millis(&self) -> u64 {
    SystemTime::now()
      .duration_since(UNIX_EPOCH)
      .map(|d| d.as_millis() as u64)
      .unwrap_or(0)
  }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
  now: Arc<AtomicU64>,
}

impl ManualClock {
  pub fn new(start_millis: u64) -> Self {
    Self {
      now: Arc::new(AtomicU64::new(start_millis)),
    }
  }

  pub fn advance(&self, by: Duration) {
    self.now.fetch_add(duration_to_millis(by), Ordering::SeqCst);
  }

  pub fn set(&self, millis: u64) {
    self.now.store(millis, Ordering::SeqCst);
  }
}

impl Default for ManualClock {
  fn default() -> Self {
    Self::new(1_000_000)
  }
}

impl Clock for ManualClock {
  fn now_millis(&self) -> u64 {
    self.now.load(Ordering::SeqCst)
  }
}

/// Returns the process-wide system clock.
pub fn system_clock() -> Arc<dyn Clock> {
  SYSTEM_CLOCK.clone()
}

#[inline]
pub(crate) fn duration_to_millis(duration: Duration) -> u64 {
  duration.as_millis().min(u64::MAX as u128) as u64
}
