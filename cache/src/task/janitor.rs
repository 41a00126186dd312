use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// The background thread that runs the periodic expiry sweep.
///
/// The janitor never owns the cache. Each tick calls back into a closure
/// that upgrades a weak reference and returns `false` once the cache is
/// gone, which ends the thread.
pub(crate) struct Janitor {
  handle: JoinHandle<()>,
  stop_flag: Arc<AtomicBool>,
}

impl Janitor {
  /// Spawns a janitor thread that calls `tick` every `interval`.
  pub(crate) fn spawn<F>(interval: Duration, mut tick: F) -> Self
  where
    F: FnMut() -> bool + Send + 'static,
  {
    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_clone = stop_flag.clone();

    let handle = thread::spawn(move || {
      let mut next = Instant::now() + interval;
      loop {
        // Parking can wake spuriously; only tick once the deadline passed.
        let now = Instant::now();
        if now < next {
          thread::park_timeout(next - now);
        }
        if stop_clone.load(Ordering::Acquire) {
          break;
        }
        if Instant::now() < next {
          continue;
        }
        if !tick() {
          break;
        }
        next = Instant::now() + interval;
      }
      tracing::trace!("Janitor thread exiting.");
    });

    Self { handle, stop_flag }
  }

  /// Signals the janitor thread to stop and wakes it. Does not join, since
  /// the last cache handle may be dropped from the janitor thread itself.
  pub(crate) fn stop(self) {
    self.stop_flag.store(true, Ordering::Release);
    self.handle.thread().unpark();
  }
}
