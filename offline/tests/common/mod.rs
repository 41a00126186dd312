#![allow(dead_code)]

use skein_cache::FetchError;
use skein_offline::{ItemProcessor, QueueItem};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::future::BoxFuture;
use parking_lot::Mutex;

/// Records every attempt and succeeds or fails on demand.
#[derive(Clone, Default)]
pub struct Spy {
  attempts: Arc<Mutex<Vec<QueueItem>>>,
  failing: Arc<AtomicBool>,
}

impl Spy {
  pub fn failing() -> Self {
    let spy = Self::default();
    spy.set_failing(true);
    spy
  }

  pub fn set_failing(&self, failing: bool) {
    self.failing.store(failing, Ordering::SeqCst);
  }

  pub fn attempts(&self) -> Vec<QueueItem> {
    self.attempts.lock().clone()
  }

  pub fn attempt_count(&self) -> usize {
    self.attempts.lock().len()
  }
}

impl ItemProcessor for Spy {
  fn process<'a>(&'a self, item: &'a QueueItem) -> BoxFuture<'a, Result<(), FetchError>> {
    self.attempts.lock().push(item.clone());
    let fail = self.failing.load(Ordering::SeqCst);
    Box::pin(async move {
      if fail {
        Err(FetchError::new("endpoint unreachable"))
      } else {
        Ok(())
      }
    })
  }
}
