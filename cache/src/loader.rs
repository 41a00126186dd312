use crate::error::{CacheError, FetchError, StorageError};

use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

pub(crate) type LoadResult<V> = Result<Arc<V>, LoadError>;

/// Why a shared load failed. Cloned out to every waiter, so each one sees
/// the error the caller driving the fetch got.
#[derive(Debug, Clone)]
pub(crate) enum LoadError {
  Fetch(FetchError),
  QuotaExceeded { key: String, needed: usize, limit: usize },
}

impl LoadError {
  /// The shareable form of a failed store after a successful fetch. Only
  /// quota exhaustion escapes a write; anything else is kept as its message.
  pub(crate) fn from_store(err: &CacheError) -> Self {
    match err {
      CacheError::Storage(StorageError::QuotaExceeded { key, needed, limit }) => LoadError::QuotaExceeded {
        key: key.clone(),
        needed: *needed,
        limit: *limit,
      },
      CacheError::Fetch(e) => LoadError::Fetch(e.clone()),
      other => LoadError::Fetch(FetchError::new(other.to_string())),
    }
  }
}

impl From<FetchError> for LoadError {
  fn from(err: FetchError) -> Self {
    LoadError::Fetch(err)
  }
}

impl From<LoadError> for CacheError {
  fn from(err: LoadError) -> Self {
    match err {
      LoadError::Fetch(e) => CacheError::Fetch(e),
      LoadError::QuotaExceeded { key, needed, limit } => {
        CacheError::Storage(StorageError::QuotaExceeded { key, needed, limit })
      }
    }
  }
}

/// The internal state of a value being loaded.
enum State<V> {
  Computing,
  Complete(LoadResult<V>),
}

struct Inner<V> {
  state: State<V>,
  waiters: Vec<Waker>,
}

/// A fetch in flight, awaited by every caller that asked for the same key
/// while it runs. The first caller drives the fetch and completes it.
pub(crate) struct LoadFuture<V> {
  inner: Mutex<Inner<V>>,
}

impl<V> LoadFuture<V> {
  /// Creates a new `LoadFuture` in the "Computing" state.
  pub(crate) fn new() -> Self {
    Self {
      inner: Mutex::new(Inner {
        state: State::Computing,
        waiters: Vec::new(),
      }),
    }
  }

  /// Completes the future, waking all waiters. Only the first completion
  /// counts.
  pub(crate) fn complete(&self, result: LoadResult<V>) {
    let waiters = {
      let mut inner = self.inner.lock();
      if matches!(inner.state, State::Complete(_)) {
        return;
      }
      inner.state = State::Complete(result);
      std::mem::take(&mut inner.waiters)
    };
    for waker in waiters {
      waker.wake();
    }
  }

  pub(crate) fn is_complete(&self) -> bool {
    matches!(self.inner.lock().state, State::Complete(_))
  }
}

impl<V> Future for &LoadFuture<V> {
  type Output = LoadResult<V>;

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    let mut inner = self.inner.lock();
    match &inner.state {
      State::Complete(result) => Poll::Ready(result.clone()),
      State::Computing => {
        if !inner.waiters.iter().any(|w| w.will_wake(cx.waker())) {
          inner.waiters.push(cx.waker().clone());
        }
        Poll::Pending
      }
    }
  }
}
