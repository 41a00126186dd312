use crate::item::{ItemKind, QueueItem};

use skein_cache::http::{HttpFetcher, HttpRequest};
use skein_cache::FetchError;

use std::error::Error as StdError;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;

/// Delivers one queued item. An `Err` counts as a failed attempt.
pub trait ItemProcessor: Send + Sync {
  fn process<'a>(&'a self, item: &'a QueueItem) -> BoxFuture<'a, Result<(), FetchError>>;
}

/// An `ItemProcessor` backed by a closure. Built with [`processor_fn`].
pub struct FnProcessor<F> {
  f: F,
}

impl<F> fmt::Debug for FnProcessor<F> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("FnProcessor").finish_non_exhaustive()
  }
}

/// Wraps an async closure as an `ItemProcessor`.
///
/// ```
/// use skein_offline::processor_fn;
///
/// let processor = processor_fn(|item| async move {
///   println!("delivering {}", item.id);
///   Ok::<(), std::io::Error>(())
/// });
/// # let _ = processor;
/// ```
pub fn processor_fn<F, Fut, E>(f: F) -> FnProcessor<F>
where
  F: Fn(QueueItem) -> Fut + Send + Sync,
  Fut: Future<Output = Result<(), E>> + Send + 'static,
  E: Into<Box<dyn StdError + Send + Sync>>,
{
  FnProcessor { f }
}

impl<F, Fut, E> ItemProcessor for FnProcessor<F>
where
  F: Fn(QueueItem) -> Fut + Send + Sync,
  Fut: Future<Output = Result<(), E>> + Send + 'static,
  E: Into<Box<dyn StdError + Send + Sync>>,
{
  fn process<'a>(&'a self, item: &'a QueueItem) -> BoxFuture<'a, Result<(), FetchError>> {
    let fut = (self.f)(item.clone());
    Box::pin(async move { fut.await.map_err(FetchError::new) })
  }
}

/// Routes items by kind: `Api` items are decoded into an `HttpRequest` and
/// sent through an `HttpFetcher`; the other kinds go to their own
/// processors. A kind with no handler fails, so its items are retried and
/// eventually given up.
#[derive(Default, Clone)]
pub struct Dispatcher {
  executor: Option<Arc<dyn HttpFetcher>>,
  analytics: Option<Arc<dyn ItemProcessor>>,
  sync: Option<Arc<dyn ItemProcessor>>,
}

impl fmt::Debug for Dispatcher {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Dispatcher")
      .field("has_executor", &self.executor.is_some())
      .field("has_analytics", &self.analytics.is_some())
      .field("has_sync", &self.sync.is_some())
      .finish()
  }
}

impl Dispatcher {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn executor(mut self, executor: Arc<dyn HttpFetcher>) -> Self {
    self.executor = Some(executor);
    self
  }

  pub fn analytics<P: ItemProcessor + 'static>(mut self, processor: P) -> Self {
    self.analytics = Some(Arc::new(processor));
    self
  }

  pub fn sync<P: ItemProcessor + 'static>(mut self, processor: P) -> Self {
    self.sync = Some(Arc::new(processor));
    self
  }
}

impl ItemProcessor for Dispatcher {
  fn process<'a>(&'a self, item: &'a QueueItem) -> BoxFuture<'a, Result<(), FetchError>> {
    Box::pin(async move {
      match item.kind {
        ItemKind::Api => {
          let executor = self
            .executor
            .as_ref()
            .ok_or_else(|| missing_handler(item.kind))?;
          let request: HttpRequest =
            serde_json::from_value(item.data.clone()).map_err(FetchError::new)?;
          let response = executor.fetch(request).await?;
          if response.is_success() {
            Ok(())
          } else {
            Err(FetchError::new(format!(
              "server responded with status {}",
              response.status
            )))
          }
        }
        ItemKind::Analytics => match &self.analytics {
          Some(processor) => processor.process(item).await,
          None => Err(missing_handler(item.kind)),
        },
        ItemKind::Sync => match &self.sync {
          Some(processor) => processor.process(item).await,
          None => Err(missing_handler(item.kind)),
        },
      }
    })
  }
}

fn missing_handler(kind: ItemKind) -> FetchError {
  FetchError::new(format!("no processor registered for {kind} items"))
}
