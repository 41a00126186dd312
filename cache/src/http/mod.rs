//! Fetch strategies over a response store: cache-first, network-first,
//! stale-while-revalidate, cache-only and network-only, plus prefetching and
//! bulk invalidation.

mod store;
mod types;

pub use store::{MemoryResponseStore, ResponseStore};
pub use types::{HttpRequest, HttpResponse};

use crate::error::{CacheError, FetchError, Result};
use crate::runtime::TaskSpawner;
use crate::time::{duration_to_millis, system_clock, Clock};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{join_all, BoxFuture};
use regex::Regex;
use tracing::{debug, warn};

/// Performs requests against the network.
pub trait HttpFetcher: Send + Sync {
  fn fetch(&self, request: HttpRequest) -> BoxFuture<'static, std::result::Result<HttpResponse, FetchError>>;
}

/// How `HttpCache::fetch` balances the cache against the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FetchStrategy {
  /// Serve from the cache; fetch and store only on a miss.
  #[default]
  CacheFirst,
  /// Fetch and store; serve from the cache only if the fetch fails.
  NetworkFirst,
  /// Serve from the cache and refresh it in the background; fetch on a miss.
  StaleWhileRevalidate,
  /// Never touch the network.
  CacheOnly,
  /// Never touch the cache.
  NetworkOnly,
}

/// Outcome of `HttpCache::prefetch`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrefetchReport {
  /// URLs fetched and stored.
  pub fetched: usize,
  /// URLs already cached.
  pub skipped: usize,
  /// URLs whose fetch failed or returned a non-success status.
  pub failed: usize,
}

/// Applies fetch strategies over a `ResponseStore` and an `HttpFetcher`.
///
/// Only successful `GET` responses are stored. Other methods always go to
/// the network, except under `CacheOnly`, which fails for them.
#[derive(Clone)]
pub struct HttpCache {
  store: Arc<dyn ResponseStore>,
  fetcher: Arc<dyn HttpFetcher>,
  spawner: Option<Arc<dyn TaskSpawner>>,
  clock: Arc<dyn Clock>,
}

impl fmt::Debug for HttpCache {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("HttpCache")
      .field("has_spawner", &self.spawner.is_some())
      .field("clock", &self.clock)
      .finish_non_exhaustive()
  }
}

impl HttpCache {
  pub fn new(store: Arc<dyn ResponseStore>, fetcher: Arc<dyn HttpFetcher>) -> Self {
    Self {
      store,
      fetcher,
      spawner: None,
      clock: system_clock(),
    }
  }

  /// Sets the spawner that runs stale-while-revalidate refreshes. Without
  /// one, stale responses are served but never refreshed in the background.
  pub fn with_spawner(mut self, spawner: Arc<dyn TaskSpawner>) -> Self {
    self.spawner = Some(spawner);
    self
  }

  pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
    self.clock = clock;
    self
  }

  pub fn store(&self) -> &Arc<dyn ResponseStore> {
    &self.store
  }

  pub async fn fetch(&self, request: HttpRequest, strategy: FetchStrategy) -> Result<HttpResponse> {
    if !request.is_get() {
      return match strategy {
        FetchStrategy::CacheOnly => Err(CacheError::NotCached(request.url)),
        _ => Ok(self.fetcher.fetch(request).await?),
      };
    }

    match strategy {
      FetchStrategy::CacheFirst => match self.store.lookup(&request.url) {
        Some(cached) => Ok(cached),
        None => self.fetch_and_store(request).await,
      },
      FetchStrategy::NetworkFirst => {
        let url = request.url.clone();
        match self.fetch_and_store(request).await {
          Ok(response) => Ok(response),
          Err(e) => match self.store.lookup(&url) {
            Some(cached) => {
              debug!(url = %url, error = %e, "Network failed; serving cached response.");
              Ok(cached)
            }
            None => Err(e),
          },
        }
      }
      FetchStrategy::StaleWhileRevalidate => match self.store.lookup(&request.url) {
        Some(cached) => {
          self.revalidate(request);
          Ok(cached)
        }
        None => self.fetch_and_store(request).await,
      },
      FetchStrategy::CacheOnly => self
        .store
        .lookup(&request.url)
        .ok_or(CacheError::NotCached(request.url)),
      FetchStrategy::NetworkOnly => Ok(self.fetcher.fetch(request).await?),
    }
  }

  async fn fetch_and_store(&self, request: HttpRequest) -> Result<HttpResponse> {
    let url = request.url.clone();
    let response = self.fetcher.fetch(request).await?;
    store_response(&*self.store, &*self.clock, &url, &response)?;
    Ok(response)
  }

  fn revalidate(&self, request: HttpRequest) {
    let Some(spawner) = &self.spawner else {
      debug!(url = %request.url, "No spawner configured; skipping background revalidation.");
      return;
    };
    let store = self.store.clone();
    let fetcher = self.fetcher.clone();
    let clock = self.clock.clone();
    spawner.spawn(Box::pin(async move {
      let url = request.url.clone();
      match fetcher.fetch(request).await {
        Ok(response) => {
          if let Err(e) = store_response(&*store, &*clock, &url, &response) {
            warn!(url = %url, error = %e, "Failed to store revalidated response.");
          }
        }
        Err(e) => warn!(url = %url, error = %e, "Background revalidation failed."),
      }
    }));
  }

  /// Warms the cache for `urls` concurrently. Already-cached URLs are
  /// skipped and failures are logged, never returned.
  pub async fn prefetch<S: AsRef<str>>(&self, urls: &[S]) -> PrefetchReport {
    let outcomes = join_all(urls.iter().map(|url| async move {
      let url = url.as_ref();
      if self.store.lookup(url).is_some() {
        return Prefetched::Skipped;
      }
      match self.fetcher.fetch(HttpRequest::get(url)).await {
        Ok(response) if response.is_success() => {
          match store_response(&*self.store, &*self.clock, url, &response) {
            Ok(()) => Prefetched::Fetched,
            Err(e) => {
              warn!(url, error = %e, "Prefetched response could not be stored.");
              Prefetched::Failed
            }
          }
        }
        Ok(response) => {
          warn!(url, status = response.status, "Prefetch returned a non-success status.");
          Prefetched::Failed
        }
        Err(e) => {
          warn!(url, error = %e, "Prefetch failed.");
          Prefetched::Failed
        }
      }
    }))
    .await;

    let mut report = PrefetchReport::default();
    for outcome in outcomes {
      match outcome {
        Prefetched::Fetched => report.fetched += 1,
        Prefetched::Skipped => report.skipped += 1,
        Prefetched::Failed => report.failed += 1,
      }
    }
    report
  }

  /// Removes every cached URL matching `pattern`.
  pub fn invalidate_by_pattern(&self, pattern: &Regex) -> usize {
    self.remove_matching(|url, _| pattern.is_match(url))
  }

  /// Removes every response cached before `cutoff` (epoch milliseconds).
  pub fn invalidate_by_timestamp(&self, cutoff: u64) -> usize {
    self.remove_matching(|_, response| response.cached_at.map_or(true, |at| at < cutoff))
  }

  /// Removes every response at least `max_age` old.
  pub fn clear_expired(&self, max_age: Duration) -> usize {
    let now = self.clock.now_millis();
    let max_age = duration_to_millis(max_age);
    self.remove_matching(|_, response| {
      response
        .cached_at
        .map_or(true, |at| now.saturating_sub(at) >= max_age)
    })
  }

  fn remove_matching<P>(&self, mut predicate: P) -> usize
  where
    P: FnMut(&str, &HttpResponse) -> bool,
  {
    let mut removed = 0;
    for url in self.store.keys() {
      let Some(response) = self.store.lookup(&url) else {
        continue;
      };
      if predicate(&url, &response) && self.store.delete(&url) {
        removed += 1;
      }
    }
    removed
  }
}

enum Prefetched {
  Fetched,
  Skipped,
  Failed,
}

fn store_response(
  store: &dyn ResponseStore,
  clock: &dyn Clock,
  url: &str,
  response: &HttpResponse,
) -> Result<()> {
  if !response.is_success() {
    return Ok(());
  }
  let mut stored = response.clone();
  stored.cached_at = Some(clock.now_millis());
  store.put(url, stored)
}
