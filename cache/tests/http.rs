use skein_cache::http::{
  FetchStrategy, HttpCache, HttpFetcher, HttpRequest, HttpResponse, MemoryResponseStore,
  ResponseStore,
};
use skein_cache::{Cache, CacheError, Clock, FetchError, ManualClock};

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use regex::Regex;

/// Serves canned responses per URL. URLs without one fail.
#[derive(Default)]
struct MockFetcher {
  responses: Mutex<HashMap<String, HttpResponse>>,
  calls: AtomicUsize,
}

impl MockFetcher {
  fn serve(&self, url: &str, response: HttpResponse) {
    self.responses.lock().insert(url.to_string(), response);
  }

  fn go_offline(&self) {
    self.responses.lock().clear();
  }

  fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }
}

impl HttpFetcher for MockFetcher {
  fn fetch(&self, request: HttpRequest) -> BoxFuture<'static, Result<HttpResponse, FetchError>> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    let result = self
      .responses
      .lock()
      .get(&request.url)
      .cloned()
      .ok_or_else(|| FetchError::new(format!("connection refused: {}", request.url)));
    Box::pin(async move { result })
  }
}

const URL: &str = "https://api.example.com/items";

fn setup() -> (HttpCache, Arc<MemoryResponseStore>, Arc<MockFetcher>, ManualClock) {
  let store = Arc::new(MemoryResponseStore::new());
  let fetcher = Arc::new(MockFetcher::default());
  let clock = ManualClock::default();
  let http = HttpCache::new(store.clone(), fetcher.clone()).with_clock(Arc::new(clock.clone()));
  (http, store, fetcher, clock)
}

#[tokio::test]
async fn test_cache_first_fetches_once() {
  let (http, store, fetcher, clock) = setup();
  fetcher.serve(URL, HttpResponse::ok(b"v1".to_vec()));

  let first = http.fetch(HttpRequest::get(URL), FetchStrategy::CacheFirst).await.unwrap();
  assert_eq!(first.body, b"v1");
  assert!(!first.is_cached());

  let second = http.fetch(HttpRequest::get(URL), FetchStrategy::CacheFirst).await.unwrap();
  assert_eq!(second.body, b"v1");
  assert_eq!(second.cached_at, Some(clock.now_millis()));
  assert_eq!(fetcher.calls(), 1);
  assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn test_network_first_falls_back_to_cache() {
  let (http, _store, fetcher, _clock) = setup();
  fetcher.serve(URL, HttpResponse::ok(b"v1".to_vec()));
  http.fetch(HttpRequest::get(URL), FetchStrategy::NetworkFirst).await.unwrap();

  fetcher.serve(URL, HttpResponse::ok(b"v2".to_vec()));
  let fresh = http.fetch(HttpRequest::get(URL), FetchStrategy::NetworkFirst).await.unwrap();
  assert_eq!(fresh.body, b"v2");

  fetcher.go_offline();
  let fallback = http.fetch(HttpRequest::get(URL), FetchStrategy::NetworkFirst).await.unwrap();
  assert_eq!(fallback.body, b"v2");
  assert!(fallback.is_cached());
}

#[tokio::test]
async fn test_network_first_without_cache_surfaces_the_error() {
  let (http, _store, _fetcher, _clock) = setup();
  let err = http
    .fetch(HttpRequest::get(URL), FetchStrategy::NetworkFirst)
    .await
    .unwrap_err();
  assert!(matches!(err, CacheError::Fetch(_)));
}

#[tokio::test]
async fn test_cache_only_never_touches_the_network() {
  let (http, store, fetcher, _clock) = setup();
  fetcher.serve(URL, HttpResponse::ok(b"v1".to_vec()));

  let err = http.fetch(HttpRequest::get(URL), FetchStrategy::CacheOnly).await.unwrap_err();
  assert!(matches!(err, CacheError::NotCached(ref url) if url == URL));

  store.put(URL, HttpResponse::ok(b"seeded".to_vec())).unwrap();
  let hit = http.fetch(HttpRequest::get(URL), FetchStrategy::CacheOnly).await.unwrap();
  assert_eq!(hit.body, b"seeded");
  assert_eq!(fetcher.calls(), 0);
}

#[tokio::test]
async fn test_network_only_never_stores() {
  let (http, store, fetcher, _clock) = setup();
  fetcher.serve(URL, HttpResponse::ok(b"v1".to_vec()));

  http.fetch(HttpRequest::get(URL), FetchStrategy::NetworkOnly).await.unwrap();
  assert!(store.is_empty());
}

#[tokio::test]
async fn test_only_successful_gets_are_stored() {
  let (http, store, fetcher, _clock) = setup();
  fetcher.serve(URL, HttpResponse::new(500, b"oops".to_vec()));

  let response = http.fetch(HttpRequest::get(URL), FetchStrategy::CacheFirst).await.unwrap();
  assert_eq!(response.status, 500);
  assert!(store.is_empty());

  fetcher.serve(URL, HttpResponse::new(201, Vec::new()));
  let post = HttpRequest::new("POST", URL).body("{}");
  http.fetch(post.clone(), FetchStrategy::CacheFirst).await.unwrap();
  assert!(store.is_empty());

  let err = http.fetch(post, FetchStrategy::CacheOnly).await.unwrap_err();
  assert!(matches!(err, CacheError::NotCached(_)));
}

#[tokio::test]
async fn test_stale_while_revalidate_without_spawner_serves_stale() {
  let (http, store, fetcher, _clock) = setup();
  store.put(URL, HttpResponse::ok(b"stale".to_vec())).unwrap();
  fetcher.serve(URL, HttpResponse::ok(b"fresh".to_vec()));

  let response = http
    .fetch(HttpRequest::get(URL), FetchStrategy::StaleWhileRevalidate)
    .await
    .unwrap();
  assert_eq!(response.body, b"stale");
  assert_eq!(fetcher.calls(), 0);
}

#[cfg(feature = "tokio")]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stale_while_revalidate_refreshes_in_background() {
  let (http, store, fetcher, _clock) = setup();
  let http = http.with_spawner(Arc::new(skein_cache::TokioSpawner::new()));
  store.put(URL, HttpResponse::ok(b"stale".to_vec())).unwrap();
  fetcher.serve(URL, HttpResponse::ok(b"fresh".to_vec()));

  let response = http
    .fetch(HttpRequest::get(URL), FetchStrategy::StaleWhileRevalidate)
    .await
    .unwrap();
  assert_eq!(response.body, b"stale");

  let deadline = Instant::now() + Duration::from_secs(2);
  while store.lookup(URL).map(|r| r.body) != Some(b"fresh".to_vec()) {
    assert!(Instant::now() < deadline, "background refresh never landed");
    tokio::time::sleep(Duration::from_millis(10)).await;
  }
  assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn test_stale_while_revalidate_fetches_on_a_miss() {
  let (http, store, fetcher, _clock) = setup();
  fetcher.serve(URL, HttpResponse::ok(b"fresh".to_vec()));

  let response = http
    .fetch(HttpRequest::get(URL), FetchStrategy::StaleWhileRevalidate)
    .await
    .unwrap();
  assert_eq!(response.body, b"fresh");
  assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn test_prefetch_reports_each_url() {
  let (http, store, fetcher, _clock) = setup();
  let cached = "https://api.example.com/cached";
  let good = "https://api.example.com/good";
  let missing = "https://api.example.com/missing";
  let broken = "https://api.example.com/broken";
  store.put(cached, HttpResponse::ok(Vec::new())).unwrap();
  fetcher.serve(good, HttpResponse::ok(b"ok".to_vec()));
  fetcher.serve(broken, HttpResponse::new(404, Vec::new()));

  let report = http.prefetch(&[cached, good, missing, broken]).await;
  assert_eq!((report.fetched, report.skipped, report.failed), (1, 1, 2));
  assert_eq!(store.keys(), vec![cached.to_string(), good.to_string()]);
}

#[tokio::test]
async fn test_bulk_invalidation() {
  let (http, store, fetcher, clock) = setup();
  let urls = [
    "https://api.example.com/users/1",
    "https://api.example.com/users/2",
    "https://api.example.com/posts/1",
  ];
  for url in urls {
    fetcher.serve(url, HttpResponse::ok(Vec::new()));
    http.fetch(HttpRequest::get(url), FetchStrategy::CacheFirst).await.unwrap();
    clock.advance(Duration::from_secs(60));
  }

  let users = Regex::new(r"/users/\d+$").unwrap();
  assert_eq!(http.invalidate_by_pattern(&users), 2);
  assert_eq!(store.keys(), vec![urls[2].to_string()]);

  for url in &urls[..2] {
    http.fetch(HttpRequest::get(*url), FetchStrategy::CacheFirst).await.unwrap();
  }
  // posts/1 is 60s old now; the refetched users are fresh.
  assert_eq!(http.clear_expired(Duration::from_secs(30)), 1);
  assert_eq!(store.len(), 2);

  clock.advance(Duration::from_secs(1));
  let cutoff = clock.now_millis();
  store.put("https://api.example.com/legacy", HttpResponse::ok(Vec::new())).unwrap();
  assert_eq!(http.invalidate_by_timestamp(cutoff), 3);
  assert!(store.is_empty());
}

#[tokio::test]
async fn test_cache_backed_response_store() {
  let clock = ManualClock::default();
  let cache: Cache<HttpResponse> = Cache::builder()
    .clock(Arc::new(clock.clone()))
    .disable_cleanup()
    .default_ttl(Duration::from_secs(30))
    .build()
    .unwrap();
  let fetcher = Arc::new(MockFetcher::default());
  fetcher.serve(URL, HttpResponse::ok(b"v1".to_vec()).header("etag", "abc"));
  let http = HttpCache::new(Arc::new(cache.clone()), fetcher.clone()).with_clock(Arc::new(clock.clone()));

  http.fetch(HttpRequest::get(URL), FetchStrategy::CacheFirst).await.unwrap();
  let cached = http.fetch(HttpRequest::get(URL), FetchStrategy::CacheFirst).await.unwrap();
  assert_eq!(cached.headers.get("etag").map(String::as_str), Some("abc"));
  assert_eq!(fetcher.calls(), 1);
  assert_eq!(cache.stats().total_requests, 0);

  // The cache's TTL applies to stored responses.
  clock.advance(Duration::from_secs(30));
  http.fetch(HttpRequest::get(URL), FetchStrategy::CacheFirst).await.unwrap();
  assert_eq!(fetcher.calls(), 2);
}
