mod common;

use common::s;
use skein_cache::namespace::{AssetCache, CachedAsset, CachedImage, ImageCache, Namespace, QueryCache};
use skein_cache::{Cache, CacheBuilder, CacheError, ManualClock, MemoryStore, SetOptions, StorageBackend};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;

fn shared_cache<V: skein_cache::CacheValue>(clock: &ManualClock) -> Cache<V> {
  CacheBuilder::new()
    .clock(Arc::new(clock.clone()))
    .disable_cleanup()
    .build()
    .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_misses_share_one_fetch() {
  let clock = ManualClock::default();
  let queries = Arc::new(QueryCache::<String>::new(shared_cache(&clock)));
  let fetches = Arc::new(AtomicUsize::new(0));

  let tasks: Vec<_> = (0..16)
    .map(|_| {
      let queries = queries.clone();
      let fetches = fetches.clone();
      tokio::spawn(async move {
        queries
          .get_or_fetch("users", &json!({"page": 1}), &["users"], || async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            fetches.fetch_add(1, Ordering::SeqCst);
            Ok::<_, std::io::Error>(s("[alice, bob]"))
          })
          .await
      })
    })
    .collect();

  for task in tasks {
    let value = task.await.unwrap().unwrap();
    assert_eq!(*value, "[alice, bob]");
  }
  assert_eq!(fetches.load(Ordering::SeqCst), 1);
  assert_eq!(queries.stats().in_flight, 0);
  assert_eq!(
    queries.get("users", &json!({"page": 1})).as_deref(),
    Some(&s("[alice, bob]"))
  );
}

#[tokio::test]
async fn test_failed_fetch_caches_nothing() {
  let clock = ManualClock::default();
  let queries = QueryCache::<String>::new(shared_cache(&clock));

  let err = queries
    .get_or_fetch("feed", &json!(null), &[], || async {
      Err::<String, _>("backend returned 503")
    })
    .await
    .unwrap_err();
  match err {
    CacheError::Fetch(e) => assert_eq!(e.to_string(), "backend returned 503"),
    other => panic!("expected a fetch error, got {other:?}"),
  }
  assert!(queries.get("feed", &json!(null)).is_none());

  // The next call fetches again.
  let value = queries
    .get_or_fetch("feed", &json!(null), &[], || async {
      Ok::<_, std::io::Error>(s("fresh"))
    })
    .await
    .unwrap();
  assert_eq!(*value, "fresh");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_waiters_receive_the_leaders_error() {
  let clock = ManualClock::default();
  let queries = Arc::new(QueryCache::<String>::new(shared_cache(&clock)));
  let fetches = Arc::new(AtomicUsize::new(0));

  let tasks: Vec<_> = (0..4)
    .map(|_| {
      let queries = queries.clone();
      let fetches = fetches.clone();
      tokio::spawn(async move {
        queries
          .get_or_fetch("slow", &json!({}), &[], || async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            fetches.fetch_add(1, Ordering::SeqCst);
            Err::<String, _>("timed out")
          })
          .await
      })
    })
    .collect();

  for task in tasks {
    let err = task.await.unwrap().unwrap_err();
    assert_eq!(err.to_string(), "timed out");
  }
  assert_eq!(fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_waiters_receive_the_leaders_quota_error() {
  let clock = ManualClock::default();
  let cache = CacheBuilder::<String>::new()
    .clock(Arc::new(clock.clone()))
    .disable_cleanup()
    .storage_backend(StorageBackend::Custom(Arc::new(MemoryStore::with_quota(2048))))
    .build()
    .unwrap();
  let queries = Arc::new(QueryCache::new(cache));
  let fetches = Arc::new(AtomicUsize::new(0));

  let tasks: Vec<_> = (0..4)
    .map(|_| {
      let queries = queries.clone();
      let fetches = fetches.clone();
      tokio::spawn(async move {
        queries
          .get_or_fetch("export", &json!({}), &[], || async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            fetches.fetch_add(1, Ordering::SeqCst);
            Ok::<_, std::io::Error>("x".repeat(4096))
          })
          .await
      })
    })
    .collect();

  for task in tasks {
    match task.await.unwrap().unwrap_err() {
      CacheError::Storage(e) => assert!(e.is_quota_exceeded()),
      other => panic!("expected a quota error, got {other:?}"),
    }
  }
  assert_eq!(fetches.load(Ordering::SeqCst), 1);
  // The value still serves reads from memory.
  assert_eq!(queries.get("export", &json!({})).map(|v| v.len()), Some(4096));
}

#[test]
fn test_query_keys_are_canonical() {
  let clock = ManualClock::default();
  let queries = QueryCache::<String>::new(shared_cache(&clock));

  assert_eq!(queries.key("users", &json!({})), "query:users");
  assert_eq!(queries.key("users", &json!(null)), "query:users");
  assert_eq!(
    queries.key("users", &json!({"b": 1, "a": 2})),
    queries.key("users", &json!({"a": 2, "b": 1}))
  );
  assert_eq!(
    queries.key("users", &json!({"page": 3})),
    r#"query:users?{"page":3}"#
  );
}

#[test]
fn test_query_invalidation_by_endpoint_and_tag() {
  let clock = ManualClock::default();
  let queries = QueryCache::<String>::new(shared_cache(&clock));

  queries.set("users", &json!({}), s("all"), &["people"]).unwrap();
  queries.set("users", &json!({"page": 2}), s("page 2"), &["people"]).unwrap();
  queries.set("users_count", &json!({}), s("2"), &[]).unwrap();
  queries.set("posts", &json!({}), s("posts"), &["content"]).unwrap();

  assert_eq!(queries.invalidate("users"), 2);
  assert!(queries.get("users_count", &json!({})).is_some());

  assert_eq!(queries.invalidate_tags(&["content"]), 1);
  assert_eq!(queries.stats().entries, 1);
}

#[test]
fn test_namespace_applies_its_ttl_and_tag() {
  let clock = ManualClock::default();
  let cache: Cache<String> = shared_cache(&clock);
  let ns = Namespace::new(cache.clone(), "session", Duration::from_secs(60));

  ns.set(ns.key("abc"), s("token"), SetOptions::new()).unwrap();
  let info = cache.entry_info("session:abc").unwrap();
  assert_eq!(info.ttl, Some(Duration::from_secs(60)));
  assert!(info.metadata.tags.contains("ns:session"));

  // An explicit TTL wins over the namespace's.
  ns.set(
    ns.key("long"),
    s("token"),
    SetOptions::new().ttl(Duration::from_secs(600)),
  )
  .unwrap();
  assert_eq!(
    cache.entry_info("session:long").unwrap().ttl,
    Some(Duration::from_secs(600))
  );

  clock.advance(Duration::from_secs(60));
  assert!(ns.get("session:abc").is_none());
  assert!(ns.get("session:long").is_some());
}

#[test]
fn test_clearing_one_namespace_leaves_others() {
  let clock = ManualClock::default();
  let cache: Cache<String> = shared_cache(&clock);
  let first = Namespace::new(cache.clone(), "first", Duration::from_secs(60));
  let second = Namespace::new(cache.clone(), "second", Duration::from_secs(60));
  cache.set("global", s("g")).unwrap();

  first.set(first.key("a"), s("1"), SetOptions::new()).unwrap();
  first.set(first.key("b"), s("2"), SetOptions::new()).unwrap();
  second.set(second.key("a"), s("3"), SetOptions::new()).unwrap();
  first.get("first:a");
  first.get("first:zzz");

  let stats = first.stats();
  assert_eq!((stats.hits, stats.misses, stats.entries), (1, 1, 2));
  assert_eq!(stats.hit_rate, 0.5);

  assert_eq!(first.clear(), 2);
  let stats = first.stats();
  assert_eq!((stats.hits, stats.misses, stats.entries), (0, 0, 0));
  assert_eq!(cache.keys(), vec![s("global"), s("second:a")]);
}

fn image(bytes: usize) -> CachedImage {
  CachedImage {
    bytes: vec![7; bytes],
    content_type: s("image/png"),
    width: Some(10),
    height: Some(10),
  }
}

#[tokio::test]
async fn test_image_cache_sizes_and_preload() {
  let clock = ManualClock::default();
  let images = ImageCache::new(shared_cache(&clock));

  assert_eq!(
    images.key("https://cdn/x.png", Some((64, 32))),
    "image:https://cdn/x.png@64x32"
  );
  images.set("https://cdn/x.png", None, image(100)).unwrap();
  images.set("https://cdn/x.png", Some((64, 32)), image(10)).unwrap();

  let loaded = images
    .preload(&["https://cdn/x.png", "https://cdn/y.png", "https://cdn/bad.png"], |url| async move {
      if url.contains("bad") {
        Err("404")
      } else {
        Ok(image(50))
      }
    })
    .await;
  assert_eq!(loaded, 2);
  // x.png was already cached, so only y.png was fetched.
  assert_eq!(images.get("https://cdn/x.png", None).unwrap().bytes.len(), 100);
  assert_eq!(images.stats().total_bytes, 160);

  assert_eq!(images.invalidate("https://cdn/x.png"), 2);
  assert_eq!(images.stats().namespace.entries, 1);
}

fn asset(version: &str, content_type: &str) -> CachedAsset {
  CachedAsset {
    body: b"body".to_vec(),
    content_type: s(content_type),
    version: s(version),
  }
}

#[test]
fn test_asset_versions() {
  let clock = ManualClock::default();
  let assets = AssetCache::new(shared_cache(&clock));

  assets.set("/app.js", asset("1", "text/javascript")).unwrap();
  assets.set("/app.js", asset("2", "text/javascript")).unwrap();
  assets.set("/app.css", asset("1", "text/css")).unwrap();
  assert_eq!(assets.key("/app.js", "2"), "asset:/app.js#2");

  let stats = assets.stats();
  assert_eq!(stats.by_content_type.get("text/javascript"), Some(&2));
  assert_eq!(stats.by_content_type.get("text/css"), Some(&1));

  assert_eq!(assets.retain_version("/app.js", "2"), 1);
  assert!(assets.get("/app.js", "1").is_none());
  assert!(assets.get("/app.js", "2").is_some());

  assert_eq!(assets.invalidate_version("/app.js"), 1);
  assert!(assets.get("/app.css", "1").is_some());
}
