mod common;

use common::{build_test_cache, s, test_builder, ChannelListener};
use skein_cache::{EvictionReason, ManualClock, SetOptions, Strategy};

use std::sync::mpsc;
use std::time::Duration;

use pretty_assertions::assert_eq;

fn build_with(strategy: Strategy, max_size: usize) -> (skein_cache::Cache<String>, ManualClock) {
  let clock = ManualClock::default();
  let cache = test_builder(&clock)
    .max_size(max_size)
    .strategy(strategy)
    .build()
    .unwrap();
  (cache, clock)
}

#[test]
fn test_lru_evicts_least_recently_accessed() {
  let (cache, _clock) = build_with(Strategy::Lru, 3);
  cache.set("a", s("1")).unwrap();
  cache.set("b", s("2")).unwrap();
  cache.set("c", s("3")).unwrap();

  assert!(cache.get("a").is_some());
  cache.set("d", s("4")).unwrap();

  assert_eq!(cache.keys(), vec![s("a"), s("c"), s("d")]);
  assert_eq!(cache.stats().evictions, 1);
}

#[test]
fn test_fifo_ignores_access() {
  let (cache, _clock) = build_with(Strategy::Fifo, 3);
  for key in ["a", "b", "c"] {
    cache.set(key, s(key)).unwrap();
  }
  assert!(cache.get("a").is_some());

  cache.set("d", s("d")).unwrap();
  assert_eq!(cache.keys(), vec![s("b"), s("c"), s("d")]);
}

#[test]
fn test_fifo_holds_exactly_max_size() {
  let (cache, _clock) = build_with(Strategy::Fifo, 5);
  for i in 0..6 {
    cache.set(format!("k{i}"), format!("{i}")).unwrap();
  }
  assert_eq!(cache.len(), 5);
  assert!(!cache.has("k0"));
  assert!(cache.has("k5"));
}

#[test]
fn test_lfu_evicts_least_frequently_accessed() {
  let (cache, _clock) = build_with(Strategy::Lfu, 3);
  for key in ["a", "b", "c"] {
    cache.set(key, s(key)).unwrap();
  }
  cache.get("a");
  cache.get("a");
  cache.get("b");

  cache.set("d", s("d")).unwrap();
  assert!(!cache.has("c"));
  assert!(cache.has("a") && cache.has("b") && cache.has("d"));
}

#[test]
fn test_ttl_strategy_evicts_closest_to_expiry() {
  let (cache, _clock) = build_with(Strategy::Ttl, 3);
  cache
    .set_with("long", s("1"), SetOptions::new().ttl(Duration::from_secs(100)))
    .unwrap();
  cache
    .set_with("short", s("2"), SetOptions::new().ttl(Duration::from_secs(10)))
    .unwrap();
  cache.set_with("forever", s("3"), SetOptions::new().no_ttl()).unwrap();

  cache.set("d", s("4")).unwrap();
  assert!(!cache.has("short"));

  // "d" has the 5 minute default, so "long" goes next.
  cache.set("e", s("5")).unwrap();
  assert!(!cache.has("long"));
  assert!(cache.has("forever"));
}

#[test]
fn test_per_call_strategy_overrides_the_default() {
  let (cache, _clock) = build_with(Strategy::Lru, 3);
  for key in ["a", "b", "c"] {
    cache.set(key, s(key)).unwrap();
  }
  cache.get("a");

  // LRU would pick "b"; FIFO picks the oldest insertion.
  cache
    .set_with("d", s("d"), SetOptions::new().strategy(Strategy::Fifo))
    .unwrap();
  assert_eq!(cache.keys(), vec![s("b"), s("c"), s("d")]);

  // The default strategy is still in charge afterwards.
  cache.get("b");
  cache.set("e", s("e")).unwrap();
  assert_eq!(cache.keys(), vec![s("b"), s("d"), s("e")]);
}

#[test]
fn test_overwrite_never_evicts() {
  let (cache, _clock) = build_test_cache(2);
  cache.set("a", s("1")).unwrap();
  cache.set("b", s("2")).unwrap();
  cache.set("a", s("3")).unwrap();

  assert_eq!(cache.len(), 2);
  assert_eq!(cache.stats().evictions, 0);
}

#[test]
fn test_listener_sees_every_removal_reason() {
  let (tx, rx) = mpsc::channel();
  let clock = ManualClock::default();
  let cache = test_builder(&clock)
    .max_size(2)
    .eviction_listener(ChannelListener { sender: tx })
    .build()
    .unwrap();
  let timeout = Duration::from_secs(2);

  cache.set("1", s("one")).unwrap();
  cache.set("2", s("two")).unwrap();
  cache.set("3", s("three")).unwrap();
  let (info, reason) = rx.recv_timeout(timeout).unwrap();
  assert_eq!(info.key, "1");
  assert_eq!(reason, EvictionReason::Capacity);

  cache.delete("2");
  let (info, reason) = rx.recv_timeout(timeout).unwrap();
  assert_eq!(info.key, "2");
  assert_eq!(reason, EvictionReason::Invalidated);

  clock.advance(Duration::from_secs(10 * 60));
  assert!(cache.get("3").is_none());
  let (info, reason) = rx.recv_timeout(timeout).unwrap();
  assert_eq!(info.key, "3");
  assert_eq!(reason, EvictionReason::Expired);

  cache.set("4", s("four")).unwrap();
  cache.clear();
  let (info, reason) = rx.recv_timeout(timeout).unwrap();
  assert_eq!(info.key, "4");
  assert_eq!(reason, EvictionReason::Invalidated);
}
