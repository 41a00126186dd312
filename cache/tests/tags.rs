mod common;

use common::{build_test_cache, s};
use skein_cache::SetOptions;

use std::time::Duration;

use pretty_assertions::assert_eq;

fn tagged(tags: &[&str]) -> SetOptions {
  SetOptions::new().tags(tags.iter().copied())
}

#[test]
fn test_get_by_tag_returns_matching_entries() {
  let (cache, _clock) = build_test_cache(10);
  cache.set_with("u1", s("alice"), tagged(&["users", "admins"])).unwrap();
  cache.set_with("u2", s("bob"), tagged(&["users"])).unwrap();
  cache.set_with("p1", s("post"), tagged(&["posts"])).unwrap();

  let users: Vec<String> = cache
    .get_by_tag("users")
    .into_iter()
    .map(|(k, _)| k)
    .collect();
  assert_eq!(users, vec![s("u1"), s("u2")]);
  assert_eq!(cache.get_by_tag("admins").len(), 1);
  assert!(cache.get_by_tag("nobody").is_empty());
}

#[test]
fn test_get_by_tag_skips_expired_entries() {
  let (cache, clock) = build_test_cache(10);
  cache
    .set_with("old", s("1"), tagged(&["t"]).ttl(Duration::from_secs(1)))
    .unwrap();
  cache.set_with("new", s("2"), tagged(&["t"]).no_ttl()).unwrap();
  clock.advance(Duration::from_secs(1));

  let keys: Vec<String> = cache.get_by_tag("t").into_iter().map(|(k, _)| k).collect();
  assert_eq!(keys, vec![s("new")]);
}

#[test]
fn test_delete_by_tag_removes_only_tagged_entries() {
  let (cache, _clock) = build_test_cache(10);
  cache.set_with("a", s("1"), tagged(&["x"])).unwrap();
  cache.set_with("b", s("2"), tagged(&["x", "y"])).unwrap();
  cache.set_with("c", s("3"), tagged(&["y"])).unwrap();
  cache.set("d", s("4")).unwrap();

  assert_eq!(cache.delete_by_tag("x"), 2);
  assert_eq!(cache.keys(), vec![s("c"), s("d")]);
  assert_eq!(cache.delete_by_tag("x"), 0);
  assert_eq!(cache.stats().evictions, 0);
}

#[test]
fn test_overwrite_replaces_tags() {
  let (cache, _clock) = build_test_cache(10);
  cache.set_with("a", s("1"), tagged(&["old"])).unwrap();
  cache.set_with("a", s("2"), tagged(&["new"])).unwrap();

  assert!(cache.get_by_tag("old").is_empty());
  assert_eq!(cache.get_by_tag("new").len(), 1);
}
