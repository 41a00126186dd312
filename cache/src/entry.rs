use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

/// Bounds every cached value type must meet: values are shared across
/// threads and serialized for codecs and snapshots.
pub trait CacheValue: Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> CacheValue for T where T: Serialize + DeserializeOwned + Send + Sync + 'static {}

/// Metadata recorded alongside every cached value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMetadata {
  /// Labels attached at write time, used for bulk lookup and invalidation.
  pub tags: BTreeSet<String>,
  /// Whether the stored bytes went through the compression codec.
  pub compressed: bool,
  /// Whether the stored bytes went through the encryption codec.
  pub encrypted: bool,
  /// Size of the value's serialized form before any transform.
  pub original_size: usize,
}

/// The stored form of a value: either the value itself, or the bytes the
/// codec chain produced from it.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub(crate) enum EntryData<V> {
  Plain(Arc<V>),
  Encoded(#[serde(with = "base64_bytes")] Vec<u8>),
}

/// Codec output is written as a base64 string so snapshots don't spell out
/// every byte as a JSON number.
mod base64_bytes {
  use base64::engine::general_purpose::STANDARD;
  use base64::Engine as _;
  use serde::{Deserialize, Deserializer, Serializer};

  pub(super) fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&STANDARD.encode(bytes))
  }

  pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    let encoded = String::deserialize(deserializer)?;
    STANDARD.decode(encoded).map_err(serde::de::Error::custom)
  }
}

/// A container for a value in the cache, holding all necessary metadata.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct CacheEntry<V> {
  pub(crate) key: String,
  pub(crate) data: EntryData<V>,
  /// Write time in epoch milliseconds. Set once, when the entry is created.
  pub(crate) timestamp: u64,
  /// Lifetime in milliseconds. `None` or `0` never expires.
  pub(crate) ttl: Option<u64>,
  pub(crate) metadata: EntryMetadata,
}

impl<V> CacheEntry<V> {
  /// The instant, in epoch milliseconds, at which this entry expires.
  #[inline]
  pub(crate) fn expires_at(&self) -> Option<u64> {
    self
      .ttl
      .filter(|ttl| *ttl > 0)
      .map(|ttl| self.timestamp.saturating_add(ttl))
  }

  #[inline]
  pub(crate) fn is_expired(&self, now: u64) -> bool {
    match self.expires_at() {
      Some(expires_at) => now >= expires_at,
      None => false,
    }
  }

  #[inline]
  pub(crate) fn has_tag(&self, tag: &str) -> bool {
    self.metadata.tags.contains(tag)
  }

  pub(crate) fn info(&self) -> EntryInfo {
    EntryInfo {
      key: self.key.clone(),
      timestamp: self.timestamp,
      ttl: self.ttl.filter(|ttl| *ttl > 0).map(Duration::from_millis),
      metadata: self.metadata.clone(),
    }
  }
}

/// A read-only view of an entry's bookkeeping, without its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
  pub key: String,
  /// Write time in epoch milliseconds.
  pub timestamp: u64,
  pub ttl: Option<Duration>,
  pub metadata: EntryMetadata,
}

impl EntryInfo {
  /// Milliseconds left before expiry, or `None` if the entry never expires.
  pub fn remaining_ttl(&self, now: u64) -> Option<Duration> {
    self.ttl.map(|ttl| {
      let expires_at = self.timestamp.saturating_add(ttl.as_millis() as u64);
      Duration::from_millis(expires_at.saturating_sub(now))
    })
  }
}
