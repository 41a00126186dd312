use skein_cache::http::HttpRequest;

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Retries allowed per item unless the caller asks otherwise.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// What a queued write is for. Decides which processor handles it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
  /// An outbound API call; `data` is an `HttpRequest`.
  Api,
  Analytics,
  Sync,
}

impl fmt::Display for ItemKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ItemKind::Api => write!(f, "api"),
      ItemKind::Analytics => write!(f, "analytics"),
      ItemKind::Sync => write!(f, "sync"),
    }
  }
}

/// A pending write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
  pub id: String,
  pub kind: ItemKind,
  pub data: Value,
  /// Epoch milliseconds at which the item was enqueued.
  pub timestamp: u64,
  /// Failed attempts so far.
  pub retry_count: u32,
  /// The item is dropped once `retry_count` reaches this.
  pub max_retries: u32,
}

impl QueueItem {
  pub(crate) fn from_new(item: NewItem, now: u64, default_max_retries: u32) -> Self {
    Self {
      id: generate_id(now),
      kind: item.kind,
      data: item.data,
      timestamp: now,
      retry_count: 0,
      max_retries: item.max_retries.unwrap_or(default_max_retries),
    }
  }

  /// Attempts left before the item is given up.
  pub fn remaining_attempts(&self) -> u32 {
    self.max_retries.saturating_sub(self.retry_count)
  }
}

/// An item as submitted by a caller, before it gets an id and timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct NewItem {
  pub(crate) kind: ItemKind,
  pub(crate) data: Value,
  pub(crate) max_retries: Option<u32>,
}

impl NewItem {
  pub fn new(kind: ItemKind, data: Value) -> Self {
    Self {
      kind,
      data,
      max_retries: None,
    }
  }

  /// An API call to replay later.
  pub fn api(request: &HttpRequest) -> Result<Self, serde_json::Error> {
    Ok(Self::new(ItemKind::Api, serde_json::to_value(request)?))
  }

  pub fn analytics(data: Value) -> Self {
    Self::new(ItemKind::Analytics, data)
  }

  pub fn sync(data: Value) -> Self {
    Self::new(ItemKind::Sync, data)
  }

  pub fn max_retries(mut self, max_retries: u32) -> Self {
    self.max_retries = Some(max_retries);
    self
  }
}

fn generate_id(now: u64) -> String {
  let suffix: u64 = rand::rng().random();
  format!("{now:x}-{suffix:016x}")
}
