use super::{Namespace, NamespaceStats};
use crate::error::Result;
use crate::handles::Cache;
use crate::options::SetOptions;

use std::error::Error as StdError;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const IMAGE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// A decoded-from-network image, stored as raw bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedImage {
  pub bytes: Vec<u8>,
  pub content_type: String,
  pub width: Option<u32>,
  pub height: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageCacheStats {
  pub namespace: NamespaceStats,
  /// Sum of the raw image bytes held.
  pub total_bytes: u64,
}

/// Caches images by URL and optional rendition size.
///
/// Keys are `image:{url}` or `image:{url}@{width}x{height}`.
#[derive(Debug)]
pub struct ImageCache {
  ns: Namespace<CachedImage>,
}

impl ImageCache {
  pub fn new(cache: Cache<CachedImage>) -> Self {
    Self::with_ttl(cache, IMAGE_TTL)
  }

  pub fn with_ttl(cache: Cache<CachedImage>, ttl: Duration) -> Self {
    Self {
      ns: Namespace::new(cache, "image", ttl),
    }
  }

  pub fn namespace(&self) -> &Namespace<CachedImage> {
    &self.ns
  }

  pub fn key(&self, url: &str, size: Option<(u32, u32)>) -> String {
    match size {
      Some((w, h)) => self.ns.key(&format!("{url}@{w}x{h}")),
      None => self.ns.key(url),
    }
  }

  pub fn get(&self, url: &str, size: Option<(u32, u32)>) -> Option<Arc<CachedImage>> {
    self.ns.get(&self.key(url, size))
  }

  pub fn set(&self, url: &str, size: Option<(u32, u32)>, image: CachedImage) -> Result<()> {
    self.ns.set(self.key(url, size), image, SetOptions::new())
  }

  pub async fn get_or_fetch<F, Fut, E>(
    &self,
    url: &str,
    size: Option<(u32, u32)>,
    fetch: F,
  ) -> Result<Arc<CachedImage>>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = std::result::Result<CachedImage, E>>,
    E: Into<Box<dyn StdError + Send + Sync>>,
  {
    self
      .ns
      .get_or_fetch(self.key(url, size), SetOptions::new(), fetch)
      .await
  }

  /// Warms the cache with `urls` at their original size. Failures are
  /// logged and skipped. Returns how many images are now cached.
  pub async fn preload<F, Fut, E>(&self, urls: &[&str], fetch: F) -> usize
  where
    F: Fn(String) -> Fut,
    Fut: Future<Output = std::result::Result<CachedImage, E>>,
    E: Into<Box<dyn StdError + Send + Sync>>,
  {
    let loads = urls.iter().map(|url| {
      let fetch = &fetch;
      async move {
        let result = self
          .get_or_fetch(url, None, || fetch((*url).to_string()))
          .await;
        if let Err(e) = &result {
          warn!(url = %url, error = %e, "Image preload failed.");
        }
        result.is_ok()
      }
    });
    join_all(loads).await.into_iter().filter(|ok| *ok).count()
  }

  /// Removes every cached size of `url`.
  pub fn invalidate(&self, url: &str) -> usize {
    let original = self.ns.key(url);
    let sized = format!("{original}@");
    self
      .ns
      .invalidate_where(|key| key == original || key.starts_with(&sized))
  }

  pub fn clear(&self) -> usize {
    self.ns.clear()
  }

  pub fn stats(&self) -> ImageCacheStats {
    let total_bytes = self
      .ns
      .values()
      .iter()
      .map(|(_, image)| image.bytes.len() as u64)
      .sum();
    ImageCacheStats {
      namespace: self.ns.stats(),
      total_bytes,
    }
  }
}
