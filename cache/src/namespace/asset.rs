use super::{Namespace, NamespaceStats};
use crate::error::Result;
use crate::handles::Cache;
use crate::options::SetOptions;

use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const ASSET_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// A static asset such as a script, stylesheet or font.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedAsset {
  pub body: Vec<u8>,
  pub content_type: String,
  pub version: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssetCacheStats {
  pub namespace: NamespaceStats,
  /// Live entries per content type.
  pub by_content_type: BTreeMap<String, usize>,
}

/// Caches static assets by path and version. Keys are
/// `asset:{path}#{version}`, so a new version never serves stale bytes.
#[derive(Debug)]
pub struct AssetCache {
  ns: Namespace<CachedAsset>,
}

impl AssetCache {
  pub fn new(cache: Cache<CachedAsset>) -> Self {
    Self::with_ttl(cache, ASSET_TTL)
  }

  pub fn with_ttl(cache: Cache<CachedAsset>, ttl: Duration) -> Self {
    Self {
      ns: Namespace::new(cache, "asset", ttl),
    }
  }

  pub fn namespace(&self) -> &Namespace<CachedAsset> {
    &self.ns
  }

  pub fn key(&self, path: &str, version: &str) -> String {
    self.ns.key(&format!("{path}#{version}"))
  }

  pub fn get(&self, path: &str, version: &str) -> Option<Arc<CachedAsset>> {
    self.ns.get(&self.key(path, version))
  }

  pub fn set(&self, path: &str, asset: CachedAsset) -> Result<()> {
    let key = self.key(path, &asset.version);
    self.ns.set(key, asset, SetOptions::new())
  }

  pub async fn get_or_fetch<F, Fut, E>(
    &self,
    path: &str,
    version: &str,
    fetch: F,
  ) -> Result<Arc<CachedAsset>>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = std::result::Result<CachedAsset, E>>,
    E: Into<Box<dyn StdError + Send + Sync>>,
  {
    self
      .ns
      .get_or_fetch(self.key(path, version), SetOptions::new(), fetch)
      .await
  }

  /// Removes every cached version of `path`.
  pub fn invalidate_version(&self, path: &str) -> usize {
    let prefix = self.ns.key(&format!("{path}#"));
    self.ns.invalidate_where(|key| key.starts_with(&prefix))
  }

  /// Removes cached versions of `path` other than `current`.
  pub fn retain_version(&self, path: &str, current: &str) -> usize {
    let prefix = self.ns.key(&format!("{path}#"));
    let keep = self.key(path, current);
    self
      .ns
      .invalidate_where(|key| key.starts_with(&prefix) && key != keep)
  }

  pub fn clear(&self) -> usize {
    self.ns.clear()
  }

  pub fn stats(&self) -> AssetCacheStats {
    let mut by_content_type = BTreeMap::new();
    for (_, asset) in self.ns.values() {
      *by_content_type.entry(asset.content_type.clone()).or_insert(0) += 1;
    }
    AssetCacheStats {
      namespace: self.ns.stats(),
      by_content_type,
    }
  }
}
