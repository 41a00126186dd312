//! The serde shape of a cache configuration document.

use crate::policy::Strategy;

use serde::Deserialize;

fn default_max_size() -> usize {
  1000
}

fn default_true() -> bool {
  true
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CacheConfigRaw {
  #[serde(default = "default_max_size")]
  pub max_size: usize,
  /// A humantime duration (`"5m"`), or `"never"`. Absent means 5 minutes.
  #[serde(default)]
  pub default_ttl: Option<String>,
  /// A humantime duration, or `"off"`. Absent means 60 seconds.
  #[serde(default)]
  pub cleanup_interval: Option<String>,
  #[serde(default)]
  pub strategy: Strategy,
  #[serde(default)]
  pub enable_compression: bool,
  #[serde(default)]
  pub enable_encryption: bool,
  #[serde(default = "default_true")]
  pub enable_stats: bool,
  #[serde(default)]
  pub enable_debug: bool,
  #[serde(default)]
  pub storage_backend: StorageBackendRaw,
  #[serde(default)]
  pub storage_key: Option<String>,
}

#[derive(Debug, Deserialize, PartialEq, Default)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum StorageBackendRaw {
  #[default]
  Memory,
  Simple {
    path: String,
  },
  Structured {
    path: String,
  },
}
