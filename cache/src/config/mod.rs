//! Cache configuration.
//!
//! `CacheConfig` is the validated form every cache is built from. It can be
//! assembled through `CacheBuilder` or parsed from a YAML or JSON document
//! whose shape is described by [`raw::CacheConfigRaw`].

pub mod raw;

use crate::error::ConfigError;
use crate::policy::Strategy;
use crate::storage::{StorageBackend, DEFAULT_STATE_KEY};

use std::path::PathBuf;
use std::time::Duration;

use raw::{CacheConfigRaw, StorageBackendRaw};

pub const DEFAULT_MAX_SIZE: usize = 1000;
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Validated settings for one cache instance.
#[derive(Debug, Clone)]
pub struct CacheConfig {
  /// Entry count at which inserting a new key evicts.
  pub max_size: usize,
  /// Lifetime for entries written without an explicit TTL. `None` keeps
  /// them forever.
  pub default_ttl: Option<Duration>,
  /// Period of the background expiry sweep. `None` disables it.
  pub cleanup_interval: Option<Duration>,
  pub strategy: Strategy,
  pub enable_compression: bool,
  pub enable_encryption: bool,
  pub enable_stats: bool,
  /// Emit a `debug!` event for every hit, miss, write and eviction.
  pub enable_debug: bool,
  pub storage_backend: StorageBackend,
  /// Key the cache snapshot is stored under in a persistent backend.
  pub storage_key: String,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      max_size: DEFAULT_MAX_SIZE,
      default_ttl: Some(DEFAULT_TTL),
      cleanup_interval: Some(DEFAULT_CLEANUP_INTERVAL),
      strategy: Strategy::default(),
      enable_compression: false,
      enable_encryption: false,
      enable_stats: true,
      enable_debug: false,
      storage_backend: StorageBackend::Memory,
      storage_key: DEFAULT_STATE_KEY.to_string(),
    }
  }
}

impl CacheConfig {
  pub fn from_yaml_str(doc: &str) -> Result<Self, ConfigError> {
    let raw: CacheConfigRaw =
      serde_yaml::from_str(doc).map_err(|e| ConfigError::Parse(e.to_string()))?;
    Self::from_raw(raw)
  }

  pub fn from_json_str(doc: &str) -> Result<Self, ConfigError> {
    let raw: CacheConfigRaw =
      serde_json::from_str(doc).map_err(|e| ConfigError::Parse(e.to_string()))?;
    Self::from_raw(raw)
  }

  /// Validates a deserialized document.
  pub fn from_raw(raw: CacheConfigRaw) -> Result<Self, ConfigError> {
    if raw.max_size == 0 {
      return Err(invalid("max_size", "must be greater than zero"));
    }

    let default_ttl = match raw.default_ttl.as_deref() {
      None => Some(DEFAULT_TTL),
      Some(value) if is_disabled(value, &["never", "none"]) => None,
      Some(value) => {
        let ttl = parse_duration("default_ttl", value)?;
        (!ttl.is_zero()).then_some(ttl)
      }
    };

    let cleanup_interval = match raw.cleanup_interval.as_deref() {
      None => Some(DEFAULT_CLEANUP_INTERVAL),
      Some(value) if is_disabled(value, &["off", "disabled", "never"]) => None,
      Some(value) => {
        let interval = parse_duration("cleanup_interval", value)?;
        if interval.is_zero() {
          return Err(invalid("cleanup_interval", "must be non-zero; use \"off\" to disable"));
        }
        Some(interval)
      }
    };

    let storage_backend = match raw.storage_backend {
      StorageBackendRaw::Memory => StorageBackend::Memory,
      StorageBackendRaw::Simple { path } => StorageBackend::Simple {
        path: non_empty_path("storage_backend.path", path)?,
      },
      StorageBackendRaw::Structured { path } => StorageBackend::Structured {
        path: non_empty_path("storage_backend.path", path)?,
      },
    };

    let storage_key = match raw.storage_key {
      Some(key) if key.trim().is_empty() => {
        return Err(invalid("storage_key", "cannot be empty"));
      }
      Some(key) => key,
      None => DEFAULT_STATE_KEY.to_string(),
    };

    Ok(Self {
      max_size: raw.max_size,
      default_ttl,
      cleanup_interval,
      strategy: raw.strategy,
      enable_compression: raw.enable_compression,
      enable_encryption: raw.enable_encryption,
      enable_stats: raw.enable_stats,
      enable_debug: raw.enable_debug,
      storage_backend,
      storage_key,
    })
  }
}

fn invalid(field: &str, message: &str) -> ConfigError {
  ConfigError::InvalidValue {
    field: field.to_string(),
    message: message.to_string(),
  }
}

fn is_disabled(value: &str, words: &[&str]) -> bool {
  words.iter().any(|w| value.trim().eq_ignore_ascii_case(w))
}

fn parse_duration(field: &str, value: &str) -> Result<Duration, ConfigError> {
  humantime::parse_duration(value.trim()).map_err(|e| ConfigError::InvalidValue {
    field: field.to_string(),
    message: format!("'{value}' is not a duration: {e}"),
  })
}

fn non_empty_path(field: &str, path: String) -> Result<PathBuf, ConfigError> {
  if path.trim().is_empty() {
    return Err(invalid(field, "path cannot be empty"));
  }
  Ok(PathBuf::from(path))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_document_yields_defaults() {
    let config = CacheConfig::from_json_str("{}").unwrap();
    assert_eq!(config.max_size, 1000);
    assert_eq!(config.default_ttl, Some(Duration::from_secs(300)));
    assert_eq!(config.cleanup_interval, Some(Duration::from_secs(60)));
    assert_eq!(config.strategy, Strategy::Lru);
    assert!(config.enable_stats);
    assert_eq!(config.storage_key, "skein_cache_state");
  }

  #[test]
  fn zero_cleanup_interval_is_rejected() {
    let err = CacheConfig::from_yaml_str("cleanup_interval: 0s").unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "cleanup_interval"));
  }

  #[test]
  fn unknown_fields_are_rejected() {
    assert!(matches!(
      CacheConfig::from_yaml_str("max_sise: 10"),
      Err(ConfigError::Parse(_))
    ));
  }
}
