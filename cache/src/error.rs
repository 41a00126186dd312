use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Errors that can occur when building a cache.
#[derive(Debug, Error)]
pub enum BuildError {
  /// The cache was configured with a `max_size` of zero.
  #[error("cache max size cannot be zero")]
  ZeroCapacity,
  /// A cleanup interval of zero would spin the janitor thread.
  #[error("cleanup interval cannot be zero, disable cleanup instead")]
  ZeroCleanupInterval,
  /// A persistent backend was configured but could not be opened.
  #[error("failed to open storage backend: {0}")]
  Storage(#[from] StorageError),
}

/// Errors raised by a persistent key/value backend.
#[derive(Debug, Error)]
pub enum StorageError {
  #[error("storage I/O failed: {0}")]
  Io(#[from] std::io::Error),

  #[error("failed to serialize state: {0}")]
  Serialize(#[from] serde_json::Error),

  #[error("storage quota exceeded writing '{key}': {needed} bytes needed, limit is {limit}")]
  QuotaExceeded {
    key: String,
    needed: usize,
    limit: usize,
  },

  #[error("storage backend failed: {0}")]
  Backend(#[source] Box<dyn StdError + Send + Sync>),

  #[error("storage backend unavailable: {0}")]
  Unavailable(String),
}

impl StorageError {
  /// Returns `true` if the backend rejected a write for lack of space.
  pub fn is_quota_exceeded(&self) -> bool {
    matches!(self, StorageError::QuotaExceeded { .. })
  }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for StorageError {
  fn from(err: rusqlite::Error) -> Self {
    StorageError::Backend(Box::new(err))
  }
}

/// A compression or encryption hook failed.
#[derive(Debug, Error)]
#[error("{codec} codec failed: {reason}")]
pub struct CodecError {
  pub codec: &'static str,
  pub reason: String,
}

impl CodecError {
  pub fn new(codec: &'static str, reason: impl Into<String>) -> Self {
    Self {
      codec,
      reason: reason.into(),
    }
  }
}

/// Errors produced while parsing a configuration document.
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to parse configuration: {0}")]
  Parse(String),

  #[error("invalid configuration value for '{field}': {message}")]
  InvalidValue { field: String, message: String },
}

/// A failed fetch, shareable between every caller waiting on the same load.
///
/// Display and `source()` are forwarded to the wrapped error so callers see
/// exactly what the fetch function returned.
#[derive(Clone)]
pub struct FetchError(Arc<dyn StdError + Send + Sync>);

impl FetchError {
  pub fn new<E>(err: E) -> Self
  where
    E: Into<Box<dyn StdError + Send + Sync>>,
  {
    Self(Arc::from(err.into()))
  }

  /// The error returned to waiters whose leading fetch was dropped.
  pub(crate) fn cancelled() -> Self {
    Self::new("fetch was cancelled before it completed")
  }

  /// Returns the wrapped error.
  pub fn inner(&self) -> &(dyn StdError + Send + Sync + 'static) {
    &*self.0
  }
}

impl fmt::Debug for FetchError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt::Debug::fmt(&*self.0, f)
  }
}

impl fmt::Display for FetchError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt::Display::fmt(&*self.0, f)
  }
}

impl StdError for FetchError {
  fn source(&self) -> Option<&(dyn StdError + 'static)> {
    self.0.source()
  }
}

/// The error type surfaced by cache operations that can fail.
///
/// Bookkeeping and transform failures never show up here; only storage
/// quota exhaustion, fetch failures and cache-only misses do.
#[derive(Debug, Error)]
pub enum CacheError {
  #[error(transparent)]
  Storage(#[from] StorageError),

  #[error(transparent)]
  Fetch(#[from] FetchError),

  #[error("no cached response for '{0}'")]
  NotCached(String),
}

/// A specialized `Result` type for cache operations.
pub type Result<T, E = CacheError> = std::result::Result<T, E>;
