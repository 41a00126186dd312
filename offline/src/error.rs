use skein_cache::StorageError;

use thiserror::Error;

/// Errors raised while building or persisting an offline queue.
#[derive(Debug, Error)]
pub enum QueueError {
  /// The configured backend could not be opened.
  #[error("failed to open queue storage: {0}")]
  Storage(#[from] StorageError),

  /// An item payload could not be encoded.
  #[error("failed to encode queue item payload: {0}")]
  Payload(#[from] serde_json::Error),
}
