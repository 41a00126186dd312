//! A durable queue of writes made while offline, replayed in order once
//! connectivity returns.
//!
//! Items are persisted through the same storage backends as `skein_cache`,
//! so a queue survives restarts. Each failed delivery bumps the item's retry
//! count; an item that exhausts its retries is dropped and reported through
//! a [`QueueEvent::GaveUp`] event.
//!
//! ```
//! use skein_offline::{processor_fn, ConnectivityEvent, NewItem, OfflineQueue};
//! use serde_json::json;
//!
//! let queue = OfflineQueue::builder(processor_fn(|_item| async {
//!   Ok::<(), std::io::Error>(())
//! }))
//! .online(false)
//! .build()
//! .unwrap();
//!
//! queue.add_item(NewItem::analytics(json!({"event": "opened"})));
//! let report = futures_executor::block_on(queue.handle_connectivity(ConnectivityEvent::Online));
//! assert_eq!(report.unwrap().succeeded, 1);
//! assert!(queue.is_empty());
//! ```

pub mod error;
pub mod event;
pub mod item;
pub mod processor;
pub mod queue;

pub use error::QueueError;
pub use event::{ConnectivityEvent, QueueEvent};
pub use item::{ItemKind, NewItem, QueueItem, DEFAULT_MAX_RETRIES};
pub use processor::{processor_fn, Dispatcher, FnProcessor, ItemProcessor};
pub use queue::{OfflineQueue, ProcessReport, QueueBuilder, SubmitOutcome, DEFAULT_QUEUE_KEY};
