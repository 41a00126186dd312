use crate::error::QueueError;
use crate::event::{ConnectivityEvent, QueueEvent, Subscribers};
use crate::item::{NewItem, QueueItem, DEFAULT_MAX_RETRIES};
use crate::processor::ItemProcessor;

use skein_cache::time::system_clock;
use skein_cache::{Clock, SnapshotStore, StorageBackend};

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use fibre::mpsc;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

/// Key under which the queue is persisted unless configured otherwise.
pub const DEFAULT_QUEUE_KEY: &str = "skein_offline_queue";

/// Outcome of one `process_queue` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessReport {
  /// Items handed to the processor.
  pub attempted: usize,
  pub succeeded: usize,
  /// Failed items put back for a later drain.
  pub requeued: usize,
  /// Failed items that ran out of retries.
  pub dropped: usize,
  /// `true` if another drain was already running and this call did nothing.
  pub skipped: bool,
}

/// Result of `OfflineQueue::submit`.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
  /// Sent straight away.
  Delivered,
  /// Offline, or the immediate attempt failed; the item was queued.
  Queued(QueueItem),
}

/// A builder for creating `OfflineQueue` instances.
pub struct QueueBuilder {
  processor: Arc<dyn ItemProcessor>,
  backend: StorageBackend,
  key: String,
  clock: Option<Arc<dyn Clock>>,
  default_max_retries: u32,
  online: bool,
}

impl fmt::Debug for QueueBuilder {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("QueueBuilder")
      .field("backend", &self.backend)
      .field("key", &self.key)
      .field("default_max_retries", &self.default_max_retries)
      .field("online", &self.online)
      .finish_non_exhaustive()
  }
}

impl QueueBuilder {
  pub fn new<P: ItemProcessor + 'static>(processor: P) -> Self {
    Self::with_processor(Arc::new(processor))
  }

  pub fn with_processor(processor: Arc<dyn ItemProcessor>) -> Self {
    Self {
      processor,
      backend: StorageBackend::Memory,
      key: DEFAULT_QUEUE_KEY.to_string(),
      clock: None,
      default_max_retries: DEFAULT_MAX_RETRIES,
      online: true,
    }
  }

  pub fn storage_backend(mut self, backend: StorageBackend) -> Self {
    self.backend = backend;
    self
  }

  pub fn storage_key(mut self, key: impl Into<String>) -> Self {
    self.key = key.into();
    self
  }

  pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
    self.clock = Some(clock);
    self
  }

  /// Retries for items that don't set their own.
  pub fn default_max_retries(mut self, max_retries: u32) -> Self {
    self.default_max_retries = max_retries;
    self
  }

  /// Whether the queue starts out believing it is online. Defaults to `true`.
  pub fn online(mut self, online: bool) -> Self {
    self.online = online;
    self
  }

  /// Builds the queue, reloading any items persisted under its key.
  pub fn build(self) -> Result<OfflineQueue, QueueError> {
    let persistence = self
      .backend
      .open()?
      .map(|store| SnapshotStore::<Vec<QueueItem>>::new(store, self.key.clone()));

    let items: VecDeque<QueueItem> = persistence
      .as_ref()
      .and_then(SnapshotStore::load)
      .map(VecDeque::from)
      .unwrap_or_default();
    if !items.is_empty() {
      info!(items = items.len(), "Restored offline queue.");
    }

    Ok(OfflineQueue {
      inner: Arc::new(QueueInner {
        items: Mutex::new(items),
        processor: self.processor,
        persistence,
        clock: self.clock.unwrap_or_else(system_clock),
        busy: AtomicBool::new(false),
        online: AtomicBool::new(self.online),
        subscribers: Subscribers::default(),
        default_max_retries: self.default_max_retries,
      }),
    })
  }
}

struct QueueInner {
  items: Mutex<VecDeque<QueueItem>>,
  processor: Arc<dyn ItemProcessor>,
  persistence: Option<SnapshotStore<Vec<QueueItem>>>,
  clock: Arc<dyn Clock>,
  busy: AtomicBool,
  online: AtomicBool,
  subscribers: Subscribers,
  default_max_retries: u32,
}

/// A durable FIFO of writes waiting for connectivity.
///
/// Cheap to clone; clones share the same queue.
#[derive(Clone)]
pub struct OfflineQueue {
  inner: Arc<QueueInner>,
}

impl fmt::Debug for OfflineQueue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("OfflineQueue")
      .field("len", &self.len())
      .field("online", &self.is_online())
      .field("busy", &self.inner.busy.load(Ordering::Relaxed))
      .field("subscribers", &self.inner.subscribers.len())
      .field("persistence", &self.inner.persistence)
      .finish()
  }
}

// Clears the busy flag when a drain ends, however it ends.
struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
  fn drop(&mut self) {
    self.0.store(false, Ordering::Release);
  }
}

impl OfflineQueue {
  pub fn builder<P: ItemProcessor + 'static>(processor: P) -> QueueBuilder {
    QueueBuilder::new(processor)
  }

  /// Appends an item and persists the queue. Returns the item as stored,
  /// with its id and timestamp assigned.
  pub fn add_item(&self, item: NewItem) -> QueueItem {
    let item = self.materialize(item);
    self.push(item.clone());
    item
  }

  fn materialize(&self, item: NewItem) -> QueueItem {
    QueueItem::from_new(item, self.inner.clock.now_millis(), self.inner.default_max_retries)
  }

  fn push(&self, item: QueueItem) {
    {
      let mut items = self.inner.items.lock();
      items.push_back(item.clone());
      self.persist_locked(&items);
    }
    debug!(id = %item.id, kind = %item.kind, "Queued offline item.");
    self.inner.subscribers.publish(QueueEvent::Enqueued(item));
  }

  pub fn len(&self) -> usize {
    self.inner.items.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// A copy of the queued items, oldest first.
  pub fn items(&self) -> Vec<QueueItem> {
    self.inner.items.lock().iter().cloned().collect()
  }

  /// Drops every queued item. Returns how many were dropped.
  pub fn clear(&self) -> usize {
    let mut items = self.inner.items.lock();
    let count = items.len();
    items.clear();
    self.persist_locked(&items);
    count
  }

  pub fn is_online(&self) -> bool {
    self.inner.online.load(Ordering::Acquire)
  }

  /// Returns `true` while a drain is running.
  pub fn is_processing(&self) -> bool {
    self.inner.busy.load(Ordering::Acquire)
  }

  /// Receives every `QueueEvent` from now on. Dropping the receiver
  /// unsubscribes.
  pub fn subscribe(&self) -> mpsc::BoundedReceiver<QueueEvent> {
    self.inner.subscribers.subscribe()
  }

  /// Records a connectivity change. Coming online drains the queue and
  /// returns the drain's report.
  pub async fn handle_connectivity(&self, event: ConnectivityEvent) -> Option<ProcessReport> {
    match event {
      ConnectivityEvent::Online => {
        self.inner.online.store(true, Ordering::Release);
        info!(queued = self.len(), "Connectivity restored; draining offline queue.");
        Some(self.process_queue().await)
      }
      ConnectivityEvent::Offline => {
        self.inner.online.store(false, Ordering::Release);
        debug!("Connectivity lost; writes will be queued.");
        None
      }
    }
  }

  /// Sends `item` now if online, falling back to the queue when offline or
  /// when the attempt fails.
  pub async fn submit(&self, item: NewItem) -> SubmitOutcome {
    let item = self.materialize(item);
    if !self.is_online() {
      self.push(item.clone());
      return SubmitOutcome::Queued(item);
    }
    match self.inner.processor.process(&item).await {
      Ok(()) => {
        self.inner.subscribers.publish(QueueEvent::Delivered(item));
        SubmitOutcome::Delivered
      }
      Err(e) => {
        warn!(id = %item.id, error = %e, "Immediate delivery failed; queueing.");
        self.push(item.clone());
        SubmitOutcome::Queued(item)
      }
    }
  }

  /// Attempts every queued item once, in order.
  ///
  /// The queue is snapshotted and emptied first, so items added during the
  /// drain wait for the next one. A failed item goes to the back of the
  /// queue until it has failed `max_retries` times, after which it is
  /// dropped and a `QueueEvent::GaveUp` is published. A call made while
  /// another drain is running returns at once with `skipped` set.
  pub async fn process_queue(&self) -> ProcessReport {
    let inner = &self.inner;
    if inner
      .busy
      .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
      .is_err()
    {
      debug!("Offline queue drain already running; skipping.");
      return ProcessReport {
        skipped: true,
        ..Default::default()
      };
    }
    let _guard = DrainGuard(&inner.busy);

    let batch: Vec<QueueItem> = {
      let mut items = inner.items.lock();
      let batch = items.drain(..).collect();
      self.persist_locked(&items);
      batch
    };

    let mut report = ProcessReport::default();
    for mut item in batch {
      report.attempted += 1;
      match inner.processor.process(&item).await {
        Ok(()) => {
          report.succeeded += 1;
          debug!(id = %item.id, kind = %item.kind, "Delivered offline item.");
          inner.subscribers.publish(QueueEvent::Delivered(item));
        }
        Err(e) => {
          item.retry_count += 1;
          let error = e.to_string();
          if item.retry_count < item.max_retries {
            report.requeued += 1;
            debug!(id = %item.id, attempt = item.retry_count, error = %error, "Offline item failed; will retry.");
            inner.items.lock().push_back(item.clone());
            inner.subscribers.publish(QueueEvent::Retrying { item, error });
          } else {
            report.dropped += 1;
            warn!(id = %item.id, kind = %item.kind, attempts = item.retry_count, error = %error, "Giving up on offline item.");
            inner.subscribers.publish(QueueEvent::GaveUp { item, error });
          }
        }
      }
    }

    let items = inner.items.lock();
    if !items.is_empty() {
      self.persist_locked(&items);
    }
    report
  }

  fn persist_locked(&self, items: &VecDeque<QueueItem>) {
    if let Some(persistence) = &self.inner.persistence {
      if let Err(e) = persistence.save(items) {
        warn!(error = %e, "Failed to persist offline queue; skipping this cycle.");
      }
    }
  }
}
