use crate::item::QueueItem;

use fibre::mpsc;
use parking_lot::Mutex;

const SUBSCRIBER_CHANNEL_CAPACITY: usize = 64;

/// Connectivity changes reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityEvent {
  Online,
  Offline,
}

/// What happened to a queued item.
#[derive(Debug, Clone, PartialEq)]
pub enum QueueEvent {
  Enqueued(QueueItem),
  Delivered(QueueItem),
  /// An attempt failed and the item went back on the queue.
  Retrying { item: QueueItem, error: String },
  /// The final attempt failed and the item was dropped.
  GaveUp { item: QueueItem, error: String },
}

/// Fans events out to every live subscriber.
#[derive(Default)]
pub(crate) struct Subscribers {
  senders: Mutex<Vec<mpsc::BoundedSender<QueueEvent>>>,
}

impl Subscribers {
  pub(crate) fn subscribe(&self) -> mpsc::BoundedReceiver<QueueEvent> {
    let (tx, rx): (
      mpsc::BoundedSender<QueueEvent>,
      mpsc::BoundedReceiver<QueueEvent>,
    ) = mpsc::bounded(SUBSCRIBER_CHANNEL_CAPACITY);
    self.senders.lock().push(tx);
    rx
  }

  /// Sends `event` to every subscriber. Subscribers whose receiver is gone
  /// are dropped; a full subscriber misses the event.
  pub(crate) fn publish(&self, event: QueueEvent) {
    let mut senders = self.senders.lock();
    if senders.is_empty() {
      return;
    }
    senders.retain(|tx| !tx.is_closed());
    for tx in senders.iter() {
      if tx.try_send(event.clone()).is_err() {
        tracing::warn!("Queue event subscriber is full; event dropped.");
      }
    }
  }

  pub(crate) fn len(&self) -> usize {
    self.senders.lock().len()
  }
}
