use crate::entry::EntryInfo;
use crate::listener::{EvictionListener, EvictionReason};

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use fibre::mpsc;

/// A message sent to the notifier thread.
pub(crate) type Notification = (EntryInfo, EvictionReason);

const NOTIFICATION_CHANNEL_CAPACITY: usize = 128;

/// The background thread responsible for calling the user's eviction listener.
pub(crate) struct Notifier {
  _handle: JoinHandle<()>,
  sender: mpsc::BoundedSender<Notification>,
}

impl Notifier {
  /// Spawns a new notifier thread.
  pub(crate) fn spawn(listener: Arc<dyn EvictionListener>) -> Self {
    let (tx, rx): (
      mpsc::BoundedSender<Notification>,
      mpsc::BoundedReceiver<Notification>,
    ) = mpsc::bounded(NOTIFICATION_CHANNEL_CAPACITY);

    // Ends once the sender held by `Notifier` is dropped.
    let handle = thread::spawn(move || {
      while let Ok((info, reason)) = rx.recv() {
        listener.on_evict(info, reason);
      }
    });

    Self {
      _handle: handle,
      sender: tx,
    }
  }

  /// Queues a notification. A full channel drops it rather than block the
  /// cache operation that produced it.
  pub(crate) fn notify(&self, info: EntryInfo, reason: EvictionReason) {
    if self.sender.try_send((info, reason)).is_err() {
      tracing::warn!(reason = %reason, "Eviction listener is behind; notification dropped.");
    }
  }

  /// Disconnects the channel so the thread drains and exits.
  pub(crate) fn stop(self) {
    drop(self.sender);
  }
}
