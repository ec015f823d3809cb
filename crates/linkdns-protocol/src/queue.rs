//! Bounded, drop-on-full queues.
//!
//! Every queue in linkdns (the inbound queue of a transport and each
//! subscriber queue of a broadcaster) is a bounded tokio channel fed with
//! [`offer`]: the producer never waits, a full queue drops the new item.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Outcome of a non-blocking enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    Enqueued,
    /// The queue was full; the item was discarded.
    Dropped,
    /// The consumer is gone; the item was discarded.
    Closed,
}

/// A bounded queue holding at most `depth` items (at least one).
pub fn bounded<T>(depth: usize) -> (mpsc::Sender<T>, mpsc::Receiver<T>) {
    mpsc::channel(depth.max(1))
}

/// A queue that is already closed: its receiver yields `None` immediately.
pub fn closed<T>() -> mpsc::Receiver<T> {
    let (_, rx) = mpsc::channel(1);
    rx
}

/// Enqueue `item` without waiting.
pub fn offer<T>(tx: &mpsc::Sender<T>, item: T) -> Offer {
    match tx.try_send(item) {
        Ok(()) => Offer::Enqueued,
        Err(TrySendError::Full(_)) => Offer::Dropped,
        Err(TrySendError::Closed(_)) => Offer::Closed,
    }
}
