//! Fan-out hub: one producer, many independent drop-on-full subscriber
//! queues.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use linkdns_protocol::queue::{self, Offer};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::trace;

#[derive(Debug)]
struct Hub<T> {
    subscribers: HashMap<u64, mpsc::Sender<T>>,
    next_id: u64,
    closed: bool,
}

/// Publishes every message to every current subscriber.
///
/// A subscriber whose queue is full misses the message; the others are
/// unaffected. Cloning yields another handle to the same hub.
#[derive(Debug)]
pub struct Broadcaster<T> {
    hub: Arc<Mutex<Hub<T>>>,
    depth: usize,
}

impl<T> Clone for Broadcaster<T> {
    fn clone(&self) -> Self {
        Self {
            hub: Arc::clone(&self.hub),
            depth: self.depth,
        }
    }
}

impl<T: Clone> Broadcaster<T> {
    /// A hub whose subscriber queues hold `depth` items (at least one).
    pub fn new(depth: usize) -> Self {
        Self {
            hub: Arc::new(Mutex::new(Hub {
                subscribers: HashMap::new(),
                next_id: 0,
                closed: false,
            })),
            depth: depth.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Hub<T>> {
        self.hub.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new subscriber.
    ///
    /// After [`close`](Self::close) this still succeeds, returning a
    /// subscription that is already closed and empty.
    pub fn subscribe(&self) -> Subscription<T> {
        let mut hub = self.lock();
        if hub.closed {
            return Subscription {
                id: None,
                rx: queue::closed(),
                hub: Weak::new(),
            };
        }
        let id = hub.next_id;
        hub.next_id += 1;
        let (tx, rx) = queue::bounded(self.depth);
        hub.subscribers.insert(id, tx);
        Subscription {
            id: Some(id),
            rx,
            hub: Arc::downgrade(&self.hub),
        }
    }

    /// Offer `msg` to every subscriber without waiting. Returns how many
    /// subscribers accepted it. A no-op once closed.
    pub fn publish(&self, msg: &T) -> usize {
        let mut hub = self.lock();
        if hub.closed {
            return 0;
        }
        let mut delivered = 0;
        hub.subscribers.retain(|id, tx| match queue::offer(tx, msg.clone()) {
            Offer::Enqueued => {
                delivered += 1;
                true
            }
            Offer::Dropped => {
                trace!(subscriber = id, "subscriber queue full; dropping message");
                true
            }
            Offer::Closed => false,
        });
        delivered
    }

    /// Close every subscriber queue and refuse new ones. Idempotent.
    ///
    /// Messages already queued can still be read; after that each
    /// subscription yields `None`.
    pub fn close(&self) {
        let mut hub = self.lock();
        hub.closed = true;
        hub.subscribers.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }
}

/// One subscriber's queue. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription<T> {
    id: Option<u64>,
    rx: mpsc::Receiver<T>,
    hub: Weak<Mutex<Hub<T>>>,
}

impl<T> Subscription<T> {
    /// The next message, or `None` once the hub is closed and the queue
    /// drained.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Result<T, TryRecvError> {
        self.rx.try_recv()
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let (Some(id), Some(hub)) = (self.id, self.hub.upgrade()) {
            hub.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .subscribers
                .remove(&id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_subscriber_sees_every_message() {
        let hub = Broadcaster::new(4);
        let mut subs: Vec<_> = (0..3).map(|_| hub.subscribe()).collect();

        assert_eq!(hub.publish(&"a"), 3);
        assert_eq!(hub.publish(&"b"), 3);

        for sub in &mut subs {
            assert_eq!(sub.recv().await, Some("a"));
            assert_eq!(sub.recv().await, Some("b"));
        }
    }

    #[tokio::test]
    async fn full_subscriber_misses_message_others_do_not() {
        let hub = Broadcaster::new(1);
        let mut slow = hub.subscribe();
        let mut fast = hub.subscribe();

        assert_eq!(hub.publish(&1), 2);
        assert_eq!(fast.recv().await, Some(1));

        // slow still holds 1, so 2 is dropped for it only
        assert_eq!(hub.publish(&2), 1);
        assert_eq!(fast.recv().await, Some(2));
        assert_eq!(slow.recv().await, Some(1));
        assert!(slow.try_recv().is_err());
    }

    #[tokio::test]
    async fn subscribe_after_close_is_closed_and_empty() {
        let hub = Broadcaster::<u32>::new(4);
        hub.close();
        let mut sub = hub.subscribe();
        assert_eq!(sub.recv().await, None);
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn publish_after_close_is_ignored() {
        let hub = Broadcaster::new(4);
        let mut sub = hub.subscribe();
        hub.publish(&"before");
        hub.close();
        assert_eq!(hub.publish(&"after"), 0);

        assert_eq!(sub.recv().await, Some("before"));
        assert_eq!(sub.recv().await, None);
    }

    #[tokio::test]
    async fn close_is_idempotent_and_wakes_pending_reader() {
        let hub = Broadcaster::<u32>::new(4);
        let mut sub = hub.subscribe();
        let reader = tokio::spawn(async move { sub.recv().await });

        tokio::task::yield_now().await;
        hub.close();
        hub.close();
        assert!(hub.is_closed());
        assert_eq!(reader.await.unwrap(), None);
    }

    #[test]
    fn dropping_subscription_unsubscribes() {
        let hub = Broadcaster::<u32>::new(4);
        let sub = hub.subscribe();
        let _other = hub.subscribe();
        assert_eq!(hub.subscriber_count(), 2);
        drop(sub);
        assert_eq!(hub.subscriber_count(), 1);
    }

    #[test]
    fn subscription_outliving_hub_drops_cleanly() {
        let hub = Broadcaster::<u32>::new(4);
        let sub = hub.subscribe();
        drop(hub);
        drop(sub);
    }
}
