use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use miniblog_protocol::Frame;
use tokio::sync::mpsc::{self, error::TrySendError};
use uuid::Uuid;

/// Opaque identity of one live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Outcome of handing one frame to a subscriber's queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    Delivered,
    /// Queue full; the frame was discarded. Carries the lifetime drop count.
    Dropped { total: u64 },
    /// The receiving session is gone.
    Closed,
}

/// Delivery endpoint a backend keeps for each group member.
///
/// Wraps the sending half of the session's bounded queue. Offers never wait:
/// a full queue drops the frame instead of stalling the publisher.
#[derive(Debug, Clone)]
pub struct SubscriberHandle {
    id: SubscriberId,
    tx: mpsc::Sender<Frame>,
    dropped: Arc<AtomicU64>,
}

impl SubscriberHandle {
    /// Create a handle and the queue its session drains.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = Self {
            id: SubscriberId::new(),
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        };
        (handle, rx)
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn offer(&self, frame: Frame) -> Offer {
        match self.tx.try_send(frame) {
            Ok(()) => Offer::Delivered,
            Err(TrySendError::Full(_)) => {
                let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                Offer::Dropped { total }
            }
            Err(TrySendError::Closed(_)) => Offer::Closed,
        }
    }

    #[cfg(test)]
    fn drop_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_queue_drops_and_counts() {
        let (handle, mut rx) = SubscriberHandle::channel(1);
        assert_eq!(handle.offer(Frame::from("a")), Offer::Delivered);
        assert_eq!(handle.offer(Frame::from("b")), Offer::Dropped { total: 1 });
        assert_eq!(handle.offer(Frame::from("c")), Offer::Dropped { total: 2 });
        assert_eq!(&*rx.try_recv().unwrap(), "a");
        assert_eq!(handle.offer(Frame::from("d")), Offer::Delivered);
        assert_eq!(handle.drop_count(), 2);
    }

    #[test]
    fn closed_receiver_is_reported() {
        let (handle, rx) = SubscriberHandle::channel(4);
        drop(rx);
        assert_eq!(handle.offer(Frame::from("a")), Offer::Closed);
    }

    #[test]
    fn ids_are_unique() {
        let (a, _ra) = SubscriberHandle::channel(1);
        let (b, _rb) = SubscriberHandle::channel(1);
        assert_ne!(a.id(), b.id());
    }
}
