//! Single-slot latest-frame channel between the capture reader and the
//! stream clients. Only the newest frame is kept; readers never block the
//! producer and always see a whole, immutable frame.

use bytes::Bytes;
use std::time::Duration;
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Increments on every published frame.
    pub seq: u64,
    pub jpeg: Bytes,
}

pub fn frame_channel() -> (FrameSlot, FrameSource) {
    let (tx, rx) = watch::channel(None);
    (FrameSlot { tx, next_seq: 0 }, FrameSource { rx })
}

/// Producer half. Dropping it marks the relay as ended.
#[derive(Debug)]
pub struct FrameSlot {
    tx: watch::Sender<Option<Frame>>,
    next_seq: u64,
}

impl FrameSlot {
    /// Replace the current frame. A frame byte-identical to the current one
    /// is not published and `false` is returned.
    pub fn publish(&mut self, jpeg: Bytes) -> bool {
        let seq = self.next_seq;
        let published = self.tx.send_if_modified(|slot| {
            if slot.as_ref().is_some_and(|f| f.jpeg == jpeg) {
                return false;
            }
            *slot = Some(Frame { seq, jpeg });
            true
        });
        if published {
            self.next_seq += 1;
        }
        published
    }
}

#[derive(Debug, Clone)]
pub struct FrameSource {
    rx: watch::Receiver<Option<Frame>>,
}

impl FrameSource {
    /// False once the producer is gone.
    pub fn is_live(&self) -> bool {
        self.rx.has_changed().is_ok()
    }

    pub fn latest(&self) -> Option<Frame> {
        self.rx.borrow().clone()
    }

    /// A per-client cursor. Its first `next` yields the current frame, if any.
    pub fn subscribe(&self) -> FrameFeed {
        FrameFeed { rx: self.rx.clone(), last_seq: None }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    Frame(Frame),
    /// Nothing new within the wait.
    Idle,
    Closed,
}

#[derive(Debug)]
pub struct FrameFeed {
    rx: watch::Receiver<Option<Frame>>,
    last_seq: Option<u64>,
}

impl FrameFeed {
    /// Wait up to `wait` for a frame this client has not seen yet. A client
    /// that fell behind skips straight to the newest frame.
    pub async fn next(&mut self, wait: Duration) -> FeedEvent {
        loop {
            if let Some(frame) = self.unseen() {
                return FeedEvent::Frame(frame);
            }
            match tokio::time::timeout(wait, self.rx.changed()).await {
                Ok(Ok(())) => continue,
                Ok(Err(_)) => return FeedEvent::Closed,
                Err(_) => return FeedEvent::Idle,
            }
        }
    }

    pub fn delivered(&self) -> Option<u64> {
        self.last_seq
    }

    fn unseen(&mut self) -> Option<Frame> {
        let current = self.rx.borrow_and_update();
        let frame = current.as_ref()?;
        if self.last_seq == Some(frame.seq) {
            return None;
        }
        self.last_seq = Some(frame.seq);
        Some(frame.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WAIT: Duration = Duration::from_millis(20);

    #[tokio::test]
    async fn new_client_gets_current_frame() {
        let (mut slot, source) = frame_channel();
        assert!(slot.publish(Bytes::from_static(b"a")));
        let mut feed = source.subscribe();
        match feed.next(WAIT).await {
            FeedEvent::Frame(f) => assert_eq!(f.jpeg, Bytes::from_static(b"a")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_slot_is_idle() {
        let (_slot, source) = frame_channel();
        let mut feed = source.subscribe();
        assert_eq!(feed.next(WAIT).await, FeedEvent::Idle);
        assert!(source.latest().is_none());
    }

    #[tokio::test]
    async fn identical_frame_is_not_redelivered() {
        let (mut slot, source) = frame_channel();
        let mut feed = source.subscribe();
        slot.publish(Bytes::from_static(b"same"));
        assert!(matches!(feed.next(WAIT).await, FeedEvent::Frame(_)));

        assert!(!slot.publish(Bytes::from_static(b"same")));
        assert_eq!(feed.next(WAIT).await, FeedEvent::Idle);
    }

    #[tokio::test]
    async fn stalled_client_skips_to_newest() {
        let (mut slot, source) = frame_channel();
        let mut feed = source.subscribe();
        for body in [&b"1"[..], b"2", b"3"] {
            slot.publish(Bytes::copy_from_slice(body));
        }
        match feed.next(WAIT).await {
            FeedEvent::Frame(f) => {
                assert_eq!(f.jpeg, Bytes::from_static(b"3"));
                assert_eq!(f.seq, 2);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(feed.next(WAIT).await, FeedEvent::Idle);
    }

    #[tokio::test]
    async fn clients_are_independent() {
        let (mut slot, source) = frame_channel();
        let mut fast = source.subscribe();
        let mut slow = source.subscribe();
        slot.publish(Bytes::from_static(b"x"));
        assert!(matches!(fast.next(WAIT).await, FeedEvent::Frame(_)));
        slot.publish(Bytes::from_static(b"y"));
        assert!(matches!(fast.next(WAIT).await, FeedEvent::Frame(_)));
        assert_eq!(fast.delivered(), Some(1));

        match slow.next(WAIT).await {
            FeedEvent::Frame(f) => assert_eq!(f.jpeg, Bytes::from_static(b"y")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn wakes_on_publish() {
        let (mut slot, source) = frame_channel();
        let mut feed = source.subscribe();
        let waiter = tokio::spawn(async move { feed.next(Duration::from_secs(5)).await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        slot.publish(Bytes::from_static(b"late"));
        assert!(matches!(waiter.await.unwrap(), FeedEvent::Frame(_)));
    }

    #[tokio::test]
    async fn dropping_slot_closes_feed_after_last_frame() {
        let (mut slot, source) = frame_channel();
        let mut feed = source.subscribe();
        slot.publish(Bytes::from_static(b"final"));
        drop(slot);
        assert!(!source.is_live());
        assert!(matches!(feed.next(WAIT).await, FeedEvent::Frame(_)));
        assert_eq!(feed.next(WAIT).await, FeedEvent::Closed);
    }
}
