use bytes::{Bytes, BytesMut};
use futures_util::Stream;
use rover_camera::{FeedEvent, FrameFeed};
use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

const LOG_EVERY: u64 = 30;

/// One `multipart/x-mixed-replace` part carrying a JPEG.
pub fn part(boundary: &str, jpeg: &[u8]) -> Bytes {
    let head = format!("--{boundary}\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n", jpeg.len());
    let mut buf = BytesMut::with_capacity(head.len() + jpeg.len() + 2);
    buf.extend_from_slice(head.as_bytes());
    buf.extend_from_slice(jpeg);
    buf.extend_from_slice(b"\r\n");
    buf.freeze()
}

/// Per-client delivery loop. Ends when the camera stops, the server drains,
/// or the response body is dropped because the client went away.
pub struct Relay {
    id: u64,
    feed: FrameFeed,
    boundary: String,
    wait: Duration,
    shutdown: CancellationToken,
    viewers: Arc<AtomicUsize>,
    sent: u64,
}

impl Relay {
    pub fn new(
        id: u64,
        feed: FrameFeed,
        boundary: String,
        wait: Duration,
        shutdown: CancellationToken,
        viewers: Arc<AtomicUsize>,
    ) -> Self {
        viewers.fetch_add(1, Ordering::Relaxed);
        Self { id, feed, boundary, wait, shutdown, viewers, sent: 0 }
    }

    pub async fn next_part(&mut self) -> Option<Bytes> {
        loop {
            let event = tokio::select! {
                _ = self.shutdown.cancelled() => {
                    debug!("stream {}: server draining", self.id);
                    return None;
                }
                ev = self.feed.next(self.wait) => ev,
            };
            match event {
                FeedEvent::Frame(frame) => {
                    self.sent += 1;
                    if self.sent % LOG_EVERY == 0 {
                        info!("stream {}: sent {} frames", self.id, self.sent);
                    }
                    return Some(part(&self.boundary, &frame.jpeg));
                }
                FeedEvent::Idle => continue,
                FeedEvent::Closed => {
                    info!("stream {}: camera stopped", self.id);
                    return None;
                }
            }
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
        futures_util::stream::unfold(self, |mut relay| async move {
            relay.next_part().await.map(|p| (Ok(p), relay))
        })
    }
}

impl Drop for Relay {
    fn drop(&mut self) {
        self.viewers.fetch_sub(1, Ordering::Relaxed);
        info!("stream {}: client closed after {} frames", self.id, self.sent);
    }
}
