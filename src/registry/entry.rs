//! Subscriber entries
//!
//! A subscriber is an identity plus the sending half of a bounded queue. The
//! transport layer owns the receiving half and forwards frames to the socket.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendTimeoutError;

use crate::broadcast::SendError;
use crate::media::ProcessedFrame;

/// Unique identifier for a connected subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(pub u64);

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One connected consumer of the frame stream
///
/// Cheap to clone; clones share the same outbound queue.
#[derive(Debug, Clone)]
pub struct Subscriber {
    id: SubscriberId,
    tx: mpsc::Sender<ProcessedFrame>,
    peer_addr: Option<SocketAddr>,
}

impl Subscriber {
    /// Create a subscriber around an existing queue
    pub fn new(id: SubscriberId, tx: mpsc::Sender<ProcessedFrame>) -> Self {
        Self {
            id,
            tx,
            peer_addr: None,
        }
    }

    /// Create a subscriber and the receiving end of its queue
    pub fn channel(id: SubscriberId, capacity: usize) -> (Self, mpsc::Receiver<ProcessedFrame>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(id, tx), rx)
    }

    /// Record the remote address
    pub fn with_peer(mut self, addr: SocketAddr) -> Self {
        self.peer_addr = Some(addr);
        self
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    /// Queue `frame` for delivery, waiting at most `timeout` for room
    pub async fn send(&self, frame: ProcessedFrame, timeout: Duration) -> Result<(), SendError> {
        self.tx
            .send_timeout(frame, timeout)
            .await
            .map_err(|e| match e {
                SendTimeoutError::Timeout(_) => SendError::Timeout(timeout),
                SendTimeoutError::Closed(_) => SendError::Closed,
            })
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    fn frame(sequence: u64) -> ProcessedFrame {
        ProcessedFrame::new(sequence, Bytes::from_static(b"jpeg"))
    }

    #[tokio::test]
    async fn test_send_delivers() {
        let (subscriber, mut rx) = Subscriber::channel(SubscriberId(1), 1);

        subscriber
            .send(frame(1), Duration::from_millis(50))
            .await
            .unwrap();

        assert_eq!(rx.recv().await.unwrap().sequence, 1);
    }

    #[tokio::test]
    async fn test_send_to_dropped_receiver_is_closed() {
        let (subscriber, rx) = Subscriber::channel(SubscriberId(1), 1);
        drop(rx);

        let result = subscriber.send(frame(1), Duration::from_millis(50)).await;
        assert_eq!(result, Err(SendError::Closed));
    }

    #[tokio::test]
    async fn test_send_to_full_queue_times_out() {
        let (subscriber, _rx) = Subscriber::channel(SubscriberId(1), 1);
        let timeout = Duration::from_millis(20);

        subscriber.send(frame(1), timeout).await.unwrap();
        let result = subscriber.send(frame(2), timeout).await;

        assert_eq!(result, Err(SendError::Timeout(timeout)));
    }

    #[test]
    fn test_peer_and_display() {
        let addr: SocketAddr = "127.0.0.1:50000".parse().unwrap();
        let (subscriber, _rx) = Subscriber::channel(SubscriberId(42), 1);
        let subscriber = subscriber.with_peer(addr);

        assert_eq!(subscriber.peer_addr(), Some(addr));
        assert_eq!(subscriber.id().to_string(), "#42");
    }
}
