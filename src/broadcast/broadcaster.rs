//! Concurrent fan-out of one frame to a subscriber snapshot

use std::time::Duration;

use tokio::task::JoinSet;

use super::error::SendError;
use crate::media::ProcessedFrame;
use crate::registry::{Subscriber, SubscriberId};

/// Outcome of one fan-out pass
#[derive(Debug, Clone, Default)]
pub struct PublishReport {
    /// Subscribers that accepted the frame
    pub delivered: Vec<SubscriberId>,
    /// Subscribers whose send failed or timed out
    pub disconnected: Vec<(SubscriberId, SendError)>,
}

impl PublishReport {
    /// IDs of the subscribers that should be removed from the registry
    pub fn disconnected_ids(&self) -> Vec<SubscriberId> {
        self.disconnected.iter().map(|(id, _)| *id).collect()
    }
}

/// Delivers processed frames to subscribers
#[derive(Debug, Clone)]
pub struct Broadcaster {
    send_timeout: Duration,
}

impl Broadcaster {
    pub fn new(send_timeout: Duration) -> Self {
        Self { send_timeout }
    }

    pub fn send_timeout(&self) -> Duration {
        self.send_timeout
    }

    /// Send `frame` to every subscriber in `subscribers` concurrently
    ///
    /// One task per subscriber; returns after every task has finished, which
    /// takes at most the send timeout. Failures are collected in the report
    /// and never affect the other sends.
    pub async fn publish(&self, frame: &ProcessedFrame, subscribers: Vec<Subscriber>) -> PublishReport {
        let mut sends = JoinSet::new();

        for subscriber in subscribers {
            let frame = frame.clone();
            let timeout = self.send_timeout;
            sends.spawn(async move {
                let result = subscriber.send(frame, timeout).await;
                (subscriber.id(), result)
            });
        }

        let mut report = PublishReport::default();

        while let Some(joined) = sends.join_next().await {
            match joined {
                Ok((id, Ok(()))) => report.delivered.push(id),
                Ok((id, Err(e))) => {
                    tracing::debug!(
                        subscriber = %id,
                        sequence = frame.sequence,
                        error = %e,
                        "Frame delivery failed"
                    );
                    report.disconnected.push((id, e));
                }
                Err(e) => {
                    tracing::error!(error = %e, "Send task failed");
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    fn frame(sequence: u64) -> ProcessedFrame {
        ProcessedFrame::new(sequence, Bytes::from(vec![0xAB; 1024]))
    }

    #[tokio::test]
    async fn test_publish_reaches_everyone() {
        let broadcaster = Broadcaster::new(Duration::from_millis(100));
        let (a, mut rx_a) = Subscriber::channel(SubscriberId(1), 1);
        let (b, mut rx_b) = Subscriber::channel(SubscriberId(2), 1);

        let sent = frame(1);
        let report = broadcaster.publish(&sent, vec![a, b]).await;

        assert_eq!(report.delivered.len(), 2);
        assert!(report.disconnected.is_empty());

        let got_a = rx_a.recv().await.unwrap();
        let got_b = rx_b.recv().await.unwrap();

        // Same allocation, not a copy per subscriber
        assert_eq!(got_a.data.as_ptr(), sent.data.as_ptr());
        assert_eq!(got_b.data.as_ptr(), sent.data.as_ptr());
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let timeout = Duration::from_millis(30);
        let broadcaster = Broadcaster::new(timeout);

        let (healthy, mut rx_healthy) = Subscriber::channel(SubscriberId(1), 1);
        let (closed, rx_closed) = Subscriber::channel(SubscriberId(2), 1);
        let (stalled, _rx_stalled) = Subscriber::channel(SubscriberId(3), 1);
        let (also_healthy, mut rx_also) = Subscriber::channel(SubscriberId(4), 1);

        drop(rx_closed);
        // Fill the stalled subscriber's queue so the next send cannot complete
        stalled.send(frame(0), timeout).await.unwrap();

        let report = broadcaster
            .publish(&frame(1), vec![healthy, closed, stalled, also_healthy])
            .await;

        let mut delivered = report.delivered.clone();
        delivered.sort();
        assert_eq!(delivered, vec![SubscriberId(1), SubscriberId(4)]);

        let mut disconnected = report.disconnected.clone();
        disconnected.sort_by_key(|(id, _)| *id);
        assert_eq!(
            disconnected,
            vec![
                (SubscriberId(2), SendError::Closed),
                (SubscriberId(3), SendError::Timeout(timeout)),
            ]
        );

        assert_eq!(rx_healthy.recv().await.unwrap().sequence, 1);
        assert_eq!(rx_also.recv().await.unwrap().sequence, 1);
    }

    #[tokio::test]
    async fn test_publish_is_bounded_by_timeout() {
        let timeout = Duration::from_millis(50);
        let broadcaster = Broadcaster::new(timeout);

        let stalled: Vec<_> = (0..4)
            .map(|i| Subscriber::channel(SubscriberId(i), 1))
            .collect();
        for (subscriber, _) in &stalled {
            subscriber.send(frame(0), timeout).await.unwrap();
        }

        let started = std::time::Instant::now();
        let report = broadcaster
            .publish(&frame(1), stalled.iter().map(|(s, _)| s.clone()).collect())
            .await;

        // Sends run concurrently, so four stalls cost one timeout, not four
        assert!(started.elapsed() < timeout * 3);
        assert_eq!(report.disconnected.len(), 4);
        assert_eq!(report.disconnected_ids().len(), 4);
    }

    #[tokio::test]
    async fn test_publish_to_nobody() {
        let broadcaster = Broadcaster::new(Duration::from_millis(10));
        let report = broadcaster.publish(&frame(1), Vec::new()).await;

        assert!(report.delivered.is_empty());
        assert!(report.disconnected.is_empty());
    }
}
