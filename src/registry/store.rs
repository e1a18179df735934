//! Subscription registry implementation
//!
//! The registry owns the set of connected subscribers. Every mutation
//! reports whether it moved the set between empty and non-empty; the stream
//! controller turns those transitions into start and stop.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{mpsc, RwLock};

use super::config::RegistryConfig;
use super::entry::{Subscriber, SubscriberId};
use crate::media::ProcessedFrame;

/// Effect of a membership change on the subscriber count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The set went from empty to one subscriber
    Started,
    /// The set went from non-empty to empty
    Stopped,
    /// The set stayed empty or stayed non-empty
    Unchanged,
}

impl Transition {
    fn between(before: usize, after: usize) -> Self {
        match (before, after) {
            (0, n) if n > 0 => Transition::Started,
            (n, 0) if n > 0 => Transition::Stopped,
            _ => Transition::Unchanged,
        }
    }
}

/// Registry of connected subscribers
pub struct SubscriptionRegistry {
    /// Map of subscriber ID to subscriber
    subscribers: RwLock<HashMap<SubscriberId, Subscriber>>,

    /// Next ID handed out by `allocate_id`
    next_id: AtomicU64,

    /// Configuration
    config: RegistryConfig,
}

impl SubscriptionRegistry {
    /// Create a new registry with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a new registry with custom configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            config,
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Allocate a fresh subscriber ID
    pub fn allocate_id(&self) -> SubscriberId {
        SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Build a subscriber with a fresh ID and the configured queue capacity
    ///
    /// The subscriber is not registered; pass it to [`add`](Self::add) or to
    /// the stream controller's `join`.
    pub fn create_subscriber(
        &self,
        peer_addr: Option<SocketAddr>,
    ) -> (Subscriber, mpsc::Receiver<ProcessedFrame>) {
        let (subscriber, rx) = Subscriber::channel(self.allocate_id(), self.config.queue_capacity);
        match peer_addr {
            Some(addr) => (subscriber.with_peer(addr), rx),
            None => (subscriber, rx),
        }
    }

    /// Add a subscriber
    pub async fn add(&self, subscriber: Subscriber) -> Transition {
        let mut subscribers = self.subscribers.write().await;
        let before = subscribers.len();

        let id = subscriber.id();
        let peer = subscriber.peer_addr();
        subscribers.insert(id, subscriber);

        tracing::info!(
            subscriber = %id,
            peer = ?peer,
            subscribers = subscribers.len(),
            "Subscriber added"
        );

        Transition::between(before, subscribers.len())
    }

    /// Remove a subscriber
    ///
    /// Removing an unknown ID (already evicted, say) is not an error and
    /// reports [`Transition::Unchanged`].
    pub async fn remove(&self, id: SubscriberId) -> Transition {
        let mut subscribers = self.subscribers.write().await;
        let before = subscribers.len();

        if subscribers.remove(&id).is_none() {
            return Transition::Unchanged;
        }

        tracing::info!(
            subscriber = %id,
            subscribers = subscribers.len(),
            "Subscriber removed"
        );

        Transition::between(before, subscribers.len())
    }

    /// Remove subscribers whose delivery failed
    pub async fn evict(&self, ids: &[SubscriberId]) -> Transition {
        let mut subscribers = self.subscribers.write().await;
        let before = subscribers.len();

        for id in ids {
            if subscribers.remove(id).is_some() {
                tracing::warn!(
                    subscriber = %id,
                    subscribers = subscribers.len(),
                    "Subscriber evicted"
                );
            }
        }

        Transition::between(before, subscribers.len())
    }

    /// Point-in-time copy of the subscriber set
    pub async fn snapshot(&self) -> Vec<Subscriber> {
        self.subscribers.read().await.values().cloned().collect()
    }

    /// Check whether a subscriber is registered
    pub async fn contains(&self, id: SubscriberId) -> bool {
        self.subscribers.read().await.contains_key(&id)
    }

    /// Get the number of subscribers
    pub async fn len(&self) -> usize {
        self.subscribers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.subscribers.read().await.is_empty()
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subscriber(registry: &SubscriptionRegistry) -> Subscriber {
        registry.create_subscriber(None).0
    }

    #[tokio::test]
    async fn test_first_add_starts() {
        let registry = SubscriptionRegistry::new();

        let first = subscriber(&registry);
        assert_eq!(registry.add(first).await, Transition::Started);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_last_remove_stops() {
        let registry = SubscriptionRegistry::new();
        let sub = subscriber(&registry);
        let id = sub.id();

        registry.add(sub).await;
        assert_eq!(registry.remove(id).await, Transition::Stopped);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_intermediate_changes_are_unchanged() {
        let registry = SubscriptionRegistry::new();
        let a = subscriber(&registry);
        let b = subscriber(&registry);
        let (a_id, b_id) = (a.id(), b.id());

        // 0 -> 1 -> 2 -> 1 -> 0
        assert_eq!(registry.add(a).await, Transition::Started);
        assert_eq!(registry.add(b).await, Transition::Unchanged);
        assert_eq!(registry.remove(a_id).await, Transition::Unchanged);
        assert_eq!(registry.remove(b_id).await, Transition::Stopped);
    }

    #[tokio::test]
    async fn test_remove_unknown_is_unchanged() {
        let registry = SubscriptionRegistry::new();
        assert_eq!(registry.remove(SubscriberId(99)).await, Transition::Unchanged);

        let sub = subscriber(&registry);
        let id = sub.id();
        registry.add(sub).await;
        registry.remove(id).await;

        // Second removal of the same subscriber does not stop twice
        assert_eq!(registry.remove(id).await, Transition::Unchanged);
    }

    #[tokio::test]
    async fn test_evict_reports_stop_when_emptied() {
        let registry = SubscriptionRegistry::new();
        let a = subscriber(&registry);
        let b = subscriber(&registry);
        let c = subscriber(&registry);
        let (a_id, b_id, c_id) = (a.id(), b.id(), c.id());
        registry.add(a).await;
        registry.add(b).await;
        registry.add(c).await;

        assert_eq!(registry.evict(&[b_id]).await, Transition::Unchanged);
        assert!(!registry.contains(b_id).await);
        assert!(registry.contains(a_id).await);

        assert_eq!(registry.evict(&[a_id, c_id]).await, Transition::Stopped);
        assert_eq!(registry.evict(&[a_id]).await, Transition::Unchanged);
    }

    #[tokio::test]
    async fn test_snapshot_excludes_removed() {
        let registry = SubscriptionRegistry::new();
        let a = subscriber(&registry);
        let b = subscriber(&registry);
        let (a_id, b_id) = (a.id(), b.id());
        registry.add(a).await;
        registry.add(b).await;

        registry.remove(a_id).await;

        let ids: Vec<_> = registry.snapshot().await.iter().map(|s| s.id()).collect();
        assert_eq!(ids, vec![b_id]);
    }

    #[tokio::test]
    async fn test_ids_are_unique() {
        let registry = SubscriptionRegistry::new();
        let a = registry.allocate_id();
        let b = registry.allocate_id();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_create_subscriber_uses_queue_capacity() {
        let registry = SubscriptionRegistry::with_config(RegistryConfig::default().queue_capacity(2));
        let (sub, mut rx) = registry.create_subscriber(None);
        let timeout = std::time::Duration::from_millis(20);

        let frame = ProcessedFrame::new(1, bytes::Bytes::from_static(b"x"));
        sub.send(frame.clone(), timeout).await.unwrap();
        sub.send(frame.clone(), timeout).await.unwrap();
        assert!(sub.send(frame, timeout).await.is_err());

        assert!(rx.recv().await.is_some());
    }
}
