use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use futures::StreamExt;
use shared::Result;
use skillnet::domain::Notification;
use skillnet::ports::{LiveEvent, NotificationBus, Subscription, order_for_delivery};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::debug;

const LIVE_CHANNEL_CAPACITY: usize = 64;

/// In-process notification bus: a bounded queue per receiver plus a tokio
/// broadcast channel per connected receiver.
pub struct InProcessBus {
    queues: DashMap<String, VecDeque<Notification>>,
    channels: Arc<DashMap<String, broadcast::Sender<Notification>>>,
    queue_cap: usize,
    queue_ttl: Duration,
}

impl InProcessBus {
    pub fn new(queue_cap: usize, queue_ttl: Duration) -> Self {
        Self {
            queues: DashMap::new(),
            channels: Arc::new(DashMap::new()),
            queue_cap: queue_cap.max(1),
            queue_ttl,
        }
    }

    /// Number of receivers with at least one live subscriber.
    pub fn live_receivers(&self) -> usize {
        self.channels.len()
    }

    pub fn queued_len(&self, receiver_id: &str) -> usize {
        self.queues.get(receiver_id).map(|q| q.len()).unwrap_or(0)
    }
}

impl Default for InProcessBus {
    fn default() -> Self {
        Self::new(100, Duration::from_secs(30 * 24 * 3600))
    }
}

#[async_trait]
impl NotificationBus for InProcessBus {
    async fn publish(&self, notification: &Notification) -> Result<()> {
        {
            let mut queue = self
                .queues
                .entry(notification.receiver_id.clone())
                .or_default();
            queue.push_back(notification.clone());
            while queue.len() > self.queue_cap {
                queue.pop_front();
            }
        }

        match self.channels.get(&notification.receiver_id) {
            Some(tx) => {
                if tx.send(notification.clone()).is_err() {
                    debug!("No live subscriber for '{}'", notification.receiver_id);
                }
            }
            None => debug!("No live subscriber for '{}'", notification.receiver_id),
        }

        Ok(())
    }

    async fn drain(&self, receiver_id: &str) -> Result<Vec<Notification>> {
        let queued = self
            .queues
            .remove(receiver_id)
            .map(|(_, q)| q)
            .unwrap_or_default();

        let cutoff = chrono::Duration::from_std(self.queue_ttl)
            .ok()
            .and_then(|ttl| Utc::now().checked_sub_signed(ttl));
        let fresh: Vec<Notification> = queued
            .into_iter()
            .filter(|n| cutoff.is_none_or(|cutoff| n.created_at >= cutoff))
            .collect();

        Ok(order_for_delivery(fresh))
    }

    async fn subscribe(&self, receiver_id: &str) -> Result<Subscription> {
        let rx = self
            .channels
            .entry(receiver_id.to_string())
            .or_insert_with(|| broadcast::channel(LIVE_CHANNEL_CAPACITY).0)
            .subscribe();

        let stream = BroadcastStream::new(rx)
            .map(|item| match item {
                Ok(notification) => LiveEvent::Notification(notification),
                Err(BroadcastStreamRecvError::Lagged(skipped)) => LiveEvent::Lagged(skipped),
            })
            .boxed();

        let channels = self.channels.clone();
        let key = receiver_id.to_string();
        Ok(Subscription::new(receiver_id, stream).on_drop(move || {
            // last subscriber gone: release the channel
            channels.remove_if(&key, |_, tx| tx.receiver_count() == 0);
        }))
    }
}

impl std::fmt::Debug for InProcessBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InProcessBus")
            .field("receivers_queued", &self.queues.len())
            .field("live_receivers", &self.channels.len())
            .field("queue_cap", &self.queue_cap)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use skillnet::domain::NotificationKind;

    fn note(receiver: &str, content: &str) -> Notification {
        Notification::new(NotificationKind::Event, "alice", receiver, content)
    }

    #[tokio::test]
    async fn test_drain_returns_queue_once() {
        let bus = InProcessBus::default();
        bus.publish(&note("bob", "one")).await.unwrap();
        bus.publish(&note("bob", "two")).await.unwrap();

        let drained = bus.drain("bob").await.unwrap();
        let contents: Vec<_> = drained.iter().map(|n| n.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "two"]);
        assert!(bus.drain("bob").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_drain_orders_by_created_at() {
        let bus = InProcessBus::default();
        let now = Utc::now();
        for (content, offset) in [("t3", 3), ("t1", 1), ("t2", 2)] {
            let mut n = note("bob", content);
            n.created_at = now + ChronoDuration::seconds(offset);
            bus.publish(&n).await.unwrap();
        }

        let drained = bus.drain("bob").await.unwrap();
        assert!(drained.windows(2).all(|w| w[0].created_at <= w[1].created_at));
        assert_eq!(drained[0].content, "t1");
    }

    #[tokio::test]
    async fn test_queue_cap_evicts_oldest() {
        let bus = InProcessBus::new(2, Duration::from_secs(60));
        for content in ["a", "b", "c"] {
            bus.publish(&note("bob", content)).await.unwrap();
        }

        assert_eq!(bus.queued_len("bob"), 2);
        let contents: Vec<_> = bus
            .drain("bob")
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.content)
            .collect();
        assert_eq!(contents, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn test_stale_entries_are_dropped_at_drain() {
        let bus = InProcessBus::new(10, Duration::from_secs(60));
        let mut stale = note("bob", "old");
        stale.created_at = Utc::now() - ChronoDuration::seconds(120);
        bus.publish(&stale).await.unwrap();
        bus.publish(&note("bob", "new")).await.unwrap();

        let drained = bus.drain("bob").await.unwrap();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].content, "new");
    }

    #[tokio::test]
    async fn test_live_subscriber_receives_and_queue_keeps_copy() {
        let bus = InProcessBus::default();
        let mut sub = bus.subscribe("bob").await.unwrap();

        let sent = note("bob", "hi");
        bus.publish(&sent).await.unwrap();

        assert_eq!(sub.next().await, Some(LiveEvent::Notification(sent.clone())));
        assert_eq!(bus.drain("bob").await.unwrap(), vec![sent]);
    }

    #[tokio::test]
    async fn test_subscriptions_are_per_receiver() {
        let bus = InProcessBus::default();
        let mut bob = bus.subscribe("bob").await.unwrap();
        let _carol = bus.subscribe("carol").await.unwrap();

        bus.publish(&note("carol", "for carol")).await.unwrap();
        let sent = note("bob", "for bob");
        bus.publish(&sent).await.unwrap();

        assert_eq!(bob.next().await, Some(LiveEvent::Notification(sent)));
    }

    #[tokio::test]
    async fn test_no_backfill_on_subscribe() {
        let bus = InProcessBus::default();
        bus.publish(&note("bob", "before")).await.unwrap();

        let mut sub = bus.subscribe("bob").await.unwrap();
        let after = note("bob", "after");
        bus.publish(&after).await.unwrap();

        assert_eq!(sub.next().await, Some(LiveEvent::Notification(after)));
    }

    #[tokio::test]
    async fn test_dropping_last_subscription_releases_channel() {
        let bus = InProcessBus::default();
        let first = bus.subscribe("bob").await.unwrap();
        let second = bus.subscribe("bob").await.unwrap();
        assert_eq!(bus.live_receivers(), 1);

        drop(first);
        assert_eq!(bus.live_receivers(), 1);
        drop(second);
        assert_eq!(bus.live_receivers(), 0);

        // publishing with nobody listening still queues
        bus.publish(&note("bob", "later")).await.unwrap();
        assert_eq!(bus.queued_len("bob"), 1);
    }

    #[tokio::test]
    async fn test_slow_subscriber_sees_lagged() {
        let bus = InProcessBus::default();
        let mut sub = bus.subscribe("bob").await.unwrap();

        for i in 0..(LIVE_CHANNEL_CAPACITY + 5) {
            bus.publish(&note("bob", &format!("n{i}"))).await.unwrap();
        }

        assert_eq!(sub.next().await, Some(LiveEvent::Lagged(5)));
    }
}
