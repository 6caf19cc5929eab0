pub mod notifier;
pub mod stream;

pub use notifier::{Notifier, comment_notification, like_notification};
pub use stream::{
    CloseReason, Disconnected, EventSink, NotificationStream, StreamEvent, ensure_push_supported,
};

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory bus with failure switches, shared by the notification tests.

    use crate::domain::Notification;
    use crate::ports::{LiveEvent, NotificationBus, Subscription, order_for_delivery};
    use async_trait::async_trait;
    use dashmap::DashMap;
    use futures::StreamExt;
    use shared::{Error, Result};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::{Notify, broadcast};
    use tokio_stream::wrappers::BroadcastStream;
    use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

    #[derive(Default)]
    pub struct FakeBus {
        queues: DashMap<String, Vec<Notification>>,
        channels: DashMap<String, broadcast::Sender<Notification>>,
        pub active_subscribers: Arc<AtomicUsize>,
        pub fail_publish: AtomicBool,
        pub fail_subscribe: AtomicBool,
        pub fail_drain: AtomicBool,
        pub hold_drain: AtomicBool,
        drain_gate: Notify,
    }

    impl FakeBus {
        pub fn queued(&self, receiver_id: &str) -> Vec<Notification> {
            self.queues
                .get(receiver_id)
                .map(|q| q.clone())
                .unwrap_or_default()
        }

        pub fn release_drain(&self) {
            self.hold_drain.store(false, Ordering::SeqCst);
            self.drain_gate.notify_one();
        }

        pub fn close_channels(&self) {
            self.channels.clear();
        }

        pub async fn wait_for_subscriber(&self, receiver_id: &str) {
            loop {
                let live = self
                    .channels
                    .get(receiver_id)
                    .is_some_and(|tx| tx.receiver_count() > 0);
                if live {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        }
    }

    #[async_trait]
    impl NotificationBus for FakeBus {
        async fn publish(&self, notification: &Notification) -> Result<()> {
            if self.fail_publish.load(Ordering::SeqCst) {
                return Err(Error::Store("bus offline".into()));
            }
            self.queues
                .entry(notification.receiver_id.clone())
                .or_default()
                .push(notification.clone());
            if let Some(tx) = self.channels.get(&notification.receiver_id) {
                let _ = tx.send(notification.clone());
            }
            Ok(())
        }

        async fn drain(&self, receiver_id: &str) -> Result<Vec<Notification>> {
            if self.fail_drain.load(Ordering::SeqCst) {
                return Err(Error::Store("bus offline".into()));
            }
            if self.hold_drain.load(Ordering::SeqCst) {
                self.drain_gate.notified().await;
            }
            let queued = self
                .queues
                .remove(receiver_id)
                .map(|(_, q)| q)
                .unwrap_or_default();
            Ok(order_for_delivery(queued))
        }

        async fn subscribe(&self, receiver_id: &str) -> Result<Subscription> {
            if self.fail_subscribe.load(Ordering::SeqCst) {
                return Err(Error::Store("bus offline".into()));
            }
            let rx = self
                .channels
                .entry(receiver_id.to_string())
                .or_insert_with(|| broadcast::channel(16).0)
                .subscribe();
            self.active_subscribers.fetch_add(1, Ordering::SeqCst);

            let active = self.active_subscribers.clone();
            let stream = BroadcastStream::new(rx)
                .map(|item| match item {
                    Ok(n) => LiveEvent::Notification(n),
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => LiveEvent::Lagged(skipped),
                })
                .boxed();

            Ok(Subscription::new(receiver_id, stream).on_drop(move || {
                active.fetch_sub(1, Ordering::SeqCst);
            }))
        }
    }
}
