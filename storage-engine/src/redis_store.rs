//! Redis-backed fast store and notification bus.
//!
//! Counters are plain string keys (`likes:<post>`, `comments:<post>`) written
//! with `SET .. EX`. Each receiver's queue is a list at `notifications:<id>`,
//! appended in publish order and trimmed to the queue cap; the live channel is
//! the pub/sub channel of the same name.

use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use shared::{Error, Result, TtlMs};
use skillnet::domain::Notification;
use skillnet::ports::{CacheStore, LiveEvent, NotificationBus, Subscription, order_for_delivery};
use std::time::Duration;
use tracing::{debug, warn};

pub fn queue_key(receiver_id: &str) -> String {
    format!("notifications:{receiver_id}")
}

pub fn channel_name(receiver_id: &str) -> String {
    format!("notifications:{receiver_id}")
}

/// `LTRIM` bounds that keep the newest `cap` entries of a list.
pub fn trim_range(cap: usize) -> (isize, isize) {
    let cap = isize::try_from(cap.max(1)).unwrap_or(isize::MAX);
    (-cap, -1)
}

/// Decode drained queue payloads, skipping entries that no longer parse or
/// are older than `max_age`, and order them for delivery.
pub fn decode_queue(raw: Vec<String>, max_age: Duration) -> Vec<Notification> {
    let cutoff = chrono::Duration::from_std(max_age)
        .ok()
        .and_then(|age| Utc::now().checked_sub_signed(age));

    let notifications = raw
        .iter()
        .filter_map(|payload| match Notification::from_json(payload) {
            Ok(n) => Some(n),
            Err(e) => {
                warn!("Skipping undecodable queued notification: {}", e);
                None
            }
        })
        .filter(|n| cutoff.is_none_or(|cutoff| n.created_at >= cutoff))
        .collect();

    order_for_delivery(notifications)
}

/// `SET key val NX [EX secs]`: replies `OK` when written, nil when the key exists.
pub fn set_if_absent_cmd(key: &str, val: u64, ttl: Option<TtlMs>) -> redis::Cmd {
    let mut cmd = redis::cmd("SET");
    cmd.arg(key).arg(val).arg("NX");
    if let Some(ttl) = ttl {
        cmd.arg("EX").arg(ttl.as_secs().max(1));
    }
    cmd
}

pub async fn connect(redis_url: &str) -> Result<(redis::Client, ConnectionManager)> {
    let client = redis::Client::open(redis_url).map_err(Error::store)?;
    let manager = ConnectionManager::new(client.clone())
        .await
        .map_err(Error::store)?;
    Ok((client, manager))
}

/// Counter store over a shared Redis connection.
#[derive(Clone)]
pub struct RedisCounterStore {
    conn: ConnectionManager,
}

impl RedisCounterStore {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl CacheStore<String, u64> for RedisCounterStore {
    async fn put(&self, key: String, val: u64, ttl: Option<TtlMs>) -> Result<()> {
        let mut conn = self.conn.clone();
        match ttl {
            Some(ttl) => conn
                .set_ex::<_, _, ()>(&key, val, ttl.as_secs().max(1))
                .await
                .map_err(Error::store),
            None => conn.set::<_, _, ()>(&key, val).await.map_err(Error::store),
        }
    }

    async fn get(&self, key: &String) -> Result<Option<u64>> {
        let mut conn = self.conn.clone();
        conn.get::<_, Option<u64>>(key).await.map_err(Error::store)
    }

    async fn put_if_absent(&self, key: String, val: u64, ttl: Option<TtlMs>) -> Result<bool> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = set_if_absent_cmd(&key, val, ttl)
            .query_async(&mut conn)
            .await
            .map_err(Error::store)?;
        Ok(reply.is_some())
    }
}

impl std::fmt::Debug for RedisCounterStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCounterStore").finish_non_exhaustive()
    }
}

/// Notification bus over Redis lists and pub/sub.
pub struct RedisBus {
    client: redis::Client,
    conn: ConnectionManager,
    queue_cap: usize,
    queue_ttl: Duration,
}

impl RedisBus {
    pub fn new(
        client: redis::Client,
        conn: ConnectionManager,
        queue_cap: usize,
        queue_ttl: Duration,
    ) -> Self {
        Self {
            client,
            conn,
            queue_cap,
            queue_ttl,
        }
    }
}

#[async_trait]
impl NotificationBus for RedisBus {
    async fn publish(&self, notification: &Notification) -> Result<()> {
        let payload = notification.to_json()?;
        let key = queue_key(&notification.receiver_id);
        let (start, stop) = trim_range(self.queue_cap);
        let mut conn = self.conn.clone();

        let _: () = redis::pipe()
            .atomic()
            .rpush(&key, &payload)
            .ignore()
            .ltrim(&key, start, stop)
            .ignore()
            .expire(&key, self.queue_ttl.as_secs().max(1) as i64)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(Error::store)?;

        // Live delivery is best effort; the queue already holds it
        match conn
            .publish::<_, _, i64>(channel_name(&notification.receiver_id), &payload)
            .await
        {
            Ok(0) => debug!("No live subscriber for '{}'", notification.receiver_id),
            Ok(_) => {}
            Err(e) => debug!(
                "Live publish for '{}' failed: {}",
                notification.receiver_id, e
            ),
        }

        Ok(())
    }

    async fn drain(&self, receiver_id: &str) -> Result<Vec<Notification>> {
        let key = queue_key(receiver_id);
        let mut conn = self.conn.clone();

        let (raw, _deleted): (Vec<String>, i64) = redis::pipe()
            .atomic()
            .lrange(&key, 0, -1)
            .del(&key)
            .query_async(&mut conn)
            .await
            .map_err(Error::store)?;

        Ok(decode_queue(raw, self.queue_ttl))
    }

    async fn subscribe(&self, receiver_id: &str) -> Result<Subscription> {
        let mut pubsub = self.client.get_async_pubsub().await.map_err(Error::store)?;
        pubsub
            .subscribe(channel_name(receiver_id))
            .await
            .map_err(Error::store)?;

        // Dropping the stream drops the dedicated connection, which unsubscribes.
        let stream = pubsub
            .into_on_message()
            .filter_map(|msg| async move {
                let payload: String = match msg.get_payload() {
                    Ok(payload) => payload,
                    Err(e) => {
                        warn!("Unreadable live payload: {}", e);
                        return None;
                    }
                };
                match Notification::from_json(&payload) {
                    Ok(n) => Some(LiveEvent::Notification(n)),
                    Err(e) => {
                        warn!("Undecodable live notification: {}", e);
                        None
                    }
                }
            })
            .boxed();

        Ok(Subscription::new(receiver_id, stream))
    }
}

impl std::fmt::Debug for RedisBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisBus")
            .field("queue_cap", &self.queue_cap)
            .field("queue_ttl", &self.queue_ttl)
            .finish_non_exhaustive()
    }
}
