use crate::domain::Notification;
use crate::ports::{LiveEvent, NotificationBus};
use async_trait::async_trait;
use shared::{Error, Result};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// One item pushed to a connected client.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamEvent {
    Notification(Notification),
    Lagged(u64),
    /// Terminal; the stream closes right after it.
    Error { code: &'static str, message: String },
}

impl StreamEvent {
    fn from_error(err: &Error) -> Self {
        StreamEvent::Error {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseReason {
    ClientDisconnected,
    IdleTimeout,
    ChannelClosed,
    Shutdown,
    BusFailure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Disconnected;

/// Where a stream writes its events. Each `emit` is delivered (flushed) as
/// one event.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&mut self, event: StreamEvent) -> std::result::Result<(), Disconnected>;

    /// Resolves once the client has gone away.
    async fn disconnected(&self);
}

#[async_trait]
impl EventSink for mpsc::Sender<StreamEvent> {
    async fn emit(&mut self, event: StreamEvent) -> std::result::Result<(), Disconnected> {
        self.send(event).await.map_err(|_| Disconnected)
    }

    async fn disconnected(&self) {
        self.closed().await
    }
}

/// Checks that the client can take a server-push stream, based on its
/// `Accept` header.
pub fn ensure_push_supported(accept: Option<&str>) -> Result<()> {
    let Some(accept) = accept else {
        return Ok(());
    };
    let supported = accept.split(',').any(|part| {
        let media = part.split(';').next().unwrap_or("").trim();
        media.eq_ignore_ascii_case("text/event-stream")
            || media == "*/*"
            || media.eq_ignore_ascii_case("text/*")
    });
    if supported {
        Ok(())
    } else {
        Err(Error::StreamUnsupported(format!(
            "client does not accept text/event-stream (Accept: {accept})"
        )))
    }
}

enum Step {
    Close(CloseReason),
    Live(Option<LiveEvent>),
}

/// Long-lived relay of one receiver's notifications to one connection.
///
/// Queued notifications are emitted first, in creation order, then live ones
/// as they are published. The live channel is opened before the queue is
/// drained so nothing published in between is lost; live copies of drained
/// items are skipped.
pub struct NotificationStream {
    bus: Arc<dyn NotificationBus>,
    receiver_id: String,
    idle_timeout: Option<Duration>,
    shutdown: CancellationToken,
}

impl NotificationStream {
    pub fn new(bus: Arc<dyn NotificationBus>, receiver_id: impl Into<String>) -> Self {
        Self {
            bus,
            receiver_id: receiver_id.into(),
            idle_timeout: None,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Option<Duration>) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub async fn run<S: EventSink>(self, sink: &mut S) -> CloseReason {
        let receiver = self.receiver_id.as_str();

        let mut subscription = match self.bus.subscribe(receiver).await {
            Ok(subscription) => subscription,
            Err(e) => {
                let err = Error::BusSubscribe(e.to_string());
                warn!("Notification stream for '{}' failed: {}", receiver, err);
                let _ = sink.emit(StreamEvent::from_error(&err)).await;
                return CloseReason::BusFailure;
            }
        };

        // Draining
        let queued = match self.bus.drain(receiver).await {
            Ok(queued) => queued,
            Err(e) => {
                let err = Error::BusDrain(e.to_string());
                warn!("Notification stream for '{}' failed: {}", receiver, err);
                let _ = sink.emit(StreamEvent::from_error(&err)).await;
                return CloseReason::BusFailure;
            }
        };

        debug!("Draining {} queued notification(s) for '{}'", queued.len(), receiver);
        let mut drained: HashSet<Uuid> = HashSet::with_capacity(queued.len());
        for notification in queued {
            drained.insert(notification.id);
            if sink.emit(StreamEvent::Notification(notification)).await.is_err() {
                return CloseReason::ClientDisconnected;
            }
        }

        // Subscribed
        loop {
            let idle = async {
                match self.idle_timeout {
                    Some(limit) => tokio::time::sleep(limit).await,
                    None => std::future::pending::<()>().await,
                }
            };

            let step = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => Step::Close(CloseReason::Shutdown),
                _ = sink.disconnected() => Step::Close(CloseReason::ClientDisconnected),
                event = subscription.next() => Step::Live(event),
                _ = idle => Step::Close(CloseReason::IdleTimeout),
            };

            let event = match step {
                Step::Close(reason) => {
                    info!("Notification stream for '{}' closed: {:?}", receiver, reason);
                    return reason;
                }
                Step::Live(None) => {
                    info!("Live channel for '{}' closed by the bus", receiver);
                    return CloseReason::ChannelClosed;
                }
                Step::Live(Some(LiveEvent::Notification(notification))) => {
                    if drained.remove(&notification.id) {
                        continue;
                    }
                    StreamEvent::Notification(notification)
                }
                Step::Live(Some(LiveEvent::Lagged(skipped))) => {
                    warn!("Live subscriber '{}' lagged by {} event(s)", receiver, skipped);
                    StreamEvent::Lagged(skipped)
                }
            };

            if sink.emit(event).await.is_err() {
                return CloseReason::ClientDisconnected;
            }
        }
    }
}
