use crate::api::{PublishNotificationRequest, StatusResponse};
use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    Extension, Json,
    extract::State,
    http::{HeaderMap, header},
    response::{
        IntoResponse,
        sse::{Event, KeepAlive, Sse},
    },
};
use futures::stream::StreamExt;
use skillnet::domain::CurrentUser;
use skillnet::notifications::{NotificationStream, StreamEvent, ensure_push_supported};
use std::convert::Infallible;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};

const STREAM_BUFFER: usize = 32;

/// GET /auth/notifications
///
/// Server-sent event stream of the caller's notifications: everything queued
/// while they were away, then live ones until they disconnect.
pub async fn stream_notifications(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let accept = headers.get(header::ACCEPT).and_then(|v| v.to_str().ok());
    ensure_push_supported(accept)?;

    info!("New notification stream for '{}'", user.user_id);

    // The body holds the receiver; axum drops it when the client goes away,
    // which the stream task observes as a closed channel.
    let (mut tx, rx) = mpsc::channel(STREAM_BUFFER);
    let stream = NotificationStream::new(state.notifier.bus().clone(), user.user_id.clone())
        .with_idle_timeout(state.config.sse_idle_timeout)
        .with_shutdown(state.shutdown.child_token());

    let receiver_id = user.user_id;
    tokio::spawn(async move {
        let reason = stream.run(&mut tx).await;
        debug!("Stream task for '{}' finished: {:?}", receiver_id, reason);
    });

    let events = ReceiverStream::new(rx).map(|event| Ok::<_, Infallible>(to_sse_event(event)));

    Ok((
        [
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        Sse::new(events).keep_alive(
            KeepAlive::new()
                .interval(state.config.sse_keepalive)
                .text("keep-alive"),
        ),
    ))
}

/// Convert a stream event to an SSE frame
fn to_sse_event(event: StreamEvent) -> Event {
    match event {
        StreamEvent::Notification(notification) => {
            let id = notification.id.to_string();
            Event::default()
                .id(id)
                .json_data(&notification)
                .unwrap_or_else(|e| {
                    Event::default()
                        .event("error")
                        .data(format!("unencodable notification: {e}"))
                })
        }
        StreamEvent::Lagged(skipped) => Event::default()
            .event("lagged")
            .data(format!("Lagged by {} events", skipped)),
        StreamEvent::Error { code, message } => Event::default()
            .event("error")
            .json_data(serde_json::json!({ "error": message, "code": code }))
            .unwrap_or_else(|_| Event::default().event("error").data(code)),
    }
}

/// POST /auth/notifications
pub async fn publish_notification(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<PublishNotificationRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    let notification = state
        .notifier
        .publish_event(&user, &req.receiver_id, &req.content)
        .await?;
    debug!(
        "Published event {} from '{}' to '{}'",
        notification.id, user.user_id, notification.receiver_id
    );

    Ok(Json(StatusResponse { status: "success" }))
}
