//! Server-Sent Events feed of notifications
//!
//! `/stream` claims the single consumer slot of the notification channel and
//! forwards every notification as one `data: <json>` frame. A second client
//! waits for the slot until the first disconnects. Every stream ends as soon
//! as server shutdown begins.

use crate::api::server::AppContext;
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// GET /stream
pub async fn event_stream(
    State(ctx): State<AppContext>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("SSE client connected");
    let notifications = ctx.notifications.clone();

    let stopping = shutdown_started(ctx.shutdown.subscribe());

    let stream = async_stream::stream! {
        tokio::pin!(stopping);

        let claimed = tokio::select! {
            consumer = notifications.consumer() => Some(consumer),
            _ = &mut stopping => None,
        };

        if let Some(mut consumer) = claimed {
            debug!("SSE client attached to notification channel");
            loop {
                let notification = tokio::select! {
                    notification = consumer.next() => notification,
                    _ = &mut stopping => None,
                };
                let notification = match notification {
                    Some(notification) => notification,
                    None => break,
                };

                match serde_json::to_string(&notification) {
                    Ok(json) => {
                        debug!("SSE: sending {} notification", notification.kind());
                        yield Ok(Event::default().data(json));
                    }
                    Err(e) => warn!("Failed to serialize notification: {}", e),
                }
            }
        }
        debug!("SSE stream closed");
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Resolves once the shutdown flag is set (or its sender is gone)
async fn shutdown_started(mut shutdown: watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stopping| *stopping).await;
}
