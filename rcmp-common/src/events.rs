//! Notification events and the notification channel
//!
//! Producers (playback commands, end-of-track handling, rescans) push
//! [`Notification`]s without blocking. A single logical consumer drains them
//! in FIFO order and forwards them to the connected observer.
//!
//! # Single observer
//!
//! There is exactly one consumer slot. While an observer holds the
//! [`NotificationConsumer`], a second observer waits until the first one is
//! dropped. Events produced while nobody is connected stay queued and are
//! delivered to the next observer.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, OwnedMutexGuard};
use tracing::debug;

/// Playback state of the currently loaded track
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    /// Nothing playing (startup, empty playlist or explicit stop)
    #[default]
    Stopped,
    /// Track loaded and playing
    Playing,
    /// Track loaded and paused
    Paused,
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackState::Stopped => write!(f, "stopped"),
            PlaybackState::Playing => write!(f, "playing"),
            PlaybackState::Paused => write!(f, "paused"),
        }
    }
}

/// State-change message pushed to observers
///
/// Serialized as `{"type": <kind>, "value": <payload>}`, the shape the
/// browser client reads from `/stream`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum Notification {
    /// A track was loaded (catalog-relative name)
    Song(String),
    /// Volume changed (0-100)
    Volume(u8),
    /// Shuffle toggled
    Random(bool),
    /// Active playlist contents or order changed
    LibraryUpdate(Vec<String>),
}

impl Notification {
    /// Event kind, as used in the `type` field
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::Song(_) => "song",
            Notification::Volume(_) => "volume",
            Notification::Random(_) => "random",
            Notification::LibraryUpdate(_) => "libraryUpdate",
        }
    }
}

/// Unbounded FIFO queue of notifications with a single consumer slot
#[derive(Clone)]
pub struct NotificationChannel {
    tx: mpsc::UnboundedSender<Notification>,
    rx: Arc<Mutex<mpsc::UnboundedReceiver<Notification>>>,
}

impl NotificationChannel {
    /// Create an empty channel
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
        }
    }

    /// Push a notification; never blocks
    pub fn publish(&self, notification: Notification) {
        debug!("Publishing {} notification", notification.kind());
        // The channel owns its receiver, so the send cannot fail
        let _ = self.tx.send(notification);
    }

    /// Claim the consumer slot, waiting while another observer holds it
    pub async fn consumer(&self) -> NotificationConsumer {
        NotificationConsumer {
            rx: Arc::clone(&self.rx).lock_owned().await,
        }
    }

    /// Claim the consumer slot if it is free
    pub fn try_consumer(&self) -> Option<NotificationConsumer> {
        Arc::clone(&self.rx)
            .try_lock_owned()
            .ok()
            .map(|rx| NotificationConsumer { rx })
    }
}

impl Default for NotificationChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive read handle on a [`NotificationChannel`]
pub struct NotificationConsumer {
    rx: OwnedMutexGuard<mpsc::UnboundedReceiver<Notification>>,
}

impl NotificationConsumer {
    /// Wait for the next notification
    pub async fn next(&mut self) -> Option<Notification> {
        self.rx.recv().await
    }

    /// Take the next notification if one is queued
    pub fn try_next(&mut self) -> Option<Notification> {
        self.rx.try_recv().ok()
    }

    /// Take every queued notification
    pub fn drain(&mut self) -> Vec<Notification> {
        let mut out = Vec::new();
        while let Some(n) = self.try_next() {
            out.push(n);
        }
        out
    }
}
