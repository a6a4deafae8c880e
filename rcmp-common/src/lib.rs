//! # RCMP Common Library
//!
//! Shared code for the RCMP player service including:
//! - Bootstrap configuration loading (TOML)
//! - Notification event types and the notification channel
//! - Common error types

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
pub use events::{Notification, NotificationChannel, NotificationConsumer, PlaybackState};
