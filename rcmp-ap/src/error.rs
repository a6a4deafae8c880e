//! Error types for rcmp-ap
//!
//! Defines module-specific error types using thiserror for clear error propagation.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for rcmp-ap module
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP server errors
    #[error("HTTP server error: {0}")]
    Http(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Persisted catalog document exists but cannot be parsed
    #[error("Catalog document {path} is corrupt: {source}")]
    CorruptCatalog {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Track file does not exist on disk
    #[error("Track not found on disk: {0}")]
    InvalidTrack(PathBuf),

    /// Navigation requested on an empty playlist
    #[error("Active playlist is empty")]
    EmptyPlaylist,

    /// Native playback backend could not be initialized
    #[error("Playback backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Invalid request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Shared library errors
    #[error(transparent)]
    Common(#[from] rcmp_common::Error),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience Result type using rcmp-ap Error
pub type Result<T> = std::result::Result<T, Error>;
