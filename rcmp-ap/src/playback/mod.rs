//! Playback: active playlist, render engine and the session that drives them
//!
//! - `playlist.rs`: filtered/shuffled track order and cursor navigation
//! - `backend.rs`: native backend contract and the libmpv implementation
//! - `engine.rs`: render engine adapter (validation, degraded mode, poll loop)
//! - `session.rs`: command-serializing orchestrator

pub mod backend;
pub mod engine;
pub mod playlist;
pub mod session;

pub use backend::{BackendEvent, EndFileReason, MediaBackend, MpvBackend};
pub use engine::RenderEngine;
pub use playlist::{ActivePlaylist, TrackRef};
pub use session::{PlayTarget, PlaybackSession, SessionStatus};
