//! Playback session orchestrator
//!
//! Owns the active playlist, the cursor and the playback state, and is the
//! only component that talks to the [`RenderEngine`] transport. Every
//! state-changing command runs under one async command lock for its whole
//! duration; the engine's end-of-track signal is turned into an ordinary
//! [`PlaybackSession::next`] call that queues on the same lock.
//!
//! Catalog I/O (rescans, persists) never happens while the command lock is
//! held. The session only reads the in-memory catalog to rebuild the playlist.

use crate::error::{Error, Result};
use crate::library::{Library, TagSet};
use crate::playback::engine::RenderEngine;
use crate::playback::playlist::{ActivePlaylist, TrackRef};
use rcmp_common::{Notification, NotificationChannel, PlaybackState};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Capacity of the queue between the engine poll thread and the session
const TRACK_END_QUEUE: usize = 16;

/// Explicit track selection for [`PlaybackSession::play`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayTarget {
    /// Catalog-relative track name; unknown names fall back to the first track
    Name(String),
    /// Position in the active playlist
    Index(usize),
}

/// Point-in-time view of the session, as served by `/state`
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub state: PlaybackState,
    pub track: Option<String>,
    pub cursor: usize,
    pub shuffle: bool,
    pub volume: u8,
    pub tag_filter: Vec<String>,
    pub backend: bool,
}

/// State guarded by the command lock
struct SessionInner {
    playlist: ActivePlaylist,
    state: PlaybackState,
    volume: u8,
    /// Track last handed to the engine
    current: Option<String>,
    tag_filter: TagSet,
    /// Library generation the playlist was last rebuilt from
    built_generation: u64,
}

/// Serialized command surface over playlist, engine and notifications
pub struct PlaybackSession {
    inner: Mutex<SessionInner>,
    engine: Arc<RenderEngine>,
    library: Arc<Library>,
    notifications: NotificationChannel,
}

impl PlaybackSession {
    /// Build the session and its initial playlist
    pub fn new(
        engine: Arc<RenderEngine>,
        library: Arc<Library>,
        notifications: NotificationChannel,
        tag_filter: Vec<String>,
        volume: u8,
    ) -> Self {
        let tag_filter: TagSet = tag_filter.into_iter().collect();
        let built_generation = library.generation();

        let mut playlist = ActivePlaylist::new(library.root());
        library.read(|catalog| playlist.rebuild(catalog, &tag_filter, false));
        info!(
            "Playback session ready: {} of {} tracks selected",
            playlist.len(),
            library.read(|c| c.len())
        );

        let volume = match engine.set_volume(i64::from(volume)) {
            Ok(v) => v,
            Err(e) => {
                warn!("Failed to apply initial volume: {}", e);
                volume.min(100)
            }
        };

        Self {
            inner: Mutex::new(SessionInner {
                playlist,
                state: PlaybackState::Stopped,
                volume,
                current: None,
                tag_filter,
                built_generation,
            }),
            engine,
            library,
            notifications,
        }
    }

    /// Load the track under the cursor (optionally re-targeted) and play it
    ///
    /// If the catalog changed since the playlist was built, the playlist is
    /// rebuilt first and a `libraryUpdate` follows the `song` event.
    pub async fn play(&self, target: Option<PlayTarget>) -> Result<String> {
        let mut inner = self.inner.lock().await;

        let refreshed = if inner.built_generation != self.library.generation() {
            debug!("Catalog changed since last rebuild");
            Some(self.rebuild(&mut inner, None))
        } else {
            None
        };

        let track = self.navigate(&mut inner, |playlist| {
            match target {
                Some(PlayTarget::Name(name)) => {
                    playlist.select_by_name(&name)?;
                }
                Some(PlayTarget::Index(index)) => playlist.select_index(index)?,
                None => {}
            }
            playlist.current()
        })?;

        if let Some(tracks) = refreshed {
            self.notifications.publish(Notification::LibraryUpdate(tracks));
        }
        Ok(track)
    }

    /// Advance to the next track; also the end-of-track path
    pub async fn next(&self) -> Result<String> {
        let mut inner = self.inner.lock().await;
        self.navigate(&mut inner, ActivePlaylist::advance)
    }

    /// Step back to the previous track
    pub async fn previous(&self) -> Result<String> {
        let mut inner = self.inner.lock().await;
        self.navigate(&mut inner, ActivePlaylist::retreat)
    }

    /// Playing <-> Paused
    ///
    /// Never emits an event. Without a backend, or with nothing loaded, the
    /// state is left unchanged.
    pub async fn toggle_pause(&self) -> Result<PlaybackState> {
        let mut inner = self.inner.lock().await;

        if !self.engine.is_available() {
            warn!("Pause toggle ignored: no playback backend");
            return Ok(inner.state);
        }

        inner.state = match inner.state {
            PlaybackState::Playing => {
                self.engine.pause()?;
                PlaybackState::Paused
            }
            PlaybackState::Paused => {
                self.engine.resume()?;
                PlaybackState::Playing
            }
            PlaybackState::Stopped => {
                warn!("Pause toggle ignored: nothing is playing");
                PlaybackState::Stopped
            }
        };
        info!("Playback state: {}", inner.state);
        Ok(inner.state)
    }

    /// Clamp, forward and announce a volume level
    pub async fn set_volume(&self, volume: i64) -> Result<u8> {
        let mut inner = self.inner.lock().await;
        let applied = self.engine.set_volume(volume)?;
        inner.volume = applied;
        if i64::from(applied) != volume {
            debug!("Volume {} clamped to {}", volume, applied);
        }
        self.notifications.publish(Notification::Volume(applied));
        Ok(applied)
    }

    /// Flip shuffle through [`ActivePlaylist::set_shuffle`]
    ///
    /// Emits `random`, then `libraryUpdate` if the track order changed.
    pub async fn toggle_shuffle(&self) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        let enabled = !inner.playlist.shuffle_enabled();
        let before = inner.playlist.tracks().to_vec();

        let generation = self.library.generation();
        let inner = &mut *inner;
        let playlist = &mut inner.playlist;
        let filter = &inner.tag_filter;
        self.library
            .read(|catalog| playlist.set_shuffle(catalog, filter, enabled));
        inner.built_generation = generation;
        let tracks = inner.playlist.tracks().to_vec();
        info!("Shuffle {}", if enabled { "enabled" } else { "disabled" });

        self.notifications.publish(Notification::Random(enabled));
        if tracks != before {
            self.notifications.publish(Notification::LibraryUpdate(tracks));
        }
        Ok(enabled)
    }

    /// Replace the tag filter and rebuild the playlist
    pub async fn set_tag_filter(&self, tags: Vec<String>) -> Result<Vec<String>> {
        let mut inner = self.inner.lock().await;
        inner.tag_filter = tags.into_iter().collect();
        info!("Tag filter set to {:?}", inner.tag_filter);

        let tracks = self.rebuild(&mut inner, None);
        self.notifications
            .publish(Notification::LibraryUpdate(tracks.clone()));
        Ok(tracks)
    }

    /// Rebuild the playlist from the current catalog and announce it
    pub async fn refresh_playlist(&self) -> Vec<String> {
        let mut inner = self.inner.lock().await;
        let tracks = self.rebuild(&mut inner, None);
        self.notifications
            .publish(Notification::LibraryUpdate(tracks.clone()));
        tracks
    }

    /// Rescan the music folder, refreshing the playlist if tracks were added
    pub async fn rescan(&self) -> Result<bool> {
        // Walk and persist before touching the command lock
        let added = self.library.rescan().await?;
        if added {
            self.refresh_playlist().await;
        }
        Ok(added)
    }

    /// Stop playback; the cursor is kept
    pub async fn stop(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.state == PlaybackState::Stopped {
            return Ok(());
        }
        self.engine.stop()?;
        inner.state = PlaybackState::Stopped;
        inner.current = None;
        info!("Playback stopped");
        Ok(())
    }

    /// Current active playlist in playback order
    pub async fn album(&self) -> Vec<String> {
        self.inner.lock().await.playlist.tracks().to_vec()
    }

    pub async fn status(&self) -> SessionStatus {
        let inner = self.inner.lock().await;
        SessionStatus {
            state: inner.state,
            track: inner.current.clone(),
            cursor: inner.playlist.cursor(),
            shuffle: inner.playlist.shuffle_enabled(),
            volume: inner.volume,
            tag_filter: inner.tag_filter.iter().cloned().collect(),
            backend: self.engine.is_available(),
        }
    }

    pub fn engine(&self) -> &Arc<RenderEngine> {
        &self.engine
    }

    pub fn library(&self) -> &Arc<Library> {
        &self.library
    }

    /// Route the engine's end-of-track signal into [`Self::next`]
    ///
    /// The poll thread only pushes into a bounded queue; the returned task
    /// drains it and runs `next()` under the command lock, exactly like a
    /// user command.
    pub fn spawn_track_end_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let (tx, mut rx) = mpsc::channel::<()>(TRACK_END_QUEUE);
        self.engine.set_on_track_ended(move || {
            if let Err(e) = tx.try_send(()) {
                warn!("Dropping track-ended signal: {}", e);
            }
        });

        let session = Arc::clone(self);
        tokio::spawn(async move {
            while rx.recv().await.is_some() {
                match session.next().await {
                    Ok(track) => debug!("Track ended, advanced to {}", track),
                    Err(Error::EmptyPlaylist) => debug!("Track ended with an empty playlist"),
                    Err(e) => error!("Auto-advance after track end failed: {}", e),
                }
            }
            debug!("Track-end listener finished");
        })
    }

    /// Move the cursor with `step`, load the result and announce it
    ///
    /// A failed step or load leaves playlist, cursor and state exactly as they
    /// were. A paused session is resumed once the new track is loaded.
    fn navigate<F>(&self, inner: &mut SessionInner, step: F) -> Result<String>
    where
        F: FnOnce(&mut ActivePlaylist) -> Result<TrackRef>,
    {
        let saved = inner.playlist.clone();

        let track = match step(&mut inner.playlist) {
            Ok(track) => track,
            Err(e) => {
                inner.playlist = saved;
                return Err(e);
            }
        };

        if let Err(e) = self.engine.load(&track.path) {
            warn!("Cannot play {}: {}", track.name, e);
            inner.playlist = saved;
            return Err(e);
        }

        // The backend keeps its pause flag across a replace
        let mut state = PlaybackState::Playing;
        if inner.state == PlaybackState::Paused {
            if let Err(e) = self.engine.resume() {
                warn!("Loaded {} but could not resume: {}", track.name, e);
                state = PlaybackState::Paused;
            }
        }

        info!("Now playing {} ({}/{})", track.name, inner.playlist.cursor() + 1, inner.playlist.len());
        inner.state = state;
        inner.current = Some(track.name.clone());
        self.notifications
            .publish(Notification::Song(track.name.clone()));
        Ok(track.name)
    }

    /// Rebuild from the catalog with the cursor back at 0; returns the new
    /// track order
    fn rebuild(&self, inner: &mut SessionInner, shuffle: Option<bool>) -> Vec<String> {
        let shuffle = shuffle.unwrap_or_else(|| inner.playlist.shuffle_enabled());
        let generation = self.library.generation();

        let playlist = &mut inner.playlist;
        let filter = &inner.tag_filter;
        self.library
            .read(|catalog| playlist.rebuild(catalog, filter, shuffle));

        inner.built_generation = generation;
        inner.playlist.tracks().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::Catalog;
    use std::path::PathBuf;

    fn degraded_session(entries: &[(&str, &[&str])]) -> (PlaybackSession, NotificationChannel) {
        let catalog = Catalog::from_entries(
            entries
                .iter()
                .map(|(path, tags)| (path.to_string(), tags.iter().map(|t| t.to_string()))),
        );
        let library = Arc::new(Library::new(
            PathBuf::from("/nonexistent/music"),
            PathBuf::from("/nonexistent/info_music.json"),
            catalog,
        ));
        let notifications = NotificationChannel::new();
        let session = PlaybackSession::new(
            Arc::new(RenderEngine::degraded()),
            library,
            notifications.clone(),
            Vec::new(),
            50,
        );
        (session, notifications)
    }

    #[tokio::test]
    async fn test_degraded_toggle_pause_changes_nothing() {
        let (session, notifications) = degraded_session(&[("a.mp3", &[])]);
        let before = session.status().await;

        assert_eq!(session.toggle_pause().await.unwrap(), PlaybackState::Stopped);

        assert_eq!(session.status().await, before);
        let mut consumer = notifications.consumer().await;
        assert!(consumer.try_next().is_none());
    }

    #[tokio::test]
    async fn test_volume_clamped_and_announced() {
        let (session, notifications) = degraded_session(&[]);
        let mut consumer = notifications.consumer().await;

        assert_eq!(session.set_volume(-5).await.unwrap(), 0);
        assert_eq!(session.status().await.volume, 0);
        assert_eq!(session.set_volume(250).await.unwrap(), 100);
        assert_eq!(session.status().await.volume, 100);

        assert_eq!(
            consumer.drain(),
            vec![Notification::Volume(0), Notification::Volume(100)]
        );
    }

    #[tokio::test]
    async fn test_empty_playlist_navigation_stays_stopped() {
        let (session, notifications) = degraded_session(&[]);

        assert!(matches!(session.next().await, Err(Error::EmptyPlaylist)));
        assert!(matches!(session.previous().await, Err(Error::EmptyPlaylist)));
        assert!(matches!(session.play(None).await, Err(Error::EmptyPlaylist)));

        assert_eq!(session.status().await.state, PlaybackState::Stopped);
        assert!(notifications.consumer().await.try_next().is_none());
    }

    #[tokio::test]
    async fn test_missing_track_keeps_cursor() {
        let (session, notifications) = degraded_session(&[("a.mp3", &[]), ("b.mp3", &[])]);

        assert!(matches!(session.next().await, Err(Error::InvalidTrack(_))));

        let status = session.status().await;
        assert_eq!(status.cursor, 0);
        assert_eq!(status.state, PlaybackState::Stopped);
        assert!(status.track.is_none());
        assert!(notifications.consumer().await.try_next().is_none());
    }

    #[tokio::test]
    async fn test_tag_filter_rebuilds_and_announces() {
        let (session, notifications) = degraded_session(&[("a.mp3", &[]), ("b.mp3", &["rock"])]);
        assert_eq!(session.album().await.len(), 2);

        let tracks = session.set_tag_filter(vec!["rock".to_string()]).await.unwrap();
        assert_eq!(tracks, vec!["b.mp3".to_string()]);
        assert_eq!(session.album().await, tracks);
        assert_eq!(session.status().await.tag_filter, vec!["rock".to_string()]);

        let mut consumer = notifications.consumer().await;
        assert_eq!(consumer.drain(), vec![Notification::LibraryUpdate(tracks)]);
    }

    #[tokio::test]
    async fn test_toggle_shuffle_announces_random() {
        let (session, notifications) = degraded_session(&[("a.mp3", &[])]);

        assert!(session.toggle_shuffle().await.unwrap());
        assert!(session.status().await.shuffle);
        assert!(!session.toggle_shuffle().await.unwrap());

        // A single track cannot change order
        let mut consumer = notifications.consumer().await;
        assert_eq!(
            consumer.drain(),
            vec![Notification::Random(true), Notification::Random(false)]
        );
    }
}
