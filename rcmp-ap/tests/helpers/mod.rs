//! Shared test infrastructure for rcmp-ap integration tests
//!
//! - `FakeBackend`: scripted media backend with a command log
//! - `Harness`: temp music folder + catalog + engine + session, wired like
//!   the binary does it

#![allow(dead_code)]

pub mod fake_backend;

pub use fake_backend::FakeBackend;

use rcmp_ap::api::AppContext;
use rcmp_ap::library::Library;
use rcmp_ap::playback::{PlaybackSession, RenderEngine};
use rcmp_common::{Notification, NotificationChannel, NotificationConsumer};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::task::JoinHandle;

pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Fully wired playback stack over a temporary music folder
pub struct Harness {
    pub dir: TempDir,
    pub backend: Arc<FakeBackend>,
    pub engine: Arc<RenderEngine>,
    pub library: Arc<Library>,
    pub session: Arc<PlaybackSession>,
    pub notifications: NotificationChannel,
    listener: JoinHandle<()>,
}

impl Harness {
    /// Catalog of `tracks` (name, tags), each backed by an empty file
    pub async fn new(tracks: &[(&str, &[&str])]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let music = dir.path().join("music");
        std::fs::create_dir(&music).unwrap();

        let mut document = BTreeMap::new();
        for (name, tags) in tracks {
            touch(&music, name);
            document.insert(name.to_string(), tags.to_vec());
        }
        let catalog_file = dir.path().join("info_music.json");
        std::fs::write(&catalog_file, serde_json::to_string(&document).unwrap()).unwrap();

        let library = Arc::new(Library::open(music, catalog_file).await.unwrap());
        let backend = Arc::new(FakeBackend::new());
        let engine = Arc::new(RenderEngine::new(backend.clone(), POLL_INTERVAL));
        let notifications = NotificationChannel::new();
        let session = Arc::new(PlaybackSession::new(
            Arc::clone(&engine),
            Arc::clone(&library),
            notifications.clone(),
            Vec::new(),
            50,
        ));
        let listener = session.spawn_track_end_listener();
        engine.start().unwrap();

        Self {
            dir,
            backend,
            engine,
            library,
            session,
            notifications,
            listener,
        }
    }

    pub fn music_dir(&self) -> PathBuf {
        self.dir.path().join("music")
    }

    pub fn catalog_file(&self) -> PathBuf {
        self.dir.path().join("info_music.json")
    }

    pub fn context(&self) -> AppContext {
        AppContext::new(
            Arc::clone(&self.session),
            Arc::clone(&self.library),
            self.notifications.clone(),
        )
    }

    pub async fn consumer(&self) -> NotificationConsumer {
        self.notifications.consumer().await
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.engine.shutdown();
        self.listener.abort();
    }
}

/// Create an empty file `name` under `dir`
pub fn touch(dir: &Path, name: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, b"").unwrap();
}

/// Wait up to two seconds for the next notification
pub async fn next_event(consumer: &mut NotificationConsumer) -> Notification {
    tokio::time::timeout(Duration::from_secs(2), consumer.next())
        .await
        .expect("timed out waiting for a notification")
        .expect("notification channel closed")
}

pub fn song(name: &str) -> Notification {
    Notification::Song(name.to_string())
}
