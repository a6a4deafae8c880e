//! Render engine adapter
//!
//! Thin layer over the [`MediaBackend`]: validates tracks before loading,
//! clamps volume, remembers the loaded track, and runs the background poll
//! loop that turns end-of-media events into the track-ended callback.
//!
//! Without a backend the engine runs degraded: every transport command logs a
//! warning and succeeds without doing anything, so catalog browsing and tag
//! edits keep working with no audio output.

use crate::error::{Error, Result};
use crate::playback::backend::{BackendEvent, EndFileReason, MediaBackend};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Callback invoked once per normally completed track
pub type TrackEndedCallback = Arc<dyn Fn() + Send + Sync>;

/// Default bounded wait for one backend poll
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Adapter between the playback session and the native backend
pub struct RenderEngine {
    backend: Option<Arc<dyn MediaBackend>>,
    /// Track most recently handed to the backend
    loaded: Mutex<Option<PathBuf>>,
    on_track_ended: Arc<RwLock<Option<TrackEndedCallback>>>,
    running: Arc<AtomicBool>,
    poll_thread: Mutex<Option<JoinHandle<()>>>,
    poll_interval: Duration,
}

impl RenderEngine {
    /// Engine driving `backend`
    pub fn new(backend: Arc<dyn MediaBackend>, poll_interval: Duration) -> Self {
        info!("Render engine using {}", backend.name());
        Self::build(Some(backend), poll_interval)
    }

    /// Engine with no audio output
    pub fn degraded() -> Self {
        warn!("Render engine running without a playback backend; transport commands are ignored");
        Self::build(None, DEFAULT_POLL_INTERVAL)
    }

    fn build(backend: Option<Arc<dyn MediaBackend>>, poll_interval: Duration) -> Self {
        Self {
            backend,
            loaded: Mutex::new(None),
            on_track_ended: Arc::new(RwLock::new(None)),
            running: Arc::new(AtomicBool::new(false)),
            poll_thread: Mutex::new(None),
            poll_interval,
        }
    }

    /// Whether a backend is attached
    pub fn is_available(&self) -> bool {
        self.backend.is_some()
    }

    /// Track currently handed to the backend
    pub fn loaded(&self) -> Option<PathBuf> {
        self.loaded.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Replace the current media with `path`
    ///
    /// Fails with [`Error::InvalidTrack`] when the file does not exist; the
    /// previously loaded track is left untouched in that case.
    pub fn load(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Err(Error::InvalidTrack(path.to_path_buf()));
        }

        let Some(backend) = self.backend_or_warn("load") else {
            return Ok(());
        };

        let mut loaded = self.loaded.lock().unwrap_or_else(|e| e.into_inner());
        let target = path.to_string_lossy();
        debug!("Backend: loadfile {}", target);
        backend.command(&["loadfile", &target, "replace"])?;
        *loaded = Some(path.to_path_buf());
        Ok(())
    }

    pub fn pause(&self) -> Result<()> {
        self.transport("pause", &["set", "pause", "yes"])
    }

    pub fn resume(&self) -> Result<()> {
        self.transport("resume", &["set", "pause", "no"])
    }

    /// Stop playback and forget the loaded track
    pub fn stop(&self) -> Result<()> {
        self.transport("stop", &["stop"])?;
        *self.loaded.lock().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }

    /// Forward a volume level; returns the clamped value actually applied
    pub fn set_volume(&self, volume: i64) -> Result<u8> {
        let clamped = clamp_volume(volume);
        let level = clamped.to_string();
        self.transport("set_volume", &["set", "volume", &level])?;
        Ok(clamped)
    }

    fn transport(&self, what: &str, args: &[&str]) -> Result<()> {
        let Some(backend) = self.backend_or_warn(what) else {
            return Ok(());
        };
        debug!("Backend: {}", args.join(" "));
        backend.command(args)
    }

    fn backend_or_warn(&self, what: &str) -> Option<&Arc<dyn MediaBackend>> {
        if self.backend.is_none() {
            warn!("Ignoring {}: no playback backend", what);
        }
        self.backend.as_ref()
    }

    /// Register the end-of-track callback, replacing any previous one
    pub fn set_on_track_ended<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *self.on_track_ended.write().unwrap_or_else(|e| e.into_inner()) = Some(Arc::new(callback));
    }

    /// Start the background poll loop; no-op when degraded or already running
    pub fn start(&self) -> Result<()> {
        let Some(backend) = self.backend.clone() else {
            debug!("No backend, poll loop not started");
            return Ok(());
        };
        if self.running.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let running = Arc::clone(&self.running);
        let callback = Arc::clone(&self.on_track_ended);
        let interval = self.poll_interval;

        let handle = std::thread::Builder::new()
            .name("render-poll".to_string())
            .spawn(move || poll_loop(backend, running, callback, interval))
            .map_err(|e| {
                self.running.store(false, Ordering::Release);
                Error::Internal(format!("Failed to spawn poll thread: {}", e))
            })?;

        *self.poll_thread.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
        info!("Render engine poll loop started");
        Ok(())
    }

    /// Signal the poll loop to stop and wait for it
    pub fn shutdown(&self) {
        self.running.store(false, Ordering::Release);
        let handle = self.poll_thread.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("Render engine poll thread panicked");
            }
            info!("Render engine poll loop stopped");
        }
    }

    pub fn is_polling(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

impl Drop for RenderEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Clamp a requested volume into 0-100
pub fn clamp_volume(volume: i64) -> u8 {
    volume.clamp(0, 100) as u8
}

fn poll_loop(
    backend: Arc<dyn MediaBackend>,
    running: Arc<AtomicBool>,
    callback: Arc<RwLock<Option<TrackEndedCallback>>>,
    interval: Duration,
) {
    while running.load(Ordering::Acquire) {
        match backend.wait_event(interval) {
            BackendEvent::None => {}
            BackendEvent::EndFile(EndFileReason::Eof) => {
                debug!("Backend reported end of track");
                // Callback runs outside the registration lock
                let cb = callback.read().unwrap_or_else(|e| e.into_inner()).clone();
                match cb {
                    Some(cb) => cb(),
                    None => debug!("No track-ended callback registered"),
                }
            }
            BackendEvent::EndFile(reason) => {
                debug!("Backend finished file: {:?}", reason);
            }
            BackendEvent::Shutdown => {
                warn!("Backend shut down, leaving poll loop");
                break;
            }
            BackendEvent::Other(id) => {
                debug!("Backend event {}", id);
            }
        }
    }
    running.store(false, Ordering::Release);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    #[derive(Default)]
    struct ScriptedBackend {
        commands: Mutex<Vec<Vec<String>>>,
        events: Mutex<VecDeque<BackendEvent>>,
    }

    impl ScriptedBackend {
        fn push(&self, event: BackendEvent) {
            self.events.lock().unwrap().push_back(event);
        }

        fn commands(&self) -> Vec<Vec<String>> {
            self.commands.lock().unwrap().clone()
        }
    }

    impl MediaBackend for ScriptedBackend {
        fn command(&self, args: &[&str]) -> Result<()> {
            self.commands
                .lock()
                .unwrap()
                .push(args.iter().map(|a| a.to_string()).collect());
            Ok(())
        }

        fn wait_event(&self, timeout: Duration) -> BackendEvent {
            if let Some(event) = self.events.lock().unwrap().pop_front() {
                return event;
            }
            std::thread::sleep(timeout);
            BackendEvent::None
        }
    }

    fn wait_until(deadline: Duration, mut check: impl FnMut() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < deadline {
            if check() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        check()
    }

    #[test]
    fn test_volume_clamped() {
        assert_eq!(clamp_volume(-5), 0);
        assert_eq!(clamp_volume(250), 100);
        assert_eq!(clamp_volume(42), 42);

        let backend = Arc::new(ScriptedBackend::default());
        let engine = RenderEngine::new(backend.clone(), Duration::from_millis(5));
        assert_eq!(engine.set_volume(250).unwrap(), 100);
        assert_eq!(backend.commands(), vec![vec!["set", "volume", "100"]]);
    }

    #[test]
    fn test_load_missing_file_fails_fast() {
        let backend = Arc::new(ScriptedBackend::default());
        let engine = RenderEngine::new(backend.clone(), Duration::from_millis(5));

        let result = engine.load(Path::new("/definitely/not/here.mp3"));
        assert!(matches!(result, Err(Error::InvalidTrack(_))));
        assert!(backend.commands().is_empty());
        assert!(engine.loaded().is_none());
    }

    #[test]
    fn test_load_replaces_current() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.mp3");
        let b = dir.path().join("b.mp3");
        std::fs::write(&a, b"").unwrap();
        std::fs::write(&b, b"").unwrap();

        let backend = Arc::new(ScriptedBackend::default());
        let engine = RenderEngine::new(backend.clone(), Duration::from_millis(5));
        engine.load(&a).unwrap();
        engine.load(&b).unwrap();

        assert_eq!(engine.loaded(), Some(b.clone()));
        let commands = backend.commands();
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[1], vec!["loadfile".to_string(), b.to_string_lossy().into_owned(), "replace".to_string()]);
    }

    #[test]
    fn test_degraded_transport_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.mp3");
        std::fs::write(&a, b"").unwrap();

        let engine = RenderEngine::degraded();
        assert!(!engine.is_available());
        engine.load(&a).unwrap();
        engine.pause().unwrap();
        engine.resume().unwrap();
        engine.stop().unwrap();
        assert_eq!(engine.set_volume(-5).unwrap(), 0);
        engine.start().unwrap();
        assert!(!engine.is_polling());
        assert!(engine.loaded().is_none());
    }

    #[test]
    fn test_callback_fires_once_per_eof_only() {
        let backend = Arc::new(ScriptedBackend::default());
        let engine = RenderEngine::new(backend.clone(), Duration::from_millis(5));
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        engine.set_on_track_ended(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        backend.push(BackendEvent::EndFile(EndFileReason::Stop));
        backend.push(BackendEvent::EndFile(EndFileReason::Eof));
        backend.push(BackendEvent::Other(6));
        backend.push(BackendEvent::EndFile(EndFileReason::Eof));
        engine.start().unwrap();

        assert!(wait_until(Duration::from_secs(2), || fired.load(Ordering::SeqCst) == 2));
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(fired.load(Ordering::SeqCst), 2);

        engine.shutdown();
        assert!(!engine.is_polling());
    }

    #[test]
    fn test_backend_shutdown_ends_poll_loop() {
        let backend = Arc::new(ScriptedBackend::default());
        let engine = RenderEngine::new(backend.clone(), Duration::from_millis(5));
        backend.push(BackendEvent::Shutdown);
        engine.start().unwrap();

        assert!(wait_until(Duration::from_secs(2), || !engine.is_polling()));
        engine.shutdown();
    }
}
