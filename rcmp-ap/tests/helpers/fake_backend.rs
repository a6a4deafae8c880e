//! Scripted stand-in for the native media backend
//!
//! Records every transport command and lets tests inject backend events
//! (for example a normal end of track) into the render engine's poll loop.

use rcmp_ap::playback::{BackendEvent, EndFileReason, MediaBackend};
use rcmp_ap::Result;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Mutex;
use std::time::Duration;

/// Blocks the next `loadfile` until released
struct LoadGate {
    entered: Sender<()>,
    release: Receiver<()>,
}

pub struct FakeBackend {
    commands: Mutex<Vec<Vec<String>>>,
    events_tx: Mutex<Sender<BackendEvent>>,
    events_rx: Mutex<Receiver<BackendEvent>>,
    gate: Mutex<Option<LoadGate>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            commands: Mutex::new(Vec::new()),
            events_tx: Mutex::new(tx),
            events_rx: Mutex::new(rx),
            gate: Mutex::new(None),
        }
    }

    /// Every command issued so far, space-joined
    pub fn commands(&self) -> Vec<String> {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.join(" "))
            .collect()
    }

    /// File names passed to `loadfile`, in order
    pub fn loads(&self) -> Vec<String> {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.first().map(String::as_str) == Some("loadfile"))
            .filter_map(|c| c.get(1))
            .map(|path| {
                std::path::Path::new(path)
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default()
            })
            .collect()
    }

    pub fn push_event(&self, event: BackendEvent) {
        self.events_tx.lock().unwrap().send(event).unwrap();
    }

    /// Report that the current track played to its end
    pub fn finish_track(&self) {
        self.push_event(BackendEvent::EndFile(EndFileReason::Eof));
    }

    /// Make the next `loadfile` block
    ///
    /// Returns a receiver that fires once the load is entered, and a sender
    /// that lets it complete.
    pub fn gate_next_load(&self) -> (Receiver<()>, Sender<()>) {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        *self.gate.lock().unwrap() = Some(LoadGate {
            entered: entered_tx,
            release: release_rx,
        });
        (entered_rx, release_tx)
    }
}

impl MediaBackend for FakeBackend {
    fn command(&self, args: &[&str]) -> Result<()> {
        let gate = if args.first() == Some(&"loadfile") {
            self.gate.lock().unwrap().take()
        } else {
            None
        };
        if let Some(gate) = gate {
            gate.entered.send(()).unwrap();
            gate.release.recv_timeout(Duration::from_secs(5)).unwrap();
        }

        self.commands
            .lock()
            .unwrap()
            .push(args.iter().map(|a| a.to_string()).collect());
        Ok(())
    }

    fn wait_event(&self, timeout: Duration) -> BackendEvent {
        match self.events_rx.lock().unwrap().recv_timeout(timeout) {
            Ok(event) => event,
            Err(RecvTimeoutError::Timeout) => BackendEvent::None,
            Err(RecvTimeoutError::Disconnected) => BackendEvent::Shutdown,
        }
    }

    fn name(&self) -> &str {
        "fake backend"
    }
}
