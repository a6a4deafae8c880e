//! Native media backend boundary
//!
//! [`MediaBackend`] is the capability the render engine needs from the
//! native player: string transport commands plus a bounded-timeout event
//! poll. [`MpvBackend`] implements it on top of libmpv, loaded at runtime so
//! the service still starts (degraded) on machines without it.

use crate::error::{Error, Result};
use libloading::Library;
use std::ffi::{c_char, c_double, c_int, c_void, CStr, CString};
use std::path::{Path, PathBuf};
use std::ptr::NonNull;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Why the backend finished a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndFileReason {
    /// Reached the end of the media normally
    Eof,
    /// Stopped or replaced by a new load
    Stop,
    /// Player is quitting
    Quit,
    /// Playback failed
    Error,
    /// File redirected to another (playlists, streams)
    Redirect,
    /// Reason code not known to this crate
    Unknown(i32),
}

impl EndFileReason {
    fn from_raw(raw: c_int) -> Self {
        match raw {
            0 => EndFileReason::Eof,
            2 => EndFileReason::Stop,
            3 => EndFileReason::Quit,
            4 => EndFileReason::Error,
            5 => EndFileReason::Redirect,
            other => EndFileReason::Unknown(other),
        }
    }
}

/// Event reported by [`MediaBackend::wait_event`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendEvent {
    /// Timeout elapsed without an event
    None,
    /// Current file finished
    EndFile(EndFileReason),
    /// Backend is shutting down; polling must stop
    Shutdown,
    /// Any other event id
    Other(i32),
}

/// Capability contract toward the native playback backend
///
/// `command` may be called from any thread. `wait_event` is only ever
/// called from the render engine's poll thread.
pub trait MediaBackend: Send + Sync {
    /// Issue a string-argument transport command
    fn command(&self, args: &[&str]) -> Result<()>;

    /// Block up to `timeout` for the next event
    fn wait_event(&self, timeout: Duration) -> BackendEvent;

    /// Human readable backend name for logs
    fn name(&self) -> &str {
        "media backend"
    }
}

// libmpv client API (client.h)
const MPV_EVENT_NONE: c_int = 0;
const MPV_EVENT_SHUTDOWN: c_int = 1;
const MPV_EVENT_END_FILE: c_int = 7;

#[repr(C)]
struct MpvEvent {
    event_id: c_int,
    _error: c_int,
    _reply_userdata: u64,
    data: *mut c_void,
}

#[repr(C)]
struct MpvEventEndFile {
    reason: c_int,
    error: c_int,
}

type MpvHandle = *mut c_void;
type MpvCreateFn = unsafe extern "C" fn() -> MpvHandle;
type MpvInitializeFn = unsafe extern "C" fn(MpvHandle) -> c_int;
type MpvSetOptionStringFn = unsafe extern "C" fn(MpvHandle, *const c_char, *const c_char) -> c_int;
type MpvCommandFn = unsafe extern "C" fn(MpvHandle, *mut *const c_char) -> c_int;
type MpvWaitEventFn = unsafe extern "C" fn(MpvHandle, c_double) -> *mut MpvEvent;
type MpvTerminateDestroyFn = unsafe extern "C" fn(MpvHandle);
type MpvErrorStringFn = unsafe extern "C" fn(c_int) -> *const c_char;

struct MpvLibrary {
    _lib: Library,
    create: MpvCreateFn,
    initialize: MpvInitializeFn,
    set_option_string: MpvSetOptionStringFn,
    command: MpvCommandFn,
    wait_event: MpvWaitEventFn,
    terminate_destroy: MpvTerminateDestroyFn,
    error_string: MpvErrorStringFn,
}

impl MpvLibrary {
    /// Load libmpv and resolve the client API symbols
    ///
    /// # Safety
    /// Running the library's initialisation code is inherently unsafe; the
    /// path must point at a genuine libmpv build.
    unsafe fn load(path: &Path) -> std::result::Result<Self, libloading::Error> {
        let lib = Library::new(path)?;
        let create = *lib.get::<MpvCreateFn>(b"mpv_create\0")?;
        let initialize = *lib.get::<MpvInitializeFn>(b"mpv_initialize\0")?;
        let set_option_string = *lib.get::<MpvSetOptionStringFn>(b"mpv_set_option_string\0")?;
        let command = *lib.get::<MpvCommandFn>(b"mpv_command\0")?;
        let wait_event = *lib.get::<MpvWaitEventFn>(b"mpv_wait_event\0")?;
        let terminate_destroy = *lib.get::<MpvTerminateDestroyFn>(b"mpv_terminate_destroy\0")?;
        let error_string = *lib.get::<MpvErrorStringFn>(b"mpv_error_string\0")?;
        Ok(Self {
            _lib: lib,
            create,
            initialize,
            set_option_string,
            command,
            wait_event,
            terminate_destroy,
            error_string,
        })
    }

    fn describe(&self, code: c_int) -> String {
        let msg = unsafe { (self.error_string)(code) };
        if msg.is_null() {
            format!("mpv error {}", code)
        } else {
            unsafe { CStr::from_ptr(msg) }.to_string_lossy().into_owned()
        }
    }
}

/// libmpv-backed media backend
pub struct MpvBackend {
    lib: MpvLibrary,
    handle: NonNull<c_void>,
}

// The libmpv client API is thread-safe for everything except
// mpv_wait_event, which the render engine only calls from its poll thread.
unsafe impl Send for MpvBackend {}
unsafe impl Sync for MpvBackend {}

impl MpvBackend {
    /// Load libmpv from the first candidate that works and initialize a context
    pub fn load(candidates: &[PathBuf]) -> Result<Self> {
        let mut failures = Vec::new();
        for candidate in candidates {
            match unsafe { MpvLibrary::load(candidate) } {
                Ok(lib) => return Self::initialize(lib, candidate),
                Err(e) => {
                    debug!("libmpv not loadable from {}: {}", candidate.display(), e);
                    failures.push(format!("{}: {}", candidate.display(), e));
                }
            }
        }
        Err(Error::BackendUnavailable(format!(
            "libmpv could not be loaded ({})",
            failures.join("; ")
        )))
    }

    fn initialize(lib: MpvLibrary, source: &Path) -> Result<Self> {
        let raw = unsafe { (lib.create)() };
        let handle = NonNull::new(raw)
            .ok_or_else(|| Error::BackendUnavailable("mpv_create returned null".to_string()))?;

        // Audio only: never open a window for embedded cover art
        let name = CString::new("vid").map_err(|e| Error::Internal(e.to_string()))?;
        let value = CString::new("no").map_err(|e| Error::Internal(e.to_string()))?;
        let rc = unsafe { (lib.set_option_string)(handle.as_ptr(), name.as_ptr(), value.as_ptr()) };
        if rc < 0 {
            warn!("Failed to set mpv option vid=no: {}", lib.describe(rc));
        }

        let rc = unsafe { (lib.initialize)(handle.as_ptr()) };
        if rc < 0 {
            let reason = lib.describe(rc);
            unsafe { (lib.terminate_destroy)(handle.as_ptr()) };
            return Err(Error::BackendUnavailable(format!(
                "mpv_initialize failed: {}",
                reason
            )));
        }

        info!("libmpv initialized from {}", source.display());
        Ok(Self { lib, handle })
    }
}

impl MediaBackend for MpvBackend {
    fn command(&self, args: &[&str]) -> Result<()> {
        let owned = args
            .iter()
            .map(|a| CString::new(*a))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::BadRequest(format!("command argument contains NUL: {}", e)))?;

        let mut argv: Vec<*const c_char> = owned.iter().map(|a| a.as_ptr()).collect();
        argv.push(std::ptr::null());

        let rc = unsafe { (self.lib.command)(self.handle.as_ptr(), argv.as_mut_ptr()) };
        if rc < 0 {
            return Err(Error::Internal(format!(
                "mpv command {:?} failed: {}",
                args,
                self.lib.describe(rc)
            )));
        }
        Ok(())
    }

    fn wait_event(&self, timeout: Duration) -> BackendEvent {
        let event = unsafe { (self.lib.wait_event)(self.handle.as_ptr(), timeout.as_secs_f64()) };
        if event.is_null() {
            return BackendEvent::None;
        }

        let event = unsafe { &*event };
        match event.event_id {
            MPV_EVENT_NONE => BackendEvent::None,
            MPV_EVENT_SHUTDOWN => BackendEvent::Shutdown,
            MPV_EVENT_END_FILE => {
                if event.data.is_null() {
                    return BackendEvent::EndFile(EndFileReason::Unknown(-1));
                }
                let end_file = unsafe { &*(event.data as *const MpvEventEndFile) };
                if end_file.error < 0 {
                    debug!("mpv end-file error: {}", self.lib.describe(end_file.error));
                }
                BackendEvent::EndFile(EndFileReason::from_raw(end_file.reason))
            }
            other => BackendEvent::Other(other),
        }
    }

    fn name(&self) -> &str {
        "libmpv"
    }
}

impl Drop for MpvBackend {
    fn drop(&mut self) {
        debug!("Destroying mpv context");
        unsafe { (self.lib.terminate_destroy)(self.handle.as_ptr()) };
    }
}
