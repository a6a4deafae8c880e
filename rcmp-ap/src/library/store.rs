//! Shared catalog store
//!
//! The catalog lives behind its own lock, independent of the playback
//! command lock, so rescans and tag edits can run while tracks are playing.
//! Disk I/O (directory walks, document writes) always happens outside the
//! catalog lock: walks collect paths first and merge afterwards, persists
//! serialize a snapshot.

use crate::error::{Error, Result};
use crate::library::catalog::Catalog;
use crate::library::scanner;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

/// Catalog shared between the HTTP layer, rescans and the playback session
pub struct Library {
    root: PathBuf,
    document: PathBuf,
    catalog: RwLock<Catalog>,
    /// Bumped whenever the set of tracks or their tags change
    generation: AtomicU64,
    /// Serializes document writers
    persist_lock: tokio::sync::Mutex<()>,
}

impl Library {
    /// Wrap an already loaded catalog
    pub fn new(root: PathBuf, document: PathBuf, catalog: Catalog) -> Self {
        Self {
            root,
            document,
            catalog: RwLock::new(catalog),
            generation: AtomicU64::new(0),
            persist_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Load the persisted catalog, or scan `root` when no document exists yet
    ///
    /// A corrupt document aborts with [`Error::CorruptCatalog`].
    pub async fn open(root: PathBuf, document: PathBuf) -> Result<Self> {
        let had_document = document.exists();

        let load_path = document.clone();
        let catalog = tokio::task::spawn_blocking(move || Catalog::load(&load_path))
            .await
            .map_err(|e| Error::Internal(format!("Catalog load task failed: {}", e)))??;

        let library = Self::new(root, document, catalog);
        if !had_document {
            if let Err(e) = library.rescan().await {
                warn!("Initial scan of {} failed: {}", library.root.display(), e);
            }
        }
        Ok(library)
    }

    /// Root folder of the music collection
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Current catalog generation
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Run `f` against the catalog under the read lock
    pub fn read<R>(&self, f: impl FnOnce(&Catalog) -> R) -> R {
        f(&self.read_guard())
    }

    /// Tags of `track` (empty when unknown)
    pub fn tags(&self, track: &str) -> Vec<String> {
        self.read_guard()
            .tags(track)
            .map(|tags| tags.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Walk the music folder and add new tracks
    ///
    /// Returns whether anything was added. New entries are persisted; a
    /// persist failure is logged and the in-memory state is kept.
    pub async fn rescan(&self) -> Result<bool> {
        let root = self.root.clone();
        let found = tokio::task::spawn_blocking(move || scanner::discover(&root))
            .await
            .map_err(|e| Error::Internal(format!("Scan task failed: {}", e)))??;

        let added = self.write_guard().merge(found);
        if added == 0 {
            debug!("Rescan found no new tracks");
            return Ok(false);
        }

        self.generation.fetch_add(1, Ordering::AcqRel);
        info!("Rescan added {} new tracks", added);

        if let Err(e) = self.persist().await {
            warn!("Failed to persist catalog after rescan: {}", e);
        }
        Ok(true)
    }

    /// Attach a tag; no-op for unknown tracks
    pub fn add_tag(&self, track: &str, tag: &str) -> bool {
        let changed = self.write_guard().add_tag(track, tag);
        self.note_edit(changed, track);
        changed
    }

    /// Detach a tag; no-op for unknown tracks
    pub fn remove_tag(&self, track: &str, tag: &str) -> bool {
        let changed = self.write_guard().remove_tag(track, tag);
        self.note_edit(changed, track);
        changed
    }

    fn note_edit(&self, changed: bool, track: &str) {
        if changed {
            self.generation.fetch_add(1, Ordering::AcqRel);
        } else if !self.read_guard().contains(track) {
            debug!("Tag edit ignored for unknown track {}", track);
        }
    }

    /// Write the current catalog to the document
    pub async fn persist(&self) -> Result<()> {
        let _writer = self.persist_lock.lock().await;

        let snapshot = {
            let mut catalog = self.write_guard();
            catalog.set_dirty(false);
            catalog.clone()
        };

        let path = self.document.clone();
        let result = tokio::task::spawn_blocking(move || snapshot.persist(&path))
            .await
            .map_err(|e| Error::Internal(format!("Persist task failed: {}", e)))
            .and_then(|r| r);

        if result.is_err() {
            self.write_guard().set_dirty(true);
        } else {
            debug!("Catalog persisted to {}", self.document.display());
        }
        result
    }

    /// Persist only when there are unsaved changes; returns whether it wrote
    pub async fn persist_if_dirty(&self) -> Result<bool> {
        if !self.read_guard().is_dirty() {
            return Ok(false);
        }
        self.persist().await?;
        Ok(true)
    }

    fn read_guard(&self) -> RwLockReadGuard<'_, Catalog> {
        self.catalog.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_guard(&self) -> RwLockWriteGuard<'_, Catalog> {
        self.catalog.write().unwrap_or_else(|e| e.into_inner())
    }
}
