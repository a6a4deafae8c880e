//! Active playlist and cursor navigation
//!
//! The active playlist is the tag-filtered, optionally shuffled view over the
//! catalog that playback walks through. `rebuild` is the only operation that
//! resizes it; every navigation keeps the cursor inside `[0, len)`.
//!
//! Navigation is position based: `retreat` steps back one slot in the current
//! order rather than replaying history, and only `advance` re-shuffles when it
//! wraps around.

use crate::error::{Error, Result};
use crate::library::{Catalog, TagSet};
use rand::seq::SliceRandom;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Track selected by a navigation step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackRef {
    /// Catalog key (relative path)
    pub name: String,
    /// Absolute path on disk
    pub path: PathBuf,
}

/// Ordered, filtered view over the catalog with a position cursor
#[derive(Debug, Clone)]
pub struct ActivePlaylist {
    root: PathBuf,
    tracks: Vec<String>,
    cursor: usize,
    shuffle: bool,
}

impl ActivePlaylist {
    /// Empty playlist resolving tracks under `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            tracks: Vec::new(),
            cursor: 0,
            shuffle: false,
        }
    }

    /// Refill from `catalog`, keeping paths whose tags intersect `tag_filter`
    ///
    /// An empty filter keeps every path. Shuffles when `shuffle` is set and
    /// always resets the cursor to 0.
    pub fn rebuild(&mut self, catalog: &Catalog, tag_filter: &TagSet, shuffle: bool) {
        self.tracks = catalog.filtered(tag_filter);
        self.shuffle = shuffle;
        if shuffle {
            self.tracks.shuffle(&mut rand::thread_rng());
        }
        self.cursor = 0;
        debug!(
            "Active playlist rebuilt: {} tracks, shuffle={}",
            self.tracks.len(),
            shuffle
        );
    }

    /// Change shuffle mode and rebuild
    ///
    /// Enabling shuffle always draws a fresh permutation.
    pub fn set_shuffle(&mut self, catalog: &Catalog, tag_filter: &TagSet, enabled: bool) {
        self.rebuild(catalog, tag_filter, enabled);
    }

    /// Move to the next track, wrapping to the start
    ///
    /// On wrap with shuffle enabled the order is re-permuted before the track
    /// is read, so consecutive passes differ.
    pub fn advance(&mut self) -> Result<TrackRef> {
        let len = self.non_empty_len()?;
        self.cursor = (self.cursor + 1) % len;
        if self.cursor == 0 && self.shuffle {
            debug!("Playlist wrapped, re-shuffling");
            self.tracks.shuffle(&mut rand::thread_rng());
        }
        self.current()
    }

    /// Move to the previous track, wrapping to the end
    pub fn retreat(&mut self) -> Result<TrackRef> {
        let len = self.non_empty_len()?;
        self.cursor = (self.cursor + len - 1) % len;
        self.current()
    }

    /// Point the cursor at `name`
    ///
    /// Unknown names select index 0 with a warning. Returns the index chosen.
    pub fn select_by_name(&mut self, name: &str) -> Result<usize> {
        self.non_empty_len()?;
        self.cursor = match self.index_of(name) {
            Some(index) => index,
            None => {
                warn!("Track {} is not in the active playlist, selecting first track", name);
                0
            }
        };
        Ok(self.cursor)
    }

    /// Point the cursor at `index`
    pub fn select_index(&mut self, index: usize) -> Result<()> {
        let len = self.non_empty_len()?;
        if index >= len {
            return Err(Error::BadRequest(format!(
                "index {} out of range for playlist of {} tracks",
                index, len
            )));
        }
        self.cursor = index;
        Ok(())
    }

    /// Track under the cursor
    pub fn current(&self) -> Result<TrackRef> {
        let name = self.tracks.get(self.cursor).ok_or(Error::EmptyPlaylist)?;
        Ok(TrackRef {
            name: name.clone(),
            path: self.root.join(name),
        })
    }

    /// Position of `name` in the current order
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.tracks.iter().position(|t| t == name)
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn tracks(&self) -> &[String] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn shuffle_enabled(&self) -> bool {
        self.shuffle
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn non_empty_len(&self) -> Result<usize> {
        match self.tracks.len() {
            0 => Err(Error::EmptyPlaylist),
            len => Ok(len),
        }
    }
}
