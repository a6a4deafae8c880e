//! Catalog of known tracks and their tags
//!
//! Persisted as a single UTF-8 JSON object mapping relative track path to an
//! array of tags. The document is rewritten wholesale on every persist.
//!
//! Rescans are additive: entries for files that disappeared from disk are
//! kept, so tags survive a temporarily unmounted music folder.

use crate::error::{Error, Result};
use crate::library::scanner;
use std::collections::{BTreeMap, BTreeSet};
use std::io::ErrorKind;
use std::path::Path;
use tracing::{info, warn};

/// Tags attached to one track
pub type TagSet = BTreeSet<String>;

/// Mapping of every discovered track to its tag set
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    entries: BTreeMap<String, TagSet>,
    dirty: bool,
}

impl Catalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from `(path, tags)` pairs
    pub fn from_entries<I, P, T>(entries: I) -> Self
    where
        I: IntoIterator<Item = (P, T)>,
        P: Into<String>,
        T: IntoIterator,
        T::Item: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(path, tags)| (path.into(), tags.into_iter().map(Into::into).collect()))
                .collect(),
            dirty: false,
        }
    }

    /// Read the persisted document
    ///
    /// A missing document yields an empty catalog which is written out
    /// immediately. A malformed document is reported as
    /// [`Error::CorruptCatalog`] and left untouched on disk.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("Catalog document {} not found, starting empty", path.display());
                let catalog = Self::new();
                if let Err(e) = catalog.persist(path) {
                    warn!("Failed to create catalog document {}: {}", path.display(), e);
                }
                return Ok(catalog);
            }
            Err(e) => return Err(Error::Io(e)),
        };

        let entries: BTreeMap<String, TagSet> =
            serde_json::from_str(&content).map_err(|source| Error::CorruptCatalog {
                path: path.to_path_buf(),
                source,
            })?;

        info!("Loaded {} tracks from {}", entries.len(), path.display());
        Ok(Self {
            entries,
            dirty: false,
        })
    }

    /// Write the full mapping to `path`
    ///
    /// The document is written to a sibling temp file and renamed into
    /// place, so readers never observe a half-written catalog.
    pub fn persist(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| Error::Internal(format!("Failed to serialize catalog: {}", e)))?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Walk `root` and add every new audio file with an empty tag set
    ///
    /// Returns whether any entry was added.
    pub fn scan(&mut self, root: &Path) -> Result<bool> {
        let found = scanner::discover(root)?;
        Ok(self.merge(found) > 0)
    }

    /// Insert paths not yet present; returns how many were added
    pub fn merge<I>(&mut self, paths: I) -> usize
    where
        I: IntoIterator<Item = String>,
    {
        let mut added = 0;
        for path in paths {
            if !self.entries.contains_key(&path) {
                self.entries.insert(path, TagSet::new());
                added += 1;
            }
        }
        if added > 0 {
            self.dirty = true;
        }
        added
    }

    /// Attach `tag` to `path`; no-op for unknown paths or duplicate tags
    ///
    /// Returns whether the catalog changed.
    pub fn add_tag(&mut self, path: &str, tag: &str) -> bool {
        let changed = match self.entries.get_mut(path) {
            Some(tags) => tags.insert(tag.to_string()),
            None => false,
        };
        self.dirty |= changed;
        changed
    }

    /// Detach `tag` from `path`; no-op for unknown paths or absent tags
    pub fn remove_tag(&mut self, path: &str, tag: &str) -> bool {
        let changed = match self.entries.get_mut(path) {
            Some(tags) => tags.remove(tag),
            None => false,
        };
        self.dirty |= changed;
        changed
    }

    /// Tags of `path`, if known
    pub fn tags(&self, path: &str) -> Option<&TagSet> {
        self.entries.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in catalog order (sorted by path)
    pub fn iter(&self) -> impl Iterator<Item = (&String, &TagSet)> {
        self.entries.iter()
    }

    /// Paths whose tag set intersects `filter`, in catalog order
    ///
    /// An empty filter selects every path.
    pub fn filtered(&self, filter: &TagSet) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, tags)| filter.is_empty() || !tags.is_disjoint(filter))
            .map(|(path, _)| path.clone())
            .collect()
    }

    /// Whether in-memory state differs from the last persisted document
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn set_dirty(&mut self, dirty: bool) {
        self.dirty = dirty;
    }
}
