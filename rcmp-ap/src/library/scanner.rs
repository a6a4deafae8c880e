//! Audio file discovery

use crate::error::{Error, Result};
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Recognized audio file extensions (lowercase, without dot)
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "flac", "ogg", "m4a", "aac", "wma"];

/// Whether `path` has a recognized audio extension (case-insensitive)
pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            AUDIO_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Walk `root` and return every audio file as a `/`-separated path relative to `root`
///
/// Unreadable entries below the root are skipped with a warning; a missing
/// root is an error.
pub fn discover(root: &Path) -> Result<Vec<String>> {
    if !root.is_dir() {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("music folder {} is not a directory", root.display()),
        )));
    }

    let mut found = Vec::new();
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry during scan: {}", e);
                continue;
            }
        };

        if !entry.file_type().is_file() || !is_audio_file(entry.path()) {
            continue;
        }

        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        found.push(normalize(relative));
    }

    debug!("Discovered {} audio files under {}", found.len(), root.display());
    Ok(found)
}

fn normalize(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_extension_filter() {
        assert!(is_audio_file(Path::new("a.mp3")));
        assert!(is_audio_file(Path::new("dir/B.FLAC")));
        assert!(is_audio_file(Path::new("x.m4a")));
        assert!(!is_audio_file(Path::new("cover.jpg")));
        assert!(!is_audio_file(Path::new("README")));
    }

    #[test]
    fn test_discover_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("album/disc1")).unwrap();
        fs::write(dir.path().join("top.mp3"), b"").unwrap();
        fs::write(dir.path().join("album/disc1/track.ogg"), b"").unwrap();
        fs::write(dir.path().join("album/cover.png"), b"").unwrap();

        let mut found = discover(dir.path()).unwrap();
        found.sort();
        assert_eq!(found, vec!["album/disc1/track.ogg".to_string(), "top.mp3".to_string()]);
    }

    #[test]
    fn test_discover_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(discover(&dir.path().join("absent")), Err(Error::Io(_))));
    }
}
