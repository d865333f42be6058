//! Playlist files: writing a selection out and reading one back as a set of
//! library-relative paths.

pub mod export;
pub mod import;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use clap::ValueEnum;
use log::warn;
use serde::{Deserialize, Serialize};
use crate::{LibraryError, Result};

pub use export::export;
pub use import::{load, PlaylistReader};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
pub enum PlaylistKind {
    /// Copy the files themselves into a new folder
    Folder,
    /// Extended M3U, one absolute path per line
    M3u,
    /// PLS with numbered FileN entries
    Pls,
    /// JSON document of relative paths and filenames
    Json,
}

impl PlaylistKind {
    /// Kind of a playlist file, by extension. Folders are never detected.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "m3u" => Some(Self::M3u),
            "pls" => Some(Self::Pls),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    pub fn extension(&self) -> Option<&'static str> {
        match self {
            Self::Folder => None,
            Self::M3u => Some("m3u"),
            Self::Pls => Some("pls"),
            Self::Json => Some("json"),
        }
    }
}

impl fmt::Display for PlaylistKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Folder => "Folder",
            Self::M3u => "M3U",
            Self::Pls => "PLS",
            Self::Json => "JSON",
        };
        f.write_str(label)
    }
}

/// On-disk shape of a JSON playlist.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistDocument {
    #[serde(default)]
    pub songs: Vec<PlaylistEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistEntry {
    #[serde(default)]
    pub relative_path: String,
    #[serde(default)]
    pub filename: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SavedPlaylist {
    pub name: String,
    pub kind: PlaylistKind,
    pub song_count: usize,
    pub path: PathBuf,
}

/// Playlist files directly inside `dir`, sorted by filename. Files that
/// cannot be read are skipped.
pub fn list_saved(dir: &Path) -> Result<Vec<SavedPlaylist>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && PlaylistKind::from_path(path).is_some())
        .collect();
    paths.sort();

    let reader = PlaylistReader::new()?;
    let mut saved = Vec::new();
    for path in paths {
        let Some(kind) = PlaylistKind::from_path(&path) else {
            continue;
        };
        match reader.count_entries(&path, kind) {
            Ok(song_count) => saved.push(SavedPlaylist {
                name: path
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                kind,
                song_count,
                path,
            }),
            Err(err) => warn!("Error loading playlist {}: {}", path.display(), err),
        }
    }
    Ok(saved)
}

pub fn delete_saved(path: &Path) -> Result<()> {
    if !path.is_file() {
        return Err(LibraryError::FileMissing(path.to_path_buf()));
    }
    fs::remove_file(path)?;
    Ok(())
}

/// Copies a saved playlist file verbatim to `destination`.
pub fn copy_saved(path: &Path, destination: &Path) -> Result<()> {
    if !path.is_file() {
        return Err(LibraryError::FileMissing(path.to_path_buf()));
    }
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(path, destination)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn kind_from_extension_ignores_case() {
        assert_eq!(PlaylistKind::from_path(Path::new("mix.M3U")), Some(PlaylistKind::M3u));
        assert_eq!(PlaylistKind::from_path(Path::new("a/b.pls")), Some(PlaylistKind::Pls));
        assert_eq!(PlaylistKind::from_path(Path::new("mix.json")), Some(PlaylistKind::Json));
        assert_eq!(PlaylistKind::from_path(Path::new("mix.txt")), None);
        assert_eq!(PlaylistKind::from_path(Path::new("mix")), None);
    }

    #[test]
    fn list_saved_counts_entries_and_skips_garbage() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("road.m3u"), "#EXTM3U\n/m/a.mp3\n\n/m/b.mp3\n").unwrap();
        fs::write(
            dir.path().join("gym.pls"),
            "[playlist]\nFile1=/m/a.mp3\nFile2=/m/b.mp3\nFile3=/m/c.mp3\nNumberOfEntries=3\nVersion=2\n",
        )
        .unwrap();
        fs::write(dir.path().join("broken.json"), "{ not json").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let saved = list_saved(dir.path()).unwrap();
        let summary: Vec<(String, PlaylistKind, usize)> = saved
            .into_iter()
            .map(|p| (p.name, p.kind, p.song_count))
            .collect();

        assert_eq!(
            summary,
            vec![
                ("gym".to_string(), PlaylistKind::Pls, 3),
                ("road".to_string(), PlaylistKind::M3u, 2),
            ]
        );
    }

    #[test]
    fn missing_playlists_dir_lists_nothing() {
        let dir = TempDir::new().unwrap();
        assert!(list_saved(&dir.path().join("playlists")).unwrap().is_empty());
    }

    #[test]
    fn delete_and_copy_saved() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mix.m3u");
        fs::write(&path, "#EXTM3U\n").unwrap();

        let copy = dir.path().join("out/mix-copy.m3u");
        copy_saved(&path, &copy).unwrap();
        assert_eq!(fs::read_to_string(&copy).unwrap(), "#EXTM3U\n");

        delete_saved(&path).unwrap();
        assert!(!path.exists());
        assert!(matches!(delete_saved(&path), Err(LibraryError::FileMissing(_))));
    }
}
