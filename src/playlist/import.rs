use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use log::{debug, info};
use regex::Regex;
use crate::playlist::{PlaylistDocument, PlaylistKind};
use crate::utils::file_ops::relative_path_of;
use crate::{LibraryError, Result};

/// Reads playlist files back into library-relative paths.
pub struct PlaylistReader {
    pls_entry: Regex,
}

impl PlaylistReader {
    pub fn new() -> Result<Self> {
        Ok(Self {
            pls_entry: Regex::new(r"^File\d+=(.*)$")?,
        })
    }

    /// Raw entries in file order, as written in the playlist.
    pub fn entries(&self, path: &Path, kind: PlaylistKind) -> Result<Vec<String>> {
        let contents = fs::read_to_string(path)?;
        let entries = match kind {
            PlaylistKind::M3u => contents
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(str::to_string)
                .collect(),
            PlaylistKind::Pls => contents
                .lines()
                .filter_map(|line| self.pls_entry.captures(line.trim()))
                .filter_map(|caps| caps.get(1).map(|m| m.as_str().trim().to_string()))
                .collect(),
            PlaylistKind::Json => serde_json::from_str::<PlaylistDocument>(&contents)?
                .songs
                .into_iter()
                .map(|song| song.relative_path)
                .collect(),
            PlaylistKind::Folder => {
                return Err(LibraryError::Unsupported(format!(
                    "{} is not a playlist file",
                    path.display()
                )))
            }
        };
        Ok(entries)
    }

    pub fn count_entries(&self, path: &Path, kind: PlaylistKind) -> Result<usize> {
        Ok(self.entries(path, kind)?.len())
    }

    /// Entries of the playlist at `path` as paths relative to `root`.
    ///
    /// Absolute entries outside `root` are dropped; relative entries are
    /// taken as already relative to the library.
    pub fn load(&self, path: &Path, root: &Path) -> Result<BTreeSet<String>> {
        let kind = PlaylistKind::from_path(path).ok_or_else(|| {
            LibraryError::Unsupported(format!("unrecognised playlist format: {}", path.display()))
        })?;

        let mut songs = BTreeSet::new();
        for entry in self.entries(path, kind)? {
            if entry.is_empty() {
                continue;
            }
            let entry_path = Path::new(&entry);
            if entry_path.is_absolute() {
                match relative_path_of(root, entry_path) {
                    Some(relative) => {
                        songs.insert(relative);
                    }
                    None => debug!("Dropping {} (outside {})", entry, root.display()),
                }
            } else {
                songs.insert(entry);
            }
        }

        info!("Loaded playlist {} ({} songs)", path.display(), songs.len());
        Ok(songs)
    }
}

/// Shorthand for [`PlaylistReader::load`].
pub fn load(path: &Path, root: &Path) -> Result<BTreeSet<String>> {
    PlaylistReader::new()?.load(path, root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn m3u_maps_root_entries_and_drops_foreign_ones() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("music");
        let playlist = dir.path().join("mix.m3u");
        fs::write(
            &playlist,
            format!(
                "#EXTM3U\n#EXTINF:123,Something\n{}\n/elsewhere/x.mp3\nrelative/y.mp3\n\n",
                root.join("rock").join("a.mp3").display()
            ),
        )
        .unwrap();

        assert_eq!(load(&playlist, &root).unwrap(), set(&["relative/y.mp3", "rock/a.mp3"]));
    }

    #[test]
    fn entries_escaping_the_root_are_dropped() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("music");
        let playlist = dir.path().join("mix.m3u");
        fs::write(
            &playlist,
            format!(
                "#EXTM3U\n{}\n{}\n",
                root.join("..").join("x.mp3").display(),
                root.join("a.mp3").display()
            ),
        )
        .unwrap();

        assert_eq!(load(&playlist, &root).unwrap(), set(&["a.mp3"]));
    }

    #[test]
    fn pls_reads_only_numbered_file_entries() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("music");
        let playlist = dir.path().join("mix.pls");
        fs::write(
            &playlist,
            format!(
                "[playlist]\nFile1={}\nTitle1=Not a file\nFile2=b.mp3\nFileName=junk\nNumberOfEntries=2\nVersion=2\n",
                root.join("a.mp3").display()
            ),
        )
        .unwrap();

        assert_eq!(load(&playlist, &root).unwrap(), set(&["a.mp3", "b.mp3"]));
    }

    #[test]
    fn json_uses_relative_paths_and_skips_blank_ones() {
        let dir = TempDir::new().unwrap();
        let playlist = dir.path().join("mix.json");
        fs::write(
            &playlist,
            r#"{"songs":[{"relative_path":"live/b.flac","filename":"b.flac"},{"filename":"orphan.mp3"}]}"#,
        )
        .unwrap();

        assert_eq!(load(&playlist, dir.path()).unwrap(), set(&["live/b.flac"]));
    }

    #[test]
    fn unknown_extension_is_unsupported() {
        let dir = TempDir::new().unwrap();
        let playlist = dir.path().join("mix.txt");
        fs::write(&playlist, "a.mp3\n").unwrap();

        assert!(matches!(load(&playlist, dir.path()), Err(LibraryError::Unsupported(_))));
    }
}
