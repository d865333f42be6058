use std::path::{Component, Path, PathBuf};
use std::fs;
use log::debug;
use crate::{LibraryError, Result};

/// Root-relative form of `path` with `/` separators, or `None` when `path`
/// does not live under `root`. A `..` after the root counts as outside.
pub fn relative_path_of(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Filesystem side of library edits. All paths handed in are relative to the
/// library root.
pub struct FileManager {
    root: PathBuf,
}

impl FileManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
        }
    }

    /// Renames the file in place (same directory) and returns its new
    /// relative path.
    pub fn rename(
        &self,
        relative_path: &str,
        new_filename: &str,
        allow_extension_change: bool,
    ) -> Result<String> {
        let new_filename = new_filename.trim();
        if new_filename.is_empty() {
            return Err(LibraryError::InvalidInput("Filename cannot be empty".into()));
        }
        if new_filename.contains('/') || new_filename.contains('\\') {
            return Err(LibraryError::InvalidInput(format!(
                "Filename must not contain a path separator: {}",
                new_filename
            )));
        }

        let file_path = self.root.join(relative_path);
        if !file_path.exists() {
            return Err(LibraryError::FileMissing(file_path));
        }

        let old_ext = extension_lowercase(&file_path);
        let new_path = file_path
            .parent()
            .unwrap_or(&self.root)
            .join(new_filename);
        if !allow_extension_change && extension_lowercase(&new_path) != old_ext {
            return Err(LibraryError::InvalidInput(format!(
                "File extension changed from '{}' to '{}'; this may make the file unplayable",
                old_ext,
                extension_lowercase(&new_path)
            )));
        }

        // Handle case where file already exists in destination
        if new_path.exists() {
            return Err(LibraryError::AlreadyExists(new_path));
        }

        fs::rename(&file_path, &new_path)?;
        relative_path_of(&self.root, &new_path)
            .ok_or_else(|| LibraryError::InvalidInput(format!("{} escaped the library root", new_path.display())))
    }

    /// Removes the file if it is still there. Returns whether anything was
    /// deleted.
    pub fn delete(&self, relative_path: &str) -> Result<bool> {
        let file_path = self.root.join(relative_path);
        if file_path.exists() {
            fs::remove_file(&file_path)?;
            Ok(true)
        } else {
            debug!("{} already gone from disk", file_path.display());
            Ok(false)
        }
    }

    /// Copies a library file into `destination_dir`, keeping its filename.
    pub fn copy_into(&self, relative_path: &str, destination_dir: &Path) -> Result<PathBuf> {
        let source = self.root.join(relative_path);
        let file_name = source.file_name()
            .ok_or_else(|| std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Invalid file path"
            ))?;
        let destination = destination_dir.join(file_name);
        fs::copy(&source, &destination)?;
        Ok(destination)
    }
}

/// Creates `dir`, replacing an existing one only when `overwrite` is set.
pub fn prepare_fresh_directory(dir: &Path, overwrite: bool) -> Result<()> {
    if dir.exists() {
        if !overwrite {
            return Err(LibraryError::AlreadyExists(dir.to_path_buf()));
        }
        fs::remove_dir_all(dir)?;
    }
    fs::create_dir_all(dir)?;
    Ok(())
}

fn extension_lowercase(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn relative_path_uses_forward_slashes() {
        let root = Path::new("/music");
        assert_eq!(
            relative_path_of(root, &root.join("rock").join("a.mp3")).as_deref(),
            Some("rock/a.mp3")
        );
        assert_eq!(relative_path_of(root, Path::new("/elsewhere/a.mp3")), None);
        assert_eq!(relative_path_of(root, root), None);
    }

    #[test]
    fn relative_path_refuses_to_climb_out_of_root() {
        let root = Path::new("/music");
        assert_eq!(relative_path_of(root, &root.join("../x.mp3")), None);
        assert_eq!(relative_path_of(root, &root.join("rock/../../x.mp3")), None);
        assert_eq!(
            relative_path_of(root, &root.join("./rock/a.mp3")).as_deref(),
            Some("rock/a.mp3")
        );
    }

    #[test]
    fn rename_keeps_directory_and_reports_new_path() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("live")).unwrap();
        fs::write(dir.path().join("live/old.mp3"), b"x").unwrap();

        let files = FileManager::new(dir.path());
        let renamed = files.rename("live/old.mp3", "new.mp3", false).unwrap();

        assert_eq!(renamed, "live/new.mp3");
        assert!(dir.path().join("live/new.mp3").exists());
        assert!(!dir.path().join("live/old.mp3").exists());
    }

    #[test]
    fn rename_refuses_extension_change_and_collisions() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.mp3"), b"x").unwrap();
        fs::write(dir.path().join("b.mp3"), b"y").unwrap();
        let files = FileManager::new(dir.path());

        assert!(matches!(
            files.rename("a.mp3", "a.wav", false),
            Err(LibraryError::InvalidInput(_))
        ));
        assert!(matches!(
            files.rename("a.mp3", "b.mp3", false),
            Err(LibraryError::AlreadyExists(_))
        ));
        assert!(matches!(
            files.rename("a.mp3", "  ", false),
            Err(LibraryError::InvalidInput(_))
        ));
        assert!(matches!(
            files.rename("missing.mp3", "c.mp3", false),
            Err(LibraryError::FileMissing(_))
        ));
        assert_eq!(files.rename("a.mp3", "a.MP3x", true).unwrap(), "a.MP3x");
    }

    #[test]
    fn fresh_directory_requires_overwrite_when_present() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("mix");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("stale.mp3"), b"x").unwrap();

        assert!(matches!(
            prepare_fresh_directory(&target, false),
            Err(LibraryError::AlreadyExists(_))
        ));
        prepare_fresh_directory(&target, true).unwrap();
        assert!(target.exists());
        assert!(!target.join("stale.mp3").exists());
    }
}
