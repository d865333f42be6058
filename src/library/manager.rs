use std::path::{Path, PathBuf};
use log::{debug, info};
use crate::audio::editor::{self, EditableFields};
use crate::library::filter::TrackFilter;
use crate::library::scan::{ScanProgress, ScanReconciler, ScanSummary};
use crate::library::store::LibraryStore;
use crate::library::tags::{self, TagOperation};
use crate::utils::file_ops::FileManager;
use crate::utils::reporting::BatchReport;
use crate::{LibraryError, Result, TrackRecord};

/// A library root together with its store. File-level edits go through
/// here so the disk and the table stay in step.
pub struct Library {
    root: PathBuf,
    store: LibraryStore,
    files: FileManager,
}

impl Library {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(LibraryError::FileMissing(root));
        }
        let store = LibraryStore::open(&root)?;
        Ok(Self::with_store(root, store))
    }

    pub fn with_store(root: impl Into<PathBuf>, store: LibraryStore) -> Self {
        let root = root.into();
        Self {
            files: FileManager::new(root.clone()),
            root,
            store,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn store(&self) -> &LibraryStore {
        &self.store
    }

    pub fn scan(&mut self, on_progress: impl FnMut(&ScanProgress)) -> Result<ScanSummary> {
        let summary = ScanReconciler::new(&mut self.store).scan_with_progress(&self.root, on_progress)?;
        info!(
            "Scanned {} audio files, preserved tags for {}",
            summary.inserted, summary.preserved_tags
        );
        Ok(summary)
    }

    pub fn tracks(&self, filter: &TrackFilter) -> Result<Vec<TrackRecord>> {
        self.store.query(filter)
    }

    pub fn track(&self, id: i64) -> Result<TrackRecord> {
        self.store.get(id)?.ok_or(LibraryError::NotFound(id))
    }

    /// Absolute path of a track that must still exist on disk.
    pub fn existing_path(&self, id: i64) -> Result<PathBuf> {
        let path = self.track(id)?.absolute_path(&self.root);
        if path.exists() {
            Ok(path)
        } else {
            Err(LibraryError::FileMissing(path))
        }
    }

    /// Renames a track's file and its row together, so its tags survive the
    /// next rescan.
    pub fn rename(&self, id: i64, new_filename: &str, allow_extension_change: bool) -> Result<TrackRecord> {
        let track = self.track(id)?;
        let new_filename = new_filename.trim();
        if new_filename == track.filename {
            debug!("Rename of {} is a no-op", track.relative_path);
            return Ok(track);
        }

        let new_relative = self
            .files
            .rename(&track.relative_path, new_filename, allow_extension_change)?;
        self.store.update_path(id, &new_relative, new_filename)?;
        info!("Renamed {} -> {}", track.relative_path, new_relative);
        self.track(id)
    }

    /// Deletes each track's file and row. Keeps going past failures.
    pub fn delete(&self, ids: &[i64]) -> BatchReport {
        let mut report = BatchReport::new();
        for &id in ids {
            match self.delete_one(id) {
                Ok(()) => report.record_success(),
                Err(err) => report.record_error(format!("#{}", id), err),
            }
        }
        report
    }

    fn delete_one(&self, id: i64) -> Result<()> {
        let track = self.track(id)?;
        self.files.delete(&track.relative_path)?;
        self.store.delete_by_id(id)?;
        info!("Deleted {}", track.relative_path);
        Ok(())
    }

    pub fn set_tags(&self, id: i64, tags: &str) -> Result<()> {
        self.store.update_tags(id, tags)
    }

    /// Applies one tag operation to every selected track.
    pub fn bulk_edit_tags(&self, ids: &[i64], operation: TagOperation, input: &str) -> BatchReport {
        let input = tags::split_tags(input);
        let mut report = BatchReport::new();
        for &id in ids {
            let result = self
                .track(id)
                .and_then(|track| self.store.update_tags(id, &operation.apply(&track.tags, &input)));
            match result {
                Ok(()) => report.record_success(),
                Err(err) => report.record_error(format!("#{}", id), err),
            }
        }
        report
    }

    /// Autocomplete for the tag editor.
    pub fn suggest_tags(&self, text: &str, cursor: usize) -> Result<Vec<String>> {
        Ok(tags::suggest_tags(&self.store.all_tags()?, text, cursor))
    }

    pub fn read_fields(&self, id: i64) -> Result<EditableFields> {
        editor::read_fields(&self.existing_path(id)?)
    }

    /// Writes the fixed field set into the file and mirrors artist/album
    /// into the store.
    pub fn edit_metadata(&self, id: i64, fields: &EditableFields) -> Result<()> {
        let path = self.existing_path(id)?;
        editor::write_fields(&path, fields)?;
        self.store.update_artist_album(id, &fields.artist, &fields.album)
    }
}
