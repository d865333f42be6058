use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use log::{debug, info, warn};
use serde::Serialize;
use crate::library::store::LibraryStore;
use crate::utils::file_ops::relative_path_of;
use crate::{is_audio_file, LibraryError, MetadataExtractor, Result, TrackMetadata};

/// Progress is reported on every `PROGRESS_EVERY`th extracted file and on the
/// last one.
pub const PROGRESS_EVERY: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanProgress {
    pub processed: usize,
    pub total: usize,
    pub current_file: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    /// Rows written to the store.
    pub inserted: usize,
    /// Files that got their previous non-empty tags back.
    pub preserved_tags: usize,
}

/// Rebuilds the store from a filesystem snapshot of the library root.
///
/// Every scan truncates the table and reinserts one row per audio file, so
/// ids change on each scan. User tags are carried over by exact relative
/// path only.
pub struct ScanReconciler<'a> {
    store: &'a mut LibraryStore,
}

impl<'a> ScanReconciler<'a> {
    pub fn new(store: &'a mut LibraryStore) -> Self {
        Self { store }
    }

    pub fn scan(&mut self, root: &Path) -> Result<ScanSummary> {
        self.scan_with_progress(root, |_| {})
    }

    pub fn scan_with_progress(
        &mut self,
        root: &Path,
        mut on_progress: impl FnMut(&ScanProgress),
    ) -> Result<ScanSummary> {
        if !root.is_dir() {
            return Err(LibraryError::FileMissing(root.to_path_buf()));
        }

        info!("Scanning directory structure: {}", root.display());
        let files = collect_audio_files(root);
        info!("Found {} audio files", files.len());

        let metadata = extract_reporting_progress(&files, &mut on_progress);

        self.store.transaction(|tx| {
            let existing = tx.tags_by_path()?;
            let removed = tx.truncate()?;
            debug!("Cleared {} rows ahead of rebuild", removed);

            let mut summary = ScanSummary::default();
            for (path, meta) in files.iter().zip(metadata) {
                let Some(relative_path) = relative_path_of(root, path) else {
                    warn!("Skipping {} outside of {}", path.display(), root.display());
                    continue;
                };
                let filename = file_name_of(path).unwrap_or_else(|| relative_path.clone());

                // Use existing tags if available, otherwise empty string
                let tags = existing.get(&relative_path).cloned().unwrap_or_default();
                if !tags.is_empty() {
                    summary.preserved_tags += 1;
                }

                if tx.insert_or_ignore(&relative_path, &filename, &tags, &meta.artist, &meta.album)? {
                    summary.inserted += 1;
                } else {
                    debug!("Ignoring duplicate path {}", relative_path);
                }
            }
            Ok(summary)
        })
    }
}

fn file_name_of(path: &Path) -> Option<String> {
    path.file_name().map(|name| name.to_string_lossy().into_owned())
}

/// Extracts metadata on the worker pool while `on_progress` runs on the
/// calling thread, fed over a channel as files complete.
fn extract_reporting_progress(
    files: &[PathBuf],
    on_progress: &mut impl FnMut(&ScanProgress),
) -> Vec<TrackMetadata> {
    let total = files.len();
    let (tx, rx) = mpsc::channel();

    thread::scope(|scope| {
        let worker = scope.spawn(move || {
            MetadataExtractor::extract_batch_with_progress(files, |done, path| {
                if (done - 1) % PROGRESS_EVERY == 0 || done == total {
                    let _ = tx.send(ScanProgress {
                        processed: done,
                        total,
                        current_file: file_name_of(path).unwrap_or_default(),
                    });
                }
            })
        });

        // Ends once the worker drops its sender.
        for progress in rx {
            on_progress(&progress);
        }
        worker
            .join()
            .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
    })
}

/// Recursively lists audio files under `root`, sorted for a stable
/// insertion order. The store's own database file is never included.
pub fn collect_audio_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| match e {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!("Error accessing entry: {}", err);
                None
            }
        })
        .filter(|e| e.file_type().is_file() && is_audio_file(e.path()))
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"not really audio").unwrap();
    }

    #[test]
    fn collects_only_audio_extensions_recursively() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "a.MP3");
        touch(dir.path(), "deep/er/b.wma");
        touch(dir.path(), "deep/cover.jpg");
        touch(dir.path(), "notes.txt");

        let files = collect_audio_files(dir.path());
        let relative: Vec<String> = files
            .iter()
            .map(|f| relative_path_of(dir.path(), f).unwrap())
            .collect();
        assert_eq!(relative, vec!["a.MP3", "deep/er/b.wma"]);
    }

    #[test]
    fn missing_root_leaves_store_untouched() {
        let mut store = LibraryStore::open_in_memory().unwrap();
        store.insert_or_ignore("a.mp3", "a.mp3", "rock", "", "").unwrap();

        let result = ScanReconciler::new(&mut store).scan(Path::new("/definitely/not/here"));

        assert!(matches!(result, Err(LibraryError::FileMissing(_))));
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn empty_root_clears_store_and_reports_nothing() {
        let dir = TempDir::new().unwrap();
        let mut store = LibraryStore::open_in_memory().unwrap();
        store.insert_or_ignore("gone.mp3", "gone.mp3", "rock", "", "").unwrap();

        let summary = ScanReconciler::new(&mut store).scan(dir.path()).unwrap();

        assert_eq!(summary, ScanSummary::default());
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn progress_fires_every_tenth_file_and_on_the_last() {
        let dir = TempDir::new().unwrap();
        for i in 0..23 {
            touch(dir.path(), &format!("track{:02}.mp3", i));
        }
        let mut store = LibraryStore::open_in_memory().unwrap();
        let mut seen = Vec::new();

        ScanReconciler::new(&mut store)
            .scan_with_progress(dir.path(), |p| seen.push((p.processed, p.total)))
            .unwrap();

        // Workers finish in any order, so only the set of reports is fixed.
        seen.sort();
        assert_eq!(seen, vec![(1, 23), (11, 23), (21, 23), (23, 23)]);
    }

    #[test]
    fn progress_is_reported_before_the_store_is_rebuilt() {
        let dir = TempDir::new().unwrap();
        for i in 0..15 {
            touch(dir.path(), &format!("track{:02}.mp3", i));
        }
        let mut store = LibraryStore::open(dir.path()).unwrap();
        store.insert_or_ignore("stale.mp3", "stale.mp3", "", "", "").unwrap();

        // A second connection sees the table as it was while files are
        // still being extracted.
        let observer = LibraryStore::open(dir.path()).unwrap();
        let mut rows_seen = Vec::new();
        ScanReconciler::new(&mut store)
            .scan_with_progress(dir.path(), |p| {
                assert!(!p.current_file.is_empty());
                rows_seen.push(observer.count().unwrap());
            })
            .unwrap();

        assert_eq!(rows_seen, vec![1, 1, 1]);
        assert_eq!(store.count().unwrap(), 15);
        assert_eq!(observer.count().unwrap(), 15);
    }
}
