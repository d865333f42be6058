use std::path::{Path, PathBuf};
use serde::Serialize;

pub mod audio;
pub mod config;
pub mod library;
pub mod playlist;
pub mod utils;
pub mod cli;

/// Extensions picked up by a scan, compared case-insensitively.
pub const AUDIO_EXTENSIONS: [&str; 7] = ["mp3", "wav", "flac", "m4a", "ogg", "aac", "wma"];

pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| AUDIO_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
        .unwrap_or(false)
}

/// One row of the library table.
///
/// `id` is assigned by the store and is rebuilt on every scan; anything that
/// must survive a rescan keys by `relative_path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackRecord {
    pub id: i64,
    pub relative_path: String,
    pub filename: String,
    pub tags: String,
    pub artist: String,
    pub album: String,
}

impl TrackRecord {
    /// Directory part of the relative path, `(root)` for top-level files.
    pub fn parent_dir(&self) -> String {
        match self.relative_path.rsplit_once('/') {
            Some((parent, _)) if !parent.is_empty() => parent.to_string(),
            _ => "(root)".to_string(),
        }
    }

    pub fn absolute_path(&self, root: &Path) -> PathBuf {
        root.join(&self.relative_path)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LibraryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Tag error: {0}")]
    Tag(#[from] lofty::error::LoftyError),
    #[error("Pattern error: {0}")]
    Pattern(#[from] regex::Error),
    #[error("No music root configured")]
    NoMusicRoot,
    #[error("Track {0} not found in library")]
    NotFound(i64),
    #[error("File not found: {0}")]
    FileMissing(PathBuf),
    #[error("Already exists: {0}")]
    AlreadyExists(PathBuf),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Unsupported: {0}")]
    Unsupported(String),
    #[error("Playback unavailable: {0}")]
    PlaybackUnavailable(String),
    #[error("Failed to play audio: {0}")]
    PlaybackLoad(String),
    #[error("Seeking requires a playing track with a known length")]
    SeekUnavailable,
}

pub type Result<T> = std::result::Result<T, LibraryError>;

// Re-exports for convenience
pub use audio::metadata::{ContainerFamily, MetadataExtractor, TrackMetadata};
pub use audio::session::{PlaybackSession, PlaybackState, SessionEvent, StopReason};
pub use config::AppConfig;
pub use library::filter::{SortColumn, SortState, TrackFilter};
pub use library::scan::{ScanProgress, ScanReconciler, ScanSummary};
pub use library::store::LibraryStore;
pub use playlist::PlaylistKind;
pub use utils::reporting::BatchReport;
