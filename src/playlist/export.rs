use std::fs;
use std::path::Path;
use log::{debug, info};
use crate::playlist::{PlaylistDocument, PlaylistEntry, PlaylistKind};
use crate::utils::file_ops::{prepare_fresh_directory, FileManager};
use crate::utils::reporting::BatchReport;
use crate::{Result, TrackRecord};

/// Writes `tracks` in order as a playlist of the given kind.
///
/// For [`PlaylistKind::Folder`], `destination` is the folder to create and
/// fill with copies; an existing folder is only replaced when `overwrite` is
/// set. Copies keep going past individual failures. The file kinds write
/// `destination` in one go, so their report is all-or-nothing.
pub fn export(
    tracks: &[TrackRecord],
    root: &Path,
    kind: PlaylistKind,
    destination: &Path,
    overwrite: bool,
) -> Result<BatchReport> {
    match kind {
        PlaylistKind::Folder => copy_to_folder(tracks, root, destination, overwrite),
        PlaylistKind::M3u | PlaylistKind::Pls | PlaylistKind::Json => {
            let contents = match kind {
                PlaylistKind::M3u => render_m3u(tracks, root),
                PlaylistKind::Pls => render_pls(tracks, root),
                _ => render_json(tracks)?,
            };
            if let Some(parent) = destination.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(destination, contents)?;
            info!(
                "Created {} playlist with {} songs at {}",
                kind,
                tracks.len(),
                destination.display()
            );
            Ok(BatchReport {
                succeeded: tracks.len(),
                errors: Vec::new(),
            })
        }
    }
}

fn copy_to_folder(
    tracks: &[TrackRecord],
    root: &Path,
    destination: &Path,
    overwrite: bool,
) -> Result<BatchReport> {
    prepare_fresh_directory(destination, overwrite)?;
    let files = FileManager::new(root);

    let mut report = BatchReport::new();
    for (idx, track) in tracks.iter().enumerate() {
        debug!("Copying {} ({}/{})", track.filename, idx + 1, tracks.len());
        match files.copy_into(&track.relative_path, destination) {
            Ok(_) => report.record_success(),
            Err(err) => report.record_error(&track.filename, err),
        }
    }
    info!(
        "Created playlist folder with {} files at {}",
        report.succeeded,
        destination.display()
    );
    Ok(report)
}

fn render_m3u(tracks: &[TrackRecord], root: &Path) -> String {
    let mut out = String::from("#EXTM3U\n");
    for track in tracks {
        out.push_str(&track.absolute_path(root).to_string_lossy());
        out.push('\n');
    }
    out
}

fn render_pls(tracks: &[TrackRecord], root: &Path) -> String {
    let mut out = String::from("[playlist]\n");
    for (idx, track) in tracks.iter().enumerate() {
        out.push_str(&format!(
            "File{}={}\n",
            idx + 1,
            track.absolute_path(root).to_string_lossy()
        ));
    }
    out.push_str(&format!("NumberOfEntries={}\n", tracks.len()));
    out.push_str("Version=2\n");
    out
}

fn render_json(tracks: &[TrackRecord]) -> Result<String> {
    let document = PlaylistDocument {
        songs: tracks
            .iter()
            .map(|track| PlaylistEntry {
                relative_path: track.relative_path.clone(),
                filename: track.filename.clone(),
            })
            .collect(),
    };
    Ok(serde_json::to_string_pretty(&document)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;
    use crate::LibraryError;

    fn track(relative_path: &str) -> TrackRecord {
        TrackRecord {
            id: 1,
            relative_path: relative_path.to_string(),
            filename: relative_path.rsplit('/').next().unwrap().to_string(),
            tags: String::new(),
            artist: String::new(),
            album: String::new(),
        }
    }

    #[test]
    fn m3u_lists_absolute_paths_after_header() {
        let root = Path::new("/music");
        let rendered = render_m3u(&[track("a.mp3"), track("live/b.flac")], root);
        let expected = format!(
            "#EXTM3U\n{}\n{}\n",
            root.join("a.mp3").display(),
            root.join("live/b.flac").display()
        );
        assert_eq!(rendered, expected);
    }

    #[test]
    fn pls_numbers_entries_from_one_and_ends_with_count() {
        let root = Path::new("/music");
        let rendered = render_pls(&[track("a.mp3"), track("b.mp3")], root);
        let lines: Vec<&str> = rendered.lines().collect();

        assert_eq!(lines[0], "[playlist]");
        assert!(lines[1].starts_with("File1="));
        assert!(lines[2].starts_with("File2="));
        assert_eq!(&lines[3..], &["NumberOfEntries=2", "Version=2"]);
    }

    #[test]
    fn json_keeps_relative_paths_and_filenames() {
        let rendered = render_json(&[track("live/b.flac")]).unwrap();
        let document: PlaylistDocument = serde_json::from_str(&rendered).unwrap();
        assert_eq!(
            document.songs,
            vec![PlaylistEntry {
                relative_path: "live/b.flac".into(),
                filename: "b.flac".into(),
            }]
        );
    }

    #[test]
    fn folder_copy_continues_past_missing_files() {
        let root = TempDir::new().unwrap();
        fs::write(root.path().join("a.mp3"), b"a").unwrap();
        let dest = TempDir::new().unwrap();
        let folder = dest.path().join("Road Trip");

        let report = export(
            &[track("a.mp3"), track("gone.mp3")],
            root.path(),
            PlaylistKind::Folder,
            &folder,
            false,
        )
        .unwrap();

        assert_eq!(report.succeeded, 1);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].starts_with("gone.mp3: "));
        assert!(folder.join("a.mp3").exists());

        let again = export(&[track("a.mp3")], root.path(), PlaylistKind::Folder, &folder, false);
        assert!(matches!(again, Err(LibraryError::AlreadyExists(_))));
    }

    #[test]
    fn file_kinds_create_parent_directories() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("nested/mix.m3u");
        let report = export(&[track("a.mp3")], Path::new("/music"), PlaylistKind::M3u, &target, false).unwrap();

        assert_eq!(report.succeeded, 1);
        assert!(fs::read_to_string(target).unwrap().starts_with("#EXTM3U\n"));
    }
}
