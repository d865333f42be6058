use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use log::debug;
use lofty::config::ParseOptions;
use lofty::file::{AudioFile, FileType, TaggedFile, TaggedFileExt};
use lofty::prelude::Accessor;
use lofty::probe::Probe;
use lofty::tag::{Tag, TagType};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::{MetadataOptions, MetadataRevision, StandardTagKey};
use symphonia::core::probe::{Hint, ProbeResult};
use crate::utils::parallel::ParallelProcessor;
use rayon::prelude::*;

/// Artist and album as read from a file's tags. Empty means unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackMetadata {
    pub artist: String,
    pub album: String,
}

impl TrackMetadata {
    pub fn is_empty(&self) -> bool {
        self.artist.is_empty() && self.album.is_empty()
    }

    fn fill_from(&mut self, other: TrackMetadata) {
        if self.artist.is_empty() {
            self.artist = other.artist;
        }
        if self.album.is_empty() {
            self.album = other.album;
        }
    }
}

/// Tag container family of an audio file. Each family stores artist/album
/// under its own native keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerFamily {
    Id3,
    VorbisComment,
    Atom,
    Generic,
}

impl ContainerFamily {
    /// Sniffs the file content, falling back to the extension when the
    /// content cannot be identified.
    pub fn detect(path: &Path) -> Self {
        match Probe::open(path) {
            Ok(probe) => match probe.guess_file_type() {
                Ok(probe) => {
                    if let Some(file_type) = probe.file_type() {
                        return Self::from_file_type(file_type);
                    }
                }
                Err(err) => debug!("Could not sniff {}: {}", path.display(), err),
            },
            Err(err) => debug!("Could not open {} for probing: {}", path.display(), err),
        }
        Self::from_extension(path)
    }

    pub fn from_file_type(file_type: FileType) -> Self {
        match file_type {
            FileType::Mpeg => ContainerFamily::Id3,
            FileType::Flac | FileType::Vorbis | FileType::Opus | FileType::Speex => {
                ContainerFamily::VorbisComment
            }
            FileType::Mp4 => ContainerFamily::Atom,
            _ => ContainerFamily::Generic,
        }
    }

    pub fn from_extension(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "mp3" => ContainerFamily::Id3,
            "flac" | "ogg" | "oga" | "opus" => ContainerFamily::VorbisComment,
            "m4a" | "mp4" => ContainerFamily::Atom,
            _ => ContainerFamily::Generic,
        }
    }

    fn tag_types(self) -> &'static [TagType] {
        match self {
            ContainerFamily::Id3 => &[TagType::Id3v2, TagType::Id3v1],
            ContainerFamily::VorbisComment => &[TagType::VorbisComments],
            ContainerFamily::Atom => &[TagType::Mp4Ilst],
            ContainerFamily::Generic => &[TagType::Id3v2, TagType::RiffInfo, TagType::Ape],
        }
    }

    /// Raw key names this family uses for the artist field.
    pub fn artist_keys(self) -> &'static [&'static str] {
        match self {
            ContainerFamily::Id3 => &["TPE1"],
            ContainerFamily::VorbisComment => &["ARTIST"],
            ContainerFamily::Atom => &["\u{a9}ART"],
            ContainerFamily::Generic => &["TPE1", "ARTIST", "IART"],
        }
    }

    /// Raw key names this family uses for the album field.
    pub fn album_keys(self) -> &'static [&'static str] {
        match self {
            ContainerFamily::Id3 => &["TALB"],
            ContainerFamily::VorbisComment => &["ALBUM"],
            ContainerFamily::Atom => &["\u{a9}alb"],
            ContainerFamily::Generic => &["TALB", "ALBUM", "IPRD"],
        }
    }
}

pub struct MetadataExtractor;

impl ParallelProcessor for MetadataExtractor {}

impl MetadataExtractor {
    /// Best-effort artist/album for `path`. Unsupported, corrupt or
    /// unreadable files yield empty fields; this never fails.
    pub fn extract(path: impl AsRef<Path>) -> TrackMetadata {
        let path = path.as_ref();
        let family = ContainerFamily::detect(path);

        let mut metadata = read_tagged_file(path, false)
            .map(|tagged_file| metadata_from_lofty(&tagged_file, family))
            .unwrap_or_default();

        if metadata.artist.is_empty() || metadata.album.is_empty() {
            if let Some(fallback) = metadata_from_symphonia(path, family) {
                metadata.fill_from(fallback);
            }
        }

        if metadata.is_empty() {
            debug!("No artist/album found for {} ({:?})", path.display(), family);
        }
        metadata
    }

    /// Extracts every path in parallel. Results keep the input order and a
    /// failing file only ever produces empty metadata for itself.
    pub fn extract_batch(paths: &[PathBuf]) -> Vec<TrackMetadata> {
        Self::extract_batch_with_progress(paths, |_, _| {})
    }

    /// [`extract_batch`](Self::extract_batch) that calls `on_extracted` with
    /// the number of files done so far (from 1) and the file just finished.
    /// Calls come from the worker threads, in completion order.
    pub fn extract_batch_with_progress<F>(paths: &[PathBuf], on_extracted: F) -> Vec<TrackMetadata>
    where
        F: Fn(usize, &Path) + Sync,
    {
        Self::init_parallel_processing(None);
        let progress = Self::get_progress_counter();

        paths
            .par_iter()
            .map(|path| {
                let metadata = Self::extract(path);
                let done = progress.fetch_add(1, Ordering::SeqCst) + 1;
                on_extracted(done, path.as_path());
                metadata
            })
            .collect()
    }

    /// Track length in seconds, `0.0` when it cannot be determined.
    pub fn probe_duration(path: impl AsRef<Path>) -> f64 {
        let path = path.as_ref();
        if let Some(tagged_file) = read_tagged_file(path, true) {
            let secs = tagged_file.properties().duration().as_secs_f64();
            if secs > 0.0 {
                return secs;
            }
        }

        let Some(probed) = open_symphonia_probe(path) else {
            debug!("Duration probe failed for {}", path.display());
            return 0.0;
        };

        // Try to get format info
        if let Some(track) = probed.format.default_track() {
            let params = &track.codec_params;
            if let (Some(time_base), Some(n_frames)) = (params.time_base, params.n_frames) {
                let time = time_base.calc_time(n_frames);
                return time.seconds as f64 + time.frac;
            }
        }
        0.0
    }
}

fn read_tagged_file(path: &Path, read_properties: bool) -> Option<TaggedFile> {
    let options = ParseOptions::new()
        .read_properties(read_properties)
        .read_cover_art(false);

    let probe = match Probe::open(path) {
        Ok(probe) => probe.options(options),
        Err(err) => {
            debug!("Tag read could not open {}: {}", path.display(), err);
            return None;
        }
    };
    let probe = match probe.guess_file_type() {
        Ok(probe) => probe,
        Err(err) => {
            debug!("Tag read could not identify {}: {}", path.display(), err);
            return None;
        }
    };
    match probe.read() {
        Ok(tagged_file) => Some(tagged_file),
        Err(err) => {
            debug!("Tag read failed for {}: {}", path.display(), err);
            None
        }
    }
}

fn clean(value: Option<Cow<'_, str>>) -> String {
    value.map(|v| v.trim().to_string()).unwrap_or_default()
}

fn metadata_from_tag(tag: &Tag) -> TrackMetadata {
    TrackMetadata {
        artist: clean(tag.artist()),
        album: clean(tag.album()),
    }
}

fn metadata_from_lofty(tagged_file: &TaggedFile, family: ContainerFamily) -> TrackMetadata {
    let mut metadata = TrackMetadata::default();

    // The family's own tag wins over whatever else the file carries.
    for tag_type in family.tag_types() {
        if let Some(tag) = tagged_file.tag(*tag_type) {
            metadata.fill_from(metadata_from_tag(tag));
        }
    }
    if let Some(tag) = tagged_file.primary_tag() {
        metadata.fill_from(metadata_from_tag(tag));
    }
    for tag in tagged_file.tags() {
        if !metadata.artist.is_empty() && !metadata.album.is_empty() {
            break;
        }
        metadata.fill_from(metadata_from_tag(tag));
    }
    metadata
}

fn open_symphonia_probe(path: &Path) -> Option<ProbeResult> {
    let file = std::fs::File::open(path).ok()?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    // Create hint to help with format detection
    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(extension);
    }

    symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .ok()
}

fn key_matches(raw_key: &str, keys: &[&str]) -> bool {
    let raw_key = raw_key.trim();
    keys.iter().any(|key| raw_key.eq_ignore_ascii_case(key))
}

fn apply_revision(metadata: &mut TrackMetadata, revision: &MetadataRevision, family: ContainerFamily) {
    for tag in revision.tags() {
        let value = tag.value.to_string().trim().to_string();
        if value.is_empty() {
            continue;
        }
        let is_artist = matches!(tag.std_key, Some(StandardTagKey::Artist))
            || key_matches(&tag.key, family.artist_keys());
        let is_album = matches!(tag.std_key, Some(StandardTagKey::Album))
            || key_matches(&tag.key, family.album_keys());

        if is_artist && metadata.artist.is_empty() {
            metadata.artist = value;
        } else if is_album && metadata.album.is_empty() {
            metadata.album = value;
        }
    }
}

fn metadata_from_symphonia(path: &Path, family: ContainerFamily) -> Option<TrackMetadata> {
    let mut probed = open_symphonia_probe(path)?;
    let mut metadata = TrackMetadata::default();

    // ID3 blocks in front of the stream are surfaced by the probe itself.
    if let Some(probe_meta) = probed.metadata.get() {
        if let Some(revision) = probe_meta.current() {
            apply_revision(&mut metadata, revision, family);
        }
    }

    while !probed.format.metadata().is_latest() {
        probed.format.metadata().pop();
    }
    if let Some(revision) = probed.format.metadata().current() {
        apply_revision(&mut metadata, revision, family);
    }

    if metadata.is_empty() {
        None
    } else {
        Some(metadata)
    }
}
