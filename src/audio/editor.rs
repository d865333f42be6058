//! Reads and writes the fixed set of ID3 fields exposed for editing.

use std::path::Path;
use lofty::config::WriteOptions;
use lofty::file::{AudioFile, TaggedFileExt};
use lofty::prelude::Accessor;
use lofty::read_from_path;
use lofty::tag::{ItemKey, Tag, TagType};
use log::info;
use serde::Serialize;
use crate::audio::metadata::ContainerFamily;
use crate::{LibraryError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EditableFields {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub year: String,
    pub track: String,
    pub genre: String,
    pub album_artist: String,
    pub comment: String,
}

fn ensure_editable(path: &Path) -> Result<()> {
    if ContainerFamily::from_extension(path) == ContainerFamily::Id3 {
        Ok(())
    } else {
        Err(LibraryError::Unsupported(format!(
            "metadata editing is only available for MP3 files: {}",
            path.display()
        )))
    }
}

fn text(tag: &Tag, key: ItemKey) -> String {
    tag.get_string(key).map(|v| v.trim().to_string()).unwrap_or_default()
}

pub fn read_fields(path: &Path) -> Result<EditableFields> {
    ensure_editable(path)?;
    let tagged_file = read_from_path(path)?;
    let Some(tag) = tagged_file.tag(TagType::Id3v2).or_else(|| tagged_file.primary_tag()) else {
        return Ok(EditableFields::default());
    };

    let year = {
        let year = text(tag, ItemKey::Year);
        if year.is_empty() {
            text(tag, ItemKey::RecordingDate)
        } else {
            year
        }
    };

    Ok(EditableFields {
        title: text(tag, ItemKey::TrackTitle),
        artist: text(tag, ItemKey::TrackArtist),
        album: text(tag, ItemKey::AlbumTitle),
        year,
        track: text(tag, ItemKey::TrackNumber),
        genre: text(tag, ItemKey::Genre),
        album_artist: text(tag, ItemKey::AlbumArtist),
        comment: text(tag, ItemKey::Comment),
    })
}

fn set_or_remove(tag: &mut Tag, key: ItemKey, value: &str) {
    tag.remove_key(key);
    let value = value.trim();
    if !value.is_empty() {
        tag.insert_text(key, value.to_string());
    }
}

/// Writes every field; an empty value removes the item from the tag.
pub fn write_fields(path: &Path, fields: &EditableFields) -> Result<()> {
    ensure_editable(path)?;
    let mut tagged_file = read_from_path(path)?;
    if tagged_file.tag(TagType::Id3v2).is_none() {
        tagged_file.insert_tag(Tag::new(TagType::Id3v2));
    }
    let tag = tagged_file
        .tag_mut(TagType::Id3v2)
        .ok_or_else(|| LibraryError::Unsupported(format!("no writable ID3v2 tag for {}", path.display())))?;

    if fields.title.trim().is_empty() {
        tag.remove_title();
    } else {
        tag.set_title(fields.title.trim().to_string());
    }
    if fields.artist.trim().is_empty() {
        tag.remove_artist();
    } else {
        tag.set_artist(fields.artist.trim().to_string());
    }
    if fields.album.trim().is_empty() {
        tag.remove_album();
    } else {
        tag.set_album(fields.album.trim().to_string());
    }
    tag.remove_key(ItemKey::RecordingDate);
    set_or_remove(tag, ItemKey::Year, &fields.year);
    set_or_remove(tag, ItemKey::TrackNumber, &fields.track);
    set_or_remove(tag, ItemKey::Genre, &fields.genre);
    set_or_remove(tag, ItemKey::AlbumArtist, &fields.album_artist);
    set_or_remove(tag, ItemKey::Comment, &fields.comment);

    tagged_file.save_to_path(path, WriteOptions::default())?;
    info!("Saved ID3 fields for {}", path.display());
    Ok(())
}
