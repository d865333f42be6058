use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use crate::audio::editor::EditableFields;
use crate::library::tags::TagOperation;
use crate::{PlaylistKind, SortColumn, TrackFilter};

#[derive(Parser)]
#[command(name = "music-shelf")]
#[command(author = "Dalac")]
#[command(version = "1.0")]
#[command(about = "Index, tag, play and export a local music library", long_about = None)]
pub struct Cli {
    /// Directory holding config.json and saved playlists [default: next to the executable]
    #[arg(long = "app-dir", global = true)]
    pub app_dir: Option<PathBuf>,

    /// Worker threads for metadata extraction [default: all cores]
    #[arg(short = 'j', long, global = true)]
    pub threads: Option<usize>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Set the music root directory and scan it
    Root {
        /// Library root; prints the current one when omitted
        dir: Option<PathBuf>,
    },

    /// Rebuild the library index from disk, keeping tags by path
    Scan,

    /// List library tracks
    List {
        #[command(flatten)]
        filter: FilterArgs,

        /// Sort by column; repeating a column flips to descending
        #[arg(short = 's', long = "sort", value_enum)]
        sort: Vec<SortColumn>,

        /// Mark the tracks contained in this playlist (name or path)
        #[arg(short = 'p', long)]
        playlist: Option<String>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Replace the tags of one track
    Tag {
        id: i64,

        /// Comma-separated tags; empty clears them
        tags: String,
    },

    /// Apply one tag operation to many tracks
    BulkTag {
        #[arg(value_enum)]
        operation: TagOperation,

        /// Comma-separated tags the operation uses
        #[arg(short = 't', long, default_value = "")]
        tags: String,

        #[arg(required = true)]
        ids: Vec<i64>,
    },

    /// Autocomplete the tag being typed at the end of TEXT
    Suggest {
        text: String,

        /// Cursor position in characters [default: end of text]
        #[arg(long)]
        cursor: Option<usize>,

        /// Apply this suggestion and print the resulting text
        #[arg(long)]
        apply: Option<String>,
    },

    /// Rename a track's file in place, keeping its tags
    Rename {
        id: i64,
        new_name: String,

        /// Allow the file extension to change
        #[arg(long)]
        allow_extension_change: bool,
    },

    /// Delete tracks from disk and from the library
    Delete {
        #[arg(required = true)]
        ids: Vec<i64>,

        /// Confirm the deletion
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Show or edit the ID3 fields of an MP3 track
    EditMeta {
        id: i64,

        #[command(flatten)]
        fields: FieldArgs,
    },

    /// Play a track. Type `seek <pct>`, `vol <pct>` or `stop` while it plays
    Play {
        id: i64,

        /// Volume in percent
        #[arg(short = 'v', long, value_parser = clap::value_parser!(u8).range(0..=100))]
        volume: Option<u8>,

        /// Start at this percentage of the track
        #[arg(long, value_parser = parse_percentage)]
        seek: Option<f64>,
    },

    /// Create, load and manage playlists
    Playlist {
        #[command(subcommand)]
        action: PlaylistCommands,
    },
}

fn parse_percentage(raw: &str) -> Result<f64, String> {
    let value: f64 = raw
        .trim_end_matches('%')
        .parse()
        .map_err(|_| format!("not a number: {}", raw))?;
    if (0.0..=100.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("expected a percentage between 0 and 100, got {}", raw))
    }
}

#[derive(Subcommand)]
pub enum PlaylistCommands {
    /// Export tracks as a playlist
    Create {
        name: String,

        #[arg(short = 'k', long, value_enum, default_value = "m3u")]
        kind: PlaylistKind,

        /// Destination directory [default: the saved playlists directory]
        #[arg(short = 'o', long)]
        dest: Option<PathBuf>,

        /// Replace an existing playlist folder
        #[arg(long)]
        overwrite: bool,

        /// Tracks to include; without ids every track matching the filters is used
        #[arg(long = "id")]
        ids: Vec<i64>,

        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Show the tracks of a playlist that are in the library
    Load {
        /// Saved playlist name or path to a playlist file
        playlist: String,
    },

    /// List saved playlists
    List,

    /// Delete a saved playlist
    Delete {
        playlist: String,
    },

    /// Copy a saved playlist file somewhere else
    Copy {
        playlist: String,
        dest: PathBuf,
    },
}

#[derive(Args, Debug, Default, Clone)]
pub struct FilterArgs {
    /// Filename contains
    #[arg(short = 'q', long, default_value = "")]
    pub search: String,

    /// Tags contain
    #[arg(long, default_value = "")]
    pub tag: String,

    /// Artist contains
    #[arg(long, default_value = "")]
    pub artist: String,

    /// Album contains
    #[arg(long, default_value = "")]
    pub album: String,

    /// Relative path starts with; overrides the other filters
    #[arg(long, default_value = "")]
    pub path: String,
}

impl From<FilterArgs> for TrackFilter {
    fn from(args: FilterArgs) -> Self {
        TrackFilter {
            search: args.search,
            tag: args.tag,
            artist: args.artist,
            album: args.album,
            path: args.path,
        }
    }
}

#[derive(Args, Debug, Default, Clone)]
pub struct FieldArgs {
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub artist: Option<String>,
    #[arg(long)]
    pub album: Option<String>,
    #[arg(long)]
    pub year: Option<String>,
    #[arg(long)]
    pub track: Option<String>,
    #[arg(long)]
    pub genre: Option<String>,
    #[arg(long = "album-artist")]
    pub album_artist: Option<String>,
    #[arg(long)]
    pub comment: Option<String>,
}

impl FieldArgs {
    pub fn is_empty(&self) -> bool {
        [
            &self.title,
            &self.artist,
            &self.album,
            &self.year,
            &self.track,
            &self.genre,
            &self.album_artist,
            &self.comment,
        ]
        .iter()
        .all(|field| field.is_none())
    }

    /// Overwrites only the fields given on the command line.
    pub fn merge_into(self, fields: &mut EditableFields) {
        let pairs = [
            (self.title, &mut fields.title),
            (self.artist, &mut fields.artist),
            (self.album, &mut fields.album),
            (self.year, &mut fields.year),
            (self.track, &mut fields.track),
            (self.genre, &mut fields.genre),
            (self.album_artist, &mut fields.album_artist),
            (self.comment, &mut fields.comment),
        ];
        for (given, slot) in pairs {
            if let Some(value) = given {
                *slot = value;
            }
        }
    }
}
