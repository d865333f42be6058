use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use clap::ValueEnum;
use crate::TrackRecord;

/// Search-box filters over the library view. All matches are
/// case-insensitive.
///
/// A non-empty `path` is a prefix match on the relative path and, when set,
/// is the only filter applied. Otherwise the remaining fields are substring
/// matches combined with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackFilter {
    pub search: String,
    pub tag: String,
    pub artist: String,
    pub album: String,
    pub path: String,
}

impl TrackFilter {
    pub fn is_empty(&self) -> bool {
        [&self.search, &self.tag, &self.artist, &self.album, &self.path]
            .iter()
            .all(|value| value.trim().is_empty())
    }

    /// SQL `AND ...` fragment plus its positional arguments.
    pub(crate) fn to_sql(&self) -> (String, Vec<String>) {
        let mut clause = String::new();
        let mut args = Vec::new();

        let path = self.path.trim().to_lowercase();
        if !path.is_empty() {
            clause.push_str(" AND LOWER(relative_path) LIKE ? ESCAPE '\\'");
            args.push(format!("{}%", escape_like(&path)));
            return (clause, args);
        }

        let columns = [
            ("filename", &self.search),
            ("tags", &self.tag),
            ("artist", &self.artist),
            ("album", &self.album),
        ];
        for (column, value) in columns {
            let value = value.trim().to_lowercase();
            if value.is_empty() {
                continue;
            }
            clause.push_str(&format!(" AND LOWER({}) LIKE ? ESCAPE '\\'", column));
            args.push(format!("%{}%", escape_like(&value)));
        }
        (clause, args)
    }
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Columns of the library view that can be sorted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SortColumn {
    Id,
    Filename,
    Path,
    Artist,
    Album,
    Tags,
}

impl SortColumn {
    /// Value shown in the column, which is also what sorting compares.
    pub fn display_value(self, track: &TrackRecord) -> String {
        match self {
            SortColumn::Id => track.id.to_string(),
            SortColumn::Filename => track.filename.clone(),
            SortColumn::Path => track.parent_dir(),
            SortColumn::Artist => track.artist.clone(),
            SortColumn::Album => track.album.clone(),
            SortColumn::Tags => track.tags.clone(),
        }
    }

    fn compare(self, a: &TrackRecord, b: &TrackRecord) -> Ordering {
        match self {
            SortColumn::Id => a.id.cmp(&b.id),
            _ => self
                .display_value(a)
                .to_lowercase()
                .cmp(&self.display_value(b).to_lowercase()),
        }
    }
}

impl fmt::Display for SortColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SortColumn::Id => "ID",
            SortColumn::Filename => "Filename",
            SortColumn::Path => "Path",
            SortColumn::Artist => "Artist",
            SortColumn::Album => "Album",
            SortColumn::Tags => "Tags",
        };
        f.write_str(name)
    }
}

/// Column-header sort state. Requesting the same column again flips the
/// direction; a new column starts ascending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SortState {
    current: Option<(SortColumn, bool)>,
}

impl SortState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&mut self, column: SortColumn) -> (SortColumn, bool) {
        let descending = match self.current {
            Some((current, descending)) if current == column => !descending,
            _ => false,
        };
        self.current = Some((column, descending));
        (column, descending)
    }

    /// Header label with a direction arrow on the sorted column.
    pub fn heading(&self, column: SortColumn) -> String {
        match self.current {
            Some((current, descending)) if current == column => {
                format!("{}{}", column, if descending { " ↓" } else { " ↑" })
            }
            _ => column.to_string(),
        }
    }

    /// Reorders `tracks` by the current column. Without a sort request the
    /// store's natural order is left untouched.
    pub fn apply(&self, tracks: &mut [TrackRecord]) {
        if let Some((column, descending)) = self.current {
            sort_tracks(tracks, column, descending);
        }
    }
}

pub fn sort_tracks(tracks: &mut [TrackRecord], column: SortColumn, descending: bool) {
    tracks.sort_by(|a, b| {
        let ordering = column.compare(a, b);
        if descending {
            ordering.reverse()
        } else {
            ordering
        }
    });
}

/// Ids of the rows whose relative path appears in `paths`, e.g. the entries
/// of a reloaded playlist.
pub fn select_matching(tracks: &[TrackRecord], paths: &BTreeSet<String>) -> Vec<i64> {
    tracks
        .iter()
        .filter(|track| paths.contains(&track.relative_path))
        .map(|track| track.id)
        .collect()
}
