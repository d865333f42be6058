//! SQLite-backed track table.
//!
//! One hidden database file lives at the root of each library. Its schema is
//! migrated additively on open, so databases written before the artist/album
//! columns existed keep working.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use log::info;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use crate::library::filter::TrackFilter;
use crate::library::tags::split_tags;
use crate::{LibraryError, Result, TrackRecord};

pub const DB_FILE_NAME: &str = ".music_manager.db";

const TRACK_COLUMNS: &str = "id, relative_path, filename, tags, artist, album";

pub struct LibraryStore {
    conn: Connection,
}

impl LibraryStore {
    /// Opens (creating if needed) the store at `<root>/.music_manager.db`.
    pub fn open(root: &Path) -> Result<Self> {
        Self::from_connection(Connection::open(Self::db_path(root))?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    pub fn db_path(root: &Path) -> PathBuf {
        root.join(DB_FILE_NAME)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let store = Self { conn };
        store.initialize_schema()?;
        store.migrate()?;
        Ok(store)
    }

    fn initialize_schema(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS songs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                relative_path TEXT UNIQUE NOT NULL,
                filename TEXT NOT NULL,
                tags TEXT,
                artist TEXT,
                album TEXT
            )",
            [],
        )?;
        Ok(())
    }

    fn migrate(&self) -> Result<()> {
        let mut stmt = self.conn.prepare("PRAGMA table_info(songs)")?;
        let columns = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        for column in ["artist", "album"] {
            if !columns.iter().any(|c| c == column) {
                info!("Adding missing '{}' column to songs table", column);
                self.conn
                    .execute(&format!("ALTER TABLE songs ADD COLUMN {} TEXT", column), [])?;
            }
        }
        Ok(())
    }

    fn row_to_track(row: &Row<'_>) -> rusqlite::Result<TrackRecord> {
        Ok(TrackRecord {
            id: row.get(0)?,
            relative_path: row.get(1)?,
            filename: row.get(2)?,
            tags: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
            artist: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
            album: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
        })
    }

    /// Runs `f` inside a transaction that commits only if `f` succeeds.
    pub fn transaction<T>(&mut self, f: impl FnOnce(&StoreTx<'_>) -> Result<T>) -> Result<T> {
        let tx = StoreTx {
            tx: self.conn.transaction()?,
        };
        let value = f(&tx)?;
        tx.tx.commit()?;
        Ok(value)
    }

    pub fn insert_or_ignore(
        &self,
        relative_path: &str,
        filename: &str,
        tags: &str,
        artist: &str,
        album: &str,
    ) -> Result<bool> {
        insert_or_ignore(&self.conn, relative_path, filename, tags, artist, album)
    }

    pub fn update_path(&self, id: i64, relative_path: &str, filename: &str) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE songs SET relative_path = ?1, filename = ?2 WHERE id = ?3",
            params![relative_path, filename, id],
        )?;
        expect_row(changed, id)
    }

    pub fn update_tags(&self, id: i64, tags: &str) -> Result<()> {
        let changed = self
            .conn
            .execute("UPDATE songs SET tags = ?1 WHERE id = ?2", params![tags, id])?;
        expect_row(changed, id)
    }

    /// Empty strings are stored as NULL.
    pub fn update_artist_album(&self, id: i64, artist: &str, album: &str) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE songs SET artist = ?1, album = ?2 WHERE id = ?3",
            params![non_empty(artist), non_empty(album), id],
        )?;
        expect_row(changed, id)
    }

    pub fn delete_by_id(&self, id: i64) -> Result<()> {
        let changed = self
            .conn
            .execute("DELETE FROM songs WHERE id = ?1", params![id])?;
        expect_row(changed, id)
    }

    pub fn get(&self, id: i64) -> Result<Option<TrackRecord>> {
        let sql = format!("SELECT {} FROM songs WHERE id = ?1", TRACK_COLUMNS);
        Ok(self
            .conn
            .query_row(&sql, params![id], Self::row_to_track)
            .optional()?)
    }

    pub fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM songs", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Rows matching `filter`, in insertion order.
    pub fn query(&self, filter: &TrackFilter) -> Result<Vec<TrackRecord>> {
        let (clause, args) = filter.to_sql();
        let sql = format!(
            "SELECT {} FROM songs WHERE 1=1{} ORDER BY id ASC",
            TRACK_COLUMNS, clause
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(args.iter()), Self::row_to_track)?;

        let mut tracks = Vec::new();
        for track in rows {
            tracks.push(track?);
        }
        Ok(tracks)
    }

    pub fn all(&self) -> Result<Vec<TrackRecord>> {
        self.query(&TrackFilter::default())
    }

    /// Every individual tag in use, sorted and deduplicated.
    pub fn all_tags(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT tags FROM songs WHERE tags IS NOT NULL AND tags != ''")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut all = BTreeSet::new();
        for tags in rows {
            all.extend(split_tags(&tags?));
        }
        Ok(all.into_iter().collect())
    }

    pub fn tags_by_path(&self) -> Result<HashMap<String, String>> {
        tags_by_path(&self.conn)
    }
}

/// Store handle scoped to an open transaction.
pub struct StoreTx<'conn> {
    tx: Transaction<'conn>,
}

impl StoreTx<'_> {
    pub fn tags_by_path(&self) -> Result<HashMap<String, String>> {
        tags_by_path(&self.tx)
    }

    /// Deletes every row. Ids keep counting up from the old maximum.
    pub fn truncate(&self) -> Result<usize> {
        Ok(self.tx.execute("DELETE FROM songs", [])?)
    }

    pub fn insert_or_ignore(
        &self,
        relative_path: &str,
        filename: &str,
        tags: &str,
        artist: &str,
        album: &str,
    ) -> Result<bool> {
        insert_or_ignore(&self.tx, relative_path, filename, tags, artist, album)
    }
}

fn tags_by_path(conn: &Connection) -> Result<HashMap<String, String>> {
    let mut stmt = conn.prepare("SELECT relative_path, tags FROM songs")?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?.unwrap_or_default()))
    })?;

    let mut map = HashMap::new();
    for row in rows {
        let (path, tags) = row?;
        map.insert(path, tags);
    }
    Ok(map)
}

/// Returns whether a row was inserted; a path already present is left as is.
fn insert_or_ignore(
    conn: &Connection,
    relative_path: &str,
    filename: &str,
    tags: &str,
    artist: &str,
    album: &str,
) -> Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO songs (relative_path, filename, tags, artist, album)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![relative_path, filename, tags, non_empty(artist), non_empty(album)],
    )?;
    Ok(inserted > 0)
}

fn expect_row(changed: usize, id: i64) -> Result<()> {
    if changed == 0 {
        Err(LibraryError::NotFound(id))
    } else {
        Ok(())
    }
}

fn non_empty(value: &str) -> Option<&str> {
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}
