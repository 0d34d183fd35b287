//! # Local Library Module
//!
//! SQLite-backed playlist store implementing [`PlaylistService`]. The CLI
//! runs flows against it; playlists get in and out as JSON snapshots.
//!
//! ## Schema
//!
//! ```sql
//! playlist       (id TEXT PRIMARY KEY, name TEXT, position INTEGER, owned INTEGER)
//! playlist_track (playlist_id TEXT, position INTEGER, track_id TEXT NULL,
//!                 is_local INTEGER, available INTEGER)
//! ```
//!
//! `position` keeps enumeration and track order stable across runs.

use crate::collection::{CollectionInfo, ItemId};
use crate::service::{PlaylistRecord, PlaylistService, ServiceError, TrackEntry};
use anyhow::{Context, Result};
use log::{debug, info, trace};
use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;

/// Serialized form of a whole library.
///
/// ```json
/// { "playlists": [ { "id": "p1", "name": "🎵 Mix", "owned": true,
///                    "tracks": [ { "id": "t1" }, { "id": "t2", "is_local": true } ] } ] }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibrarySnapshot {
    #[serde(default)]
    pub playlists: Vec<PlaylistRecord>,
}

impl LibrarySnapshot {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Invalid library snapshot JSON")
    }

    pub fn read_from(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("Failed to parse snapshot {}", path.display()))
    }

    pub fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        serde_json::to_writer_pretty(writer, self).context("Failed to serialize library snapshot")
    }
}

/// Counts reported by [`LocalLibrary::import_snapshot`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportStats {
    pub playlists: usize,
    pub tracks: usize,
}

/// Playlists and their tracks in a SQLite database.
pub struct LocalLibrary {
    conn: Connection,
}

impl LocalLibrary {
    /// Opens (or creates) the library at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create library directory {}", parent.display())
            })?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open library at {}", path.display()))?;
        debug!("Opened library at {}", path.display());
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory library")?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             CREATE TABLE IF NOT EXISTS playlist (
                 id       TEXT    PRIMARY KEY,
                 name     TEXT    NOT NULL,
                 position INTEGER NOT NULL,
                 owned    INTEGER NOT NULL DEFAULT 1
             );
             CREATE TABLE IF NOT EXISTS playlist_track (
                 playlist_id TEXT    NOT NULL REFERENCES playlist(id) ON DELETE CASCADE,
                 position    INTEGER NOT NULL,
                 track_id    TEXT,
                 is_local    INTEGER NOT NULL DEFAULT 0,
                 available   INTEGER NOT NULL DEFAULT 1,
                 PRIMARY KEY (playlist_id, position)
             );",
        )
        .context("Failed to create library schema")?;
        Ok(Self { conn })
    }

    /// Loads `snapshot` into the library.
    ///
    /// Playlists already present are renamed and their tracks replaced, but
    /// keep their position. With `replace`, every other playlist is dropped
    /// first.
    pub fn import_snapshot(&mut self, snapshot: &LibrarySnapshot, replace: bool) -> Result<ImportStats> {
        let tx = self.conn.transaction()?;
        let mut stats = ImportStats::default();

        if replace {
            tx.execute("DELETE FROM playlist_track", ())?;
            tx.execute("DELETE FROM playlist", ())?;
        }

        {
            let mut upsert = tx.prepare(
                "INSERT INTO playlist (id, name, position, owned)
                 VALUES (?1, ?2, (SELECT COALESCE(MAX(position) + 1, 0) FROM playlist), ?3)
                 ON CONFLICT(id) DO UPDATE SET name = excluded.name, owned = excluded.owned",
            )?;
            let mut clear = tx.prepare("DELETE FROM playlist_track WHERE playlist_id = ?1")?;
            let mut insert = tx.prepare(
                "INSERT INTO playlist_track (playlist_id, position, track_id, is_local, available)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;

            for record in &snapshot.playlists {
                upsert
                    .execute((&record.id, &record.name, record.owned))
                    .with_context(|| format!("Failed to store playlist `{}'", record.name))?;
                clear.execute([&record.id])?;
                for (position, entry) in record.tracks.iter().enumerate() {
                    insert
                        .execute((&record.id, position, &entry.id, entry.is_local, entry.available))
                        .with_context(|| format!("Failed to store track of `{}'", record.name))?;
                }
                stats.playlists += 1;
                stats.tracks += record.tracks.len();
            }
        }

        tx.commit().context("Committing library import failed")?;
        info!("Imported {} playlists with {} tracks", stats.playlists, stats.tracks);
        Ok(stats)
    }

    /// Dumps every playlist with all of its track slots.
    pub fn export_snapshot(&self) -> Result<LibrarySnapshot> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, owned FROM playlist ORDER BY position")?;
        let mut playlists = stmt
            .query_map([], |row| {
                Ok(PlaylistRecord {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    owned: row.get(2)?,
                    tracks: Vec::new(),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read playlists")?;

        for record in &mut playlists {
            record.tracks = self
                .tracks_of(&record.id)
                .with_context(|| format!("Failed to read tracks of `{}'", record.name))?;
        }

        Ok(LibrarySnapshot { playlists })
    }

    pub fn playlist_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM playlist", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn owned(&self, collection_id: &str) -> Result<Option<bool>, ServiceError> {
        Ok(self
            .conn
            .query_row(
                "SELECT owned FROM playlist WHERE id = ?1",
                [collection_id],
                |row| row.get(0),
            )
            .optional()?)
    }

    fn tracks_of(&self, collection_id: &str) -> rusqlite::Result<Vec<TrackEntry>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT track_id, is_local, available FROM playlist_track
             WHERE playlist_id = ?1 ORDER BY position",
        )?;
        let rows = stmt.query_map([collection_id], |row| {
            Ok(TrackEntry {
                id: row.get(0)?,
                is_local: row.get(1)?,
                available: row.get(2)?,
            })
        })?;
        rows.collect()
    }
}

impl PlaylistService for LocalLibrary {
    fn list_collections(&mut self) -> Result<Vec<CollectionInfo>, ServiceError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM playlist ORDER BY position")?;
        let infos = stmt
            .query_map([], |row| {
                Ok(CollectionInfo::new(
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(infos)
    }

    fn list_items(&mut self, collection_id: &str) -> Result<Vec<TrackEntry>, ServiceError> {
        if self.owned(collection_id)?.is_none() {
            return Err(ServiceError::NotFound(collection_id.to_string()));
        }
        Ok(self.tracks_of(collection_id)?)
    }

    fn add_items(&mut self, collection_id: &str, items: &[ItemId]) -> Result<(), ServiceError> {
        match self.owned(collection_id)? {
            None => return Err(ServiceError::NotFound(collection_id.to_string())),
            Some(false) => {
                return Err(ServiceError::PermissionDenied(format!(
                    "playlist {collection_id} is not owned by the current user"
                )))
            }
            Some(true) => {}
        }

        let tx = self.conn.transaction()?;
        {
            let next: i64 = tx.query_row(
                "SELECT COALESCE(MAX(position) + 1, 0) FROM playlist_track WHERE playlist_id = ?1",
                [collection_id],
                |row| row.get(0),
            )?;
            let mut insert = tx.prepare(
                "INSERT INTO playlist_track (playlist_id, position, track_id, is_local, available)
                 VALUES (?1, ?2, ?3, 0, 1)",
            )?;
            for (offset, item) in items.iter().enumerate() {
                insert.execute((collection_id, next + offset as i64, item))?;
            }
        }
        tx.commit()?;
        trace!("Appended {} tracks to {collection_id}", items.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> LibrarySnapshot {
        LibrarySnapshot {
            playlists: vec![
                PlaylistRecord::new("parent", "🎵 Parent"),
                PlaylistRecord::new("child", "Child 🎵").with_entries(vec![
                    TrackEntry::track("t1"),
                    TrackEntry::local("file"),
                    TrackEntry::track("t2"),
                ]),
                PlaylistRecord::new("shared", "🎵 Shared").not_owned(),
            ],
        }
    }

    #[test]
    fn test_import_then_list() {
        let mut library = LocalLibrary::open_in_memory().unwrap();
        let stats = library.import_snapshot(&sample(), false).unwrap();

        assert_eq!(stats, ImportStats { playlists: 3, tracks: 3 });
        let ids: Vec<String> = library
            .list_collections()
            .unwrap()
            .into_iter()
            .map(|info| info.id)
            .collect();
        assert_eq!(ids, vec!["parent", "child", "shared"]);
        let items = library.list_items("child").unwrap();
        assert_eq!(items.len(), 3);
        assert!(items[1].is_local);
    }

    #[test]
    fn test_add_items_appends_in_order() {
        let mut library = LocalLibrary::open_in_memory().unwrap();
        library.import_snapshot(&sample(), false).unwrap();

        library.add_items("child", &["t3".to_string(), "t4".to_string()]).unwrap();

        let ids: Vec<Option<String>> = library
            .list_items("child")
            .unwrap()
            .into_iter()
            .map(|entry| entry.id)
            .collect();
        assert_eq!(
            ids,
            vec![
                Some("t1".to_string()),
                Some("file".to_string()),
                Some("t2".to_string()),
                Some("t3".to_string()),
                Some("t4".to_string()),
            ]
        );
    }

    #[test]
    fn test_writes_to_foreign_playlist_are_denied() {
        let mut library = LocalLibrary::open_in_memory().unwrap();
        library.import_snapshot(&sample(), false).unwrap();

        let err = library.add_items("shared", &["t1".to_string()]).unwrap_err();
        assert!(err.is_permission());
        assert!(library.list_items("shared").unwrap().is_empty());
    }

    #[test]
    fn test_unknown_playlist_is_not_found() {
        let mut library = LocalLibrary::open_in_memory().unwrap();
        assert!(matches!(library.list_items("nope"), Err(ServiceError::NotFound(_))));
        assert!(matches!(
            library.add_items("nope", &["t1".to_string()]),
            Err(ServiceError::NotFound(_))
        ));
    }

    #[test]
    fn test_reimport_keeps_position_and_replaces_tracks() {
        let mut library = LocalLibrary::open_in_memory().unwrap();
        library.import_snapshot(&sample(), false).unwrap();

        let update = LibrarySnapshot {
            playlists: vec![
                PlaylistRecord::new("extra", "Extra"),
                PlaylistRecord::new("child", "Renamed 🎵").with_tracks(["t9"]),
            ],
        };
        library.import_snapshot(&update, false).unwrap();

        let snapshot = library.export_snapshot().unwrap();
        let names: Vec<&str> = snapshot.playlists.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["🎵 Parent", "Renamed 🎵", "🎵 Shared", "Extra"]);
        assert_eq!(snapshot.playlists[1].tracks, vec![TrackEntry::track("t9")]);
    }

    #[test]
    fn test_replace_drops_missing_playlists() {
        let mut library = LocalLibrary::open_in_memory().unwrap();
        library.import_snapshot(&sample(), false).unwrap();

        let only = LibrarySnapshot {
            playlists: vec![PlaylistRecord::new("solo", "Solo")],
        };
        library.import_snapshot(&only, true).unwrap();

        assert_eq!(library.playlist_count().unwrap(), 1);
        assert!(matches!(library.list_items("child"), Err(ServiceError::NotFound(_))));
    }

    #[test]
    fn test_export_preserves_ownership_and_flags() {
        let mut library = LocalLibrary::open_in_memory().unwrap();
        library.import_snapshot(&sample(), false).unwrap();

        assert_eq!(library.export_snapshot().unwrap(), sample());
    }
}
