//! Organized albums and the move journal.

use log::debug;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};

use super::db::{now_timestamp, open_memory_store, open_store};
use super::error::{PersistenceError, PersistenceResult};
use super::models::{MoveKind, MoveOperation, MoveStatus, StoredAlbum};
use crate::identity::normalize::fold;
use crate::types::{AlbumIdentity, OrganizationMode, QualityClass};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS albums (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    path TEXT NOT NULL UNIQUE,
    source_path TEXT NOT NULL,
    artist TEXT NOT NULL,
    title TEXT NOT NULL,
    year INTEGER,
    label TEXT,
    label_key TEXT,
    catalog_number TEXT,
    quality TEXT NOT NULL,
    mode TEXT NOT NULL,
    track_count INTEGER NOT NULL,
    organized_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_albums_label_key ON albums(label_key);

CREATE TABLE IF NOT EXISTS tracks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    album_id INTEGER NOT NULL REFERENCES albums(id) ON DELETE CASCADE,
    path TEXT NOT NULL,
    title TEXT,
    track_number INTEGER,
    disc_number INTEGER,
    format TEXT,
    bitrate INTEGER,
    size INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS move_operations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    kind TEXT NOT NULL,
    source_path TEXT NOT NULL,
    dest_path TEXT NOT NULL,
    status TEXT NOT NULL,
    error TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_moves_status ON move_operations(status);
";

/// One track row written alongside an album
#[derive(Debug, Clone, Default)]
pub struct StoredTrack {
    pub path: PathBuf,
    pub title: Option<String>,
    pub track_number: Option<u32>,
    pub disc_number: Option<u32>,
    pub format: Option<String>,
    pub bitrate: Option<u32>,
    pub size: u64,
}

/// Number of organized releases per label, consulted by the path planner
pub trait LabelStats {
    fn label_release_count(&self, label: &str) -> usize;
}

/// Library database: organized albums, their tracks and the move journal
pub struct LibraryStore {
    conn: Connection,
}

fn move_from_row(row: &Row<'_>) -> rusqlite::Result<MoveOperation> {
    let kind: String = row.get(1)?;
    let source: String = row.get(2)?;
    let dest: String = row.get(3)?;
    let status: String = row.get(4)?;
    Ok(MoveOperation {
        id: row.get(0)?,
        kind: MoveKind::parse(&kind),
        source_path: PathBuf::from(source),
        dest_path: PathBuf::from(dest),
        status: MoveStatus::parse(&status),
        error: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

const MOVE_COLUMNS: &str =
    "id, kind, source_path, dest_path, status, error, created_at, updated_at";

impl LibraryStore {
    pub fn open(state_dir: &Path) -> PersistenceResult<Self> {
        let conn = open_store(&state_dir.join("library.db"), SCHEMA)?;
        Ok(Self { conn })
    }

    pub fn in_memory() -> PersistenceResult<Self> {
        Ok(Self {
            conn: open_memory_store(SCHEMA)?,
        })
    }

    /// Journal a move before any filesystem change; returns its id
    pub fn plan_move(&self, kind: MoveKind, source: &Path, dest: &Path) -> PersistenceResult<i64> {
        let now = now_timestamp();
        self.conn.execute(
            "INSERT INTO move_operations (kind, source_path, dest_path, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![
                kind.as_str(),
                source.to_string_lossy(),
                dest.to_string_lossy(),
                MoveStatus::Planned.as_str(),
                now
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        debug!("Planned move #{}: {} -> {}", id, source.display(), dest.display());
        Ok(id)
    }

    pub fn set_move_status(
        &self,
        id: i64,
        status: MoveStatus,
        error: Option<&str>,
    ) -> PersistenceResult<()> {
        let updated = self.conn.execute(
            "UPDATE move_operations SET status = ?1, error = ?2, updated_at = ?3 WHERE id = ?4",
            params![status.as_str(), error, now_timestamp(), id],
        )?;
        if updated == 0 {
            return Err(PersistenceError::MissingRecord(format!("move operation {}", id)));
        }
        Ok(())
    }

    pub fn get_move(&self, id: i64) -> PersistenceResult<Option<MoveOperation>> {
        let sql = format!("SELECT {} FROM move_operations WHERE id = ?1", MOVE_COLUMNS);
        Ok(self
            .conn
            .query_row(&sql, params![id], move_from_row)
            .optional()?)
    }

    /// Planned or InProgress entries, oldest first
    pub fn incomplete_moves(&self) -> PersistenceResult<Vec<MoveOperation>> {
        let sql = format!(
            "SELECT {} FROM move_operations WHERE status IN (?1, ?2) ORDER BY id",
            MOVE_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![MoveStatus::Planned.as_str(), MoveStatus::InProgress.as_str()],
            move_from_row,
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn list_moves(&self) -> PersistenceResult<Vec<MoveOperation>> {
        let sql = format!("SELECT {} FROM move_operations ORDER BY id", MOVE_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], move_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Store an organized album and its tracks, replacing any previous row
    /// for the same destination path.
    pub fn record_album(
        &mut self,
        path: &Path,
        source: &Path,
        identity: &AlbumIdentity,
        quality: QualityClass,
        mode: OrganizationMode,
        tracks: &[StoredTrack],
    ) -> PersistenceResult<i64> {
        let tx = self.conn.transaction()?;
        let path_str = path.to_string_lossy().into_owned();
        tx.execute("DELETE FROM albums WHERE path = ?1", params![path_str])?;
        tx.execute(
            "INSERT INTO albums (path, source_path, artist, title, year, label, label_key,
                                 catalog_number, quality, mode, track_count, organized_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                path_str,
                source.to_string_lossy(),
                identity.album_artist,
                identity.album_title,
                identity.year,
                identity.label,
                identity.label.as_deref().map(fold),
                identity.catalog_number,
                quality.dir_name(),
                mode.as_str(),
                tracks.len() as i64,
                now_timestamp()
            ],
        )?;
        let album_id = tx.last_insert_rowid();

        {
            let mut stmt = tx.prepare(
                "INSERT INTO tracks (album_id, path, title, track_number, disc_number, format, bitrate, size)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for track in tracks {
                stmt.execute(params![
                    album_id,
                    track.path.to_string_lossy(),
                    track.title,
                    track.track_number,
                    track.disc_number,
                    track.format,
                    track.bitrate,
                    track.size as i64
                ])?;
            }
        }

        tx.commit()?;
        Ok(album_id)
    }

    /// Drop the album stored at `path` (after an undo or duplicate removal)
    pub fn remove_album(&self, path: &Path) -> PersistenceResult<bool> {
        let removed = self.conn.execute(
            "DELETE FROM albums WHERE path = ?1",
            params![path.to_string_lossy()],
        )?;
        Ok(removed > 0)
    }

    pub fn get_album(&self, path: &Path) -> PersistenceResult<Option<StoredAlbum>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, path, source_path, artist, title, year, label, catalog_number,
                        quality, mode, track_count, organized_at
                 FROM albums WHERE path = ?1",
                params![path.to_string_lossy()],
                |row| {
                    let path: String = row.get(1)?;
                    let source: String = row.get(2)?;
                    let track_count: i64 = row.get(10)?;
                    Ok(StoredAlbum {
                        id: row.get(0)?,
                        path: PathBuf::from(path),
                        source_path: PathBuf::from(source),
                        artist: row.get(3)?,
                        title: row.get(4)?,
                        year: row.get(5)?,
                        label: row.get(6)?,
                        catalog_number: row.get(7)?,
                        quality: row.get(8)?,
                        mode: row.get(9)?,
                        track_count: track_count as usize,
                        organized_at: row.get(11)?,
                    })
                },
            )
            .optional()?)
    }

    /// Organized releases stored for a label, compared case- and accent-insensitively
    pub fn count_label_releases(&self, label: &str) -> PersistenceResult<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM albums WHERE label_key = ?1",
            params![fold(label)],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

impl LabelStats for LibraryStore {
    fn label_release_count(&self, label: &str) -> usize {
        match self.count_label_releases(label) {
            Ok(count) => count,
            Err(e) => {
                log::warn!("Label count lookup failed for '{}': {}", label, e);
                0
            }
        }
    }
}

impl LabelStats for std::collections::HashMap<String, usize> {
    fn label_release_count(&self, label: &str) -> usize {
        self.get(label).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(label: Option<&str>) -> AlbumIdentity {
        let mut identity = AlbumIdentity::new("Artist", "Title");
        identity.label = label.map(String::from);
        identity
    }

    #[test]
    fn test_move_journal_lifecycle() {
        let store = LibraryStore::in_memory().unwrap();
        let id = store
            .plan_move(MoveKind::Organize, Path::new("/in/a"), Path::new("/out/a"))
            .unwrap();

        let op = store.get_move(id).unwrap().unwrap();
        assert_eq!(op.status, MoveStatus::Planned);
        assert_eq!(store.incomplete_moves().unwrap().len(), 1);

        store.set_move_status(id, MoveStatus::InProgress, None).unwrap();
        store.set_move_status(id, MoveStatus::Committed, None).unwrap();
        assert!(store.incomplete_moves().unwrap().is_empty());
        assert_eq!(store.get_move(id).unwrap().unwrap().status, MoveStatus::Committed);
    }

    #[test]
    fn test_unknown_move_id() {
        let store = LibraryStore::in_memory().unwrap();
        let result = store.set_move_status(42, MoveStatus::Committed, None);
        assert!(matches!(result, Err(PersistenceError::MissingRecord(_))));
    }

    #[test]
    fn test_label_counts_fold_case() {
        let mut store = LibraryStore::in_memory().unwrap();
        for (i, label) in ["Warp", "WARP", "Ninja Tune"].iter().enumerate() {
            store
                .record_album(
                    Path::new(&format!("/out/{}", i)),
                    Path::new("/in"),
                    &identity(Some(label)),
                    QualityClass::Lossless,
                    OrganizationMode::Artist,
                    &[],
                )
                .unwrap();
        }
        assert_eq!(store.label_release_count("warp"), 2);
        assert_eq!(store.label_release_count("Ninja Tune"), 1);
        assert_eq!(store.label_release_count("Kompakt"), 0);
    }

    #[test]
    fn test_record_album_replaces_same_path() {
        let mut store = LibraryStore::in_memory().unwrap();
        let track = StoredTrack {
            path: PathBuf::from("/out/a/01.flac"),
            size: 10,
            ..Default::default()
        };
        for _ in 0..2 {
            store
                .record_album(
                    Path::new("/out/a"),
                    Path::new("/in/a"),
                    &identity(Some("Warp")),
                    QualityClass::Lossless,
                    OrganizationMode::Label,
                    &[track.clone()],
                )
                .unwrap();
        }
        assert_eq!(store.count_label_releases("Warp").unwrap(), 1);
        let album = store.get_album(Path::new("/out/a")).unwrap().unwrap();
        assert_eq!(album.track_count, 1);
        assert_eq!(album.mode, "label");

        assert!(store.remove_album(Path::new("/out/a")).unwrap());
        assert!(store.get_album(Path::new("/out/a")).unwrap().is_none());
    }
}
