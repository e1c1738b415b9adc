//! Duplicate candidates and groups from the last detection pass.

use rusqlite::{params, Connection, Row};
use std::path::{Path, PathBuf};

use super::db::{now_timestamp, open_memory_store, open_store};
use super::error::{PersistenceError, PersistenceResult};
use crate::duplicates::{DuplicateCandidate, DuplicateGroup, GroupStatus};
use crate::types::QualityClass;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS duplicate_albums (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    path TEXT NOT NULL UNIQUE,
    artist TEXT NOT NULL,
    title TEXT NOT NULL,
    normalized_artist TEXT NOT NULL,
    normalized_title TEXT NOT NULL,
    year INTEGER,
    track_count INTEGER NOT NULL,
    total_size INTEGER NOT NULL,
    quality TEXT NOT NULL,
    avg_bitrate INTEGER,
    format_mix TEXT NOT NULL,
    identity_hash TEXT NOT NULL,
    scanned_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_duplicate_albums_hash ON duplicate_albums(identity_hash);

CREATE TABLE IF NOT EXISTS duplicate_groups (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    identity_hash TEXT NOT NULL UNIQUE,
    keeper_id INTEGER NOT NULL,
    status TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS duplicate_group_members (
    group_id INTEGER NOT NULL REFERENCES duplicate_groups(id) ON DELETE CASCADE,
    album_id INTEGER NOT NULL,
    score INTEGER NOT NULL,
    PRIMARY KEY (group_id, album_id)
);
";

fn candidate_from_row(row: &Row<'_>) -> rusqlite::Result<DuplicateCandidate> {
    let path: String = row.get(1)?;
    let track_count: i64 = row.get(7)?;
    let total_size: i64 = row.get(8)?;
    let quality: String = row.get(9)?;
    let format_mix: String = row.get(11)?;
    Ok(DuplicateCandidate {
        id: row.get(0)?,
        path: PathBuf::from(path),
        artist: row.get(2)?,
        title: row.get(3)?,
        normalized_artist: row.get(4)?,
        normalized_title: row.get(5)?,
        year: row.get(6)?,
        track_count: track_count as usize,
        total_size: total_size as u64,
        quality: QualityClass::parse(&quality),
        avg_bitrate: row.get(10)?,
        format_mix: format_mix
            .split(',')
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        identity_hash: row.get(12)?,
    })
}

/// Store backing duplicate detection; independent of the library store
pub struct DuplicateStore {
    conn: Connection,
}

impl DuplicateStore {
    pub fn open(state_dir: &Path) -> PersistenceResult<Self> {
        let conn = open_store(&state_dir.join("duplicates.db"), SCHEMA)?;
        Ok(Self { conn })
    }

    pub fn in_memory() -> PersistenceResult<Self> {
        Ok(Self {
            conn: open_memory_store(SCHEMA)?,
        })
    }

    /// Replace all candidates (and with them all groups) with a fresh scan.
    /// Returns the candidates with their assigned ids.
    pub fn replace_candidates(
        &mut self,
        candidates: &[DuplicateCandidate],
    ) -> PersistenceResult<Vec<DuplicateCandidate>> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM duplicate_group_members", [])?;
        tx.execute("DELETE FROM duplicate_groups", [])?;
        tx.execute("DELETE FROM duplicate_albums", [])?;

        let scanned_at = now_timestamp();
        let mut stored = Vec::with_capacity(candidates.len());
        {
            let mut stmt = tx.prepare(
                "INSERT INTO duplicate_albums (path, artist, title, normalized_artist, normalized_title,
                    year, track_count, total_size, quality, avg_bitrate, format_mix, identity_hash, scanned_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            )?;
            for candidate in candidates {
                stmt.execute(params![
                    candidate.path.to_string_lossy(),
                    candidate.artist,
                    candidate.title,
                    candidate.normalized_artist,
                    candidate.normalized_title,
                    candidate.year,
                    candidate.track_count as i64,
                    candidate.total_size as i64,
                    candidate.quality.dir_name(),
                    candidate.avg_bitrate,
                    candidate.format_mix.join(","),
                    candidate.identity_hash,
                    scanned_at
                ])?;
                let mut candidate = candidate.clone();
                candidate.id = tx.last_insert_rowid();
                stored.push(candidate);
            }
        }

        tx.commit()?;
        Ok(stored)
    }

    pub fn load_candidates(&self) -> PersistenceResult<Vec<DuplicateCandidate>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, path, artist, title, normalized_artist, normalized_title, year,
                    track_count, total_size, quality, avg_bitrate, format_mix, identity_hash
             FROM duplicate_albums ORDER BY id",
        )?;
        let rows = stmt.query_map([], candidate_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Clear every group and write the new set
    pub fn replace_groups(&mut self, groups: &[DuplicateGroup]) -> PersistenceResult<Vec<DuplicateGroup>> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM duplicate_group_members", [])?;
        tx.execute("DELETE FROM duplicate_groups", [])?;

        let created_at = now_timestamp();
        let mut stored = Vec::with_capacity(groups.len());
        for group in groups {
            tx.execute(
                "INSERT INTO duplicate_groups (identity_hash, keeper_id, status, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    group.identity_hash,
                    group.keeper_id,
                    group.status.as_str(),
                    created_at
                ],
            )?;
            let group_id = tx.last_insert_rowid();
            for member in &group.members {
                tx.execute(
                    "INSERT INTO duplicate_group_members (group_id, album_id, score)
                     VALUES (?1, ?2, ?3)",
                    params![group_id, member.candidate_id, member.score],
                )?;
            }
            let mut group = group.clone();
            group.id = group_id;
            stored.push(group);
        }

        tx.commit()?;
        Ok(stored)
    }

    pub fn load_groups(&self) -> PersistenceResult<Vec<DuplicateGroup>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, identity_hash, keeper_id, status FROM duplicate_groups ORDER BY id",
        )?;
        let headers = stmt
            .query_map([], |row| {
                let status: String = row.get(3)?;
                Ok(DuplicateGroup {
                    id: row.get(0)?,
                    identity_hash: row.get(1)?,
                    keeper_id: row.get(2)?,
                    status: GroupStatus::parse(&status),
                    members: Vec::new(),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut member_stmt = self.conn.prepare(
            "SELECT album_id, score FROM duplicate_group_members
             WHERE group_id = ?1 ORDER BY score DESC, album_id",
        )?;
        let mut groups = Vec::with_capacity(headers.len());
        for mut group in headers {
            group.members = member_stmt
                .query_map(params![group.id], |row| {
                    Ok(crate::duplicates::GroupMember {
                        candidate_id: row.get(0)?,
                        score: row.get(1)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            groups.push(group);
        }
        Ok(groups)
    }

    pub fn mark_resolved(&self, group_id: i64) -> PersistenceResult<()> {
        let updated = self.conn.execute(
            "UPDATE duplicate_groups SET status = ?1 WHERE id = ?2",
            params![GroupStatus::Resolved.as_str(), group_id],
        )?;
        if updated == 0 {
            return Err(PersistenceError::MissingRecord(format!("duplicate group {}", group_id)));
        }
        Ok(())
    }
}
