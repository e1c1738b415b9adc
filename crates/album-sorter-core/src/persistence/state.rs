//! Per-directory processing state used for incremental runs.

use log::{debug, warn};
use rusqlite::{params, Connection, OptionalExtension};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use super::db::{now_timestamp, open_memory_store, open_store};
use super::error::PersistenceResult;
use super::models::ProcessedDirectoryRecord;
use crate::discovery::is_disc_dir_name;
use crate::types::ProcessingStatus;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS processed_directories (
    path TEXT PRIMARY KEY,
    content_signature TEXT NOT NULL,
    status TEXT NOT NULL,
    reason TEXT,
    timestamp TEXT NOT NULL
);
";

fn mtime_nanos(meta: &fs::Metadata) -> u128 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_nanos())
        .unwrap_or(0)
}

type EntryStamp = (String, bool, u64, u128);

fn collect_entries(dir: &Path, prefix: &str, out: &mut Vec<EntryStamp>) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let meta = entry.metadata()?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let key = format!("{}{}", prefix, name);

        // Disc folders belong to the album, so their tracks count too
        if prefix.is_empty() && meta.is_dir() && is_disc_dir_name(&name) {
            collect_entries(&entry.path(), &format!("{}/", key), out)?;
        }
        out.push((key, meta.is_dir(), meta.len(), mtime_nanos(&meta)));
    }
    Ok(())
}

/// Digest of a directory's own mtime, its direct entries and the entries of
/// its disc folders (`CD1`, `Disc 2`, ...).
///
/// Entries are hashed in name order as (name, is_dir, size, mtime) so any
/// added, removed, renamed or rewritten file changes the signature.
pub fn content_signature(dir: &Path) -> std::io::Result<String> {
    let dir_meta = fs::metadata(dir)?;
    let mut hasher = blake3::Hasher::new();
    hasher.update(&mtime_nanos(&dir_meta).to_le_bytes());

    let mut entries = Vec::new();
    collect_entries(dir, "", &mut entries)?;
    entries.sort();

    for (name, is_dir, size, mtime) in entries {
        hasher.update(name.as_bytes());
        hasher.update(&[0x1f, is_dir as u8]);
        hasher.update(&size.to_le_bytes());
        hasher.update(&mtime.to_le_bytes());
    }

    Ok(hasher.finalize().to_hex().to_string())
}

/// Remembers which source directories were handled and how.
pub struct StateTracker {
    conn: Connection,
    path: Option<PathBuf>,
}

impl StateTracker {
    /// Open `state.db` inside `state_dir`, taking the store lock
    pub fn open(state_dir: &Path) -> PersistenceResult<Self> {
        let path = state_dir.join("state.db");
        let conn = open_store(&path, SCHEMA)?;
        Ok(Self {
            conn,
            path: Some(path),
        })
    }

    pub fn in_memory() -> PersistenceResult<Self> {
        Ok(Self {
            conn: open_memory_store(SCHEMA)?,
            path: None,
        })
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// True when there is no record, the last attempt did not succeed, or the
    /// directory changed since it was recorded.
    pub fn needs_processing(&self, dir: &Path) -> PersistenceResult<bool> {
        let record = match self.get(dir)? {
            Some(record) => record,
            None => return Ok(true),
        };

        if record.status != ProcessingStatus::Success {
            debug!(
                "{} previously ended as {}, reprocessing",
                dir.display(),
                record.status.as_str()
            );
            return Ok(true);
        }

        match content_signature(dir) {
            Ok(signature) => Ok(signature != record.content_signature),
            Err(e) => {
                warn!("Could not fingerprint {}: {}", dir.display(), e);
                Ok(true)
            }
        }
    }

    pub fn get(&self, dir: &Path) -> PersistenceResult<Option<ProcessedDirectoryRecord>> {
        let key = dir.to_string_lossy();
        let record = self
            .conn
            .query_row(
                "SELECT path, content_signature, status, reason, timestamp
                 FROM processed_directories WHERE path = ?1",
                params![key],
                |row| {
                    let path: String = row.get(0)?;
                    let status: String = row.get(2)?;
                    Ok(ProcessedDirectoryRecord {
                        path: PathBuf::from(path),
                        content_signature: row.get(1)?,
                        status: ProcessingStatus::parse(&status),
                        reason: row.get(3)?,
                        timestamp: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    /// Upsert the outcome for a directory with a signature taken now
    pub fn record(
        &self,
        dir: &Path,
        signature: &str,
        status: ProcessingStatus,
        reason: Option<&str>,
    ) -> PersistenceResult<()> {
        self.conn.execute(
            "INSERT INTO processed_directories (path, content_signature, status, reason, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(path) DO UPDATE SET
                content_signature = excluded.content_signature,
                status = excluded.status,
                reason = excluded.reason,
                timestamp = excluded.timestamp",
            params![
                dir.to_string_lossy(),
                signature,
                status.as_str(),
                reason,
                now_timestamp()
            ],
        )?;
        Ok(())
    }

    pub fn count(&self) -> PersistenceResult<usize> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM processed_directories", [], |row| {
                    row.get(0)
                })?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::PersistenceError;
    use tempfile::tempdir;

    #[test]
    fn test_unknown_directory_needs_processing() {
        let dir = tempdir().unwrap();
        let tracker = StateTracker::in_memory().unwrap();
        assert!(tracker.needs_processing(dir.path()).unwrap());
    }

    #[test]
    fn test_success_skips_until_changed() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("01.flac"), b"audio").unwrap();

        let tracker = StateTracker::in_memory().unwrap();
        let signature = content_signature(dir.path()).unwrap();
        tracker
            .record(dir.path(), &signature, ProcessingStatus::Success, None)
            .unwrap();
        assert!(!tracker.needs_processing(dir.path()).unwrap());

        fs::write(dir.path().join("02.flac"), b"more audio").unwrap();
        assert!(tracker.needs_processing(dir.path()).unwrap());
    }

    #[test]
    fn test_disc_folder_rewrite_is_a_change() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("CD1")).unwrap();
        fs::create_dir(dir.path().join("CD2")).unwrap();
        fs::write(dir.path().join("CD1/01.flac"), b"flac").unwrap();
        fs::write(dir.path().join("CD2/01.flac"), b"flac").unwrap();

        let tracker = StateTracker::in_memory().unwrap();
        let signature = content_signature(dir.path()).unwrap();
        tracker
            .record(dir.path(), &signature, ProcessingStatus::Success, None)
            .unwrap();
        assert!(!tracker.needs_processing(dir.path()).unwrap());

        fs::write(dir.path().join("CD1/01.flac"), b"flacflac").unwrap();
        assert!(tracker.needs_processing(dir.path()).unwrap());
    }

    #[test]
    fn test_non_success_is_retried() {
        let dir = tempdir().unwrap();
        let tracker = StateTracker::in_memory().unwrap();
        let signature = content_signature(dir.path()).unwrap();
        tracker
            .record(
                dir.path(),
                &signature,
                ProcessingStatus::Held,
                Some("insufficient reconstructed metadata"),
            )
            .unwrap();

        assert!(tracker.needs_processing(dir.path()).unwrap());
        let record = tracker.get(dir.path()).unwrap().unwrap();
        assert_eq!(record.status, ProcessingStatus::Held);
        assert_eq!(
            record.reason.as_deref(),
            Some("insufficient reconstructed metadata")
        );
    }

    #[test]
    fn test_record_upserts() {
        let dir = tempdir().unwrap();
        let tracker = StateTracker::in_memory().unwrap();
        tracker
            .record(dir.path(), "a", ProcessingStatus::Failed, None)
            .unwrap();
        tracker
            .record(dir.path(), "b", ProcessingStatus::Success, None)
            .unwrap();
        assert_eq!(tracker.count().unwrap(), 1);
        assert_eq!(tracker.get(dir.path()).unwrap().unwrap().content_signature, "b");
    }

    #[test]
    fn test_second_open_is_locked() {
        let state_dir = tempdir().unwrap();
        let first = StateTracker::open(state_dir.path()).unwrap();
        let second = StateTracker::open(state_dir.path());
        assert!(matches!(second, Err(PersistenceError::Locked(_))));

        drop(first);
        assert!(StateTracker::open(state_dir.path()).is_ok());
    }
}
