use log::info;
use rusqlite::{Connection, ErrorCode};
use std::path::Path;
use std::time::Duration;

use super::error::{PersistenceError, PersistenceResult};

/// Current time as stored in every timestamp column
pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn is_busy(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == ErrorCode::DatabaseBusy || e.code == ErrorCode::DatabaseLocked
    )
}

/// Open (creating if needed) a store and take an exclusive lock on it.
///
/// The lock is held for the lifetime of the connection, so a second process
/// opening the same file fails with [`PersistenceError::Locked`].
pub fn open_store(db_path: &Path, schema: &str) -> PersistenceResult<Connection> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| PersistenceError::StoreDir {
                    dir: parent.to_path_buf(),
                    reason: e.to_string(),
                })?;
        }
    }

    let conn = Connection::open(db_path).map_err(|e| {
        PersistenceError::Schema(format!(
            "Failed to open database {}: {}",
            db_path.display(),
            e
        ))
    })?;

    conn.busy_timeout(Duration::ZERO)?;
    conn.execute_batch(
        "PRAGMA locking_mode = EXCLUSIVE;
         PRAGMA synchronous = NORMAL;
         PRAGMA foreign_keys = ON;",
    )?;

    // BEGIN EXCLUSIVE takes the file lock; locking_mode keeps it after COMMIT
    let init = format!("BEGIN EXCLUSIVE;\n{}\nCOMMIT;", schema);
    conn.execute_batch(&init).map_err(|e| {
        if is_busy(&e) {
            PersistenceError::Locked(db_path.to_path_buf())
        } else {
            PersistenceError::Schema(format!(
                "Failed to create schema in {}: {}",
                db_path.display(),
                e
            ))
        }
    })?;

    info!("Database initialized at {}", db_path.display());
    Ok(conn)
}

/// In-memory store with the given schema
pub fn open_memory_store(schema: &str) -> PersistenceResult<Connection> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.execute_batch(schema)?;
    Ok(conn)
}
