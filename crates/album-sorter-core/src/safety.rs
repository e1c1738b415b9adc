//! Journaled, all-or-nothing directory moves.
//!
//! Every move is written to the journal before the filesystem is touched and
//! closed as Committed or RolledBack afterwards. A same-filesystem move is a
//! single rename; across filesystems the tree is copied into a staging sibling
//! of the destination, verified, renamed into place and only then is the
//! source retired. A failure at any point leaves the source as it was.

use log::{debug, info, warn};
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::identity::normalize::sanitize_segment;
use crate::persistence::{LibraryStore, MoveKind, MoveStatus, PersistenceError};
use crate::types::{RunMode, TrackMetadata};
use crate::{log_file_error, log_fs_modification};

/// errno for a rename across filesystems
const EXDEV: i32 = 18;

/// How a directory is relocated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MoveStrategy {
    /// Rename, copying only when the rename crosses filesystems
    #[default]
    Auto,
    /// Always copy, verify and retire the source
    CopyOnly,
}

/// Called after each file is copied into staging; an error aborts the move
pub type CopyHook = Box<dyn Fn(&Path) -> io::Result<()> + Send + Sync>;

/// Journal entries settled by [`SafetyManager::recover`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    pub committed: usize,
    pub rolled_back: usize,
}

/// Executes directory moves against a journal
pub struct SafetyManager {
    run_mode: RunMode,
    strategy: MoveStrategy,
    copy_hook: Option<CopyHook>,
}

impl SafetyManager {
    /// Create a new SafetyManager with the provided configuration
    pub fn new(config: &Config) -> Self {
        Self::with_run_mode(config.run_mode)
    }

    pub fn with_run_mode(run_mode: RunMode) -> Self {
        Self {
            run_mode,
            strategy: MoveStrategy::Auto,
            copy_hook: None,
        }
    }

    pub fn with_strategy(mut self, strategy: MoveStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_copy_hook(mut self, hook: CopyHook) -> Self {
        self.copy_hook = Some(hook);
        self
    }

    pub fn run_mode(&self) -> RunMode {
        self.run_mode
    }

    /// Move `source` to `dest`, journaled as `kind`.
    ///
    /// Returns the journal id, or `None` in a dry run where nothing happens.
    pub fn move_directory(
        &self,
        journal: &LibraryStore,
        kind: MoveKind,
        source: &Path,
        dest: &Path,
    ) -> Result<Option<i64>> {
        if dest.exists() {
            return Err(Error::DestinationConflict(dest.to_path_buf()));
        }

        if self.run_mode.is_dry_run() {
            info!(
                "[dry run] Would move ({}) {} -> {}",
                kind.as_str(),
                source.display(),
                dest.display()
            );
            return Ok(None);
        }

        if !source.is_dir() {
            return Err(Error::DirectoryNotFound(source.to_path_buf()));
        }

        let id = journal.plan_move(kind, source, dest)?;
        journal.set_move_status(id, MoveStatus::InProgress, None)?;

        match self.execute(id, source, dest) {
            Ok(()) => {
                if let Err(e) = journal.set_move_status(id, MoveStatus::Committed, None) {
                    warn!("Move #{} finished but could not be journaled: {}", id, e);
                }
                log_fs_modification!(
                    kind.as_str(),
                    source,
                    format!("-> {} (move #{})", dest.display(), id)
                );
                Ok(Some(id))
            }
            Err(error) => {
                remove_staging(dest, id);
                if let Err(e) =
                    journal.set_move_status(id, MoveStatus::RolledBack, Some(&error.to_string()))
                {
                    warn!("Could not journal rollback of move #{}: {}", id, e);
                }
                log_file_error!(source, "move", error);
                Err(Error::MoveIo {
                    source_path: source.to_path_buf(),
                    dest_path: dest.to_path_buf(),
                    error,
                })
            }
        }
    }

    fn execute(&self, id: i64, source: &Path, dest: &Path) -> io::Result<()> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }

        if self.strategy == MoveStrategy::Auto {
            match rename_with_retry(source, dest) {
                Ok(()) => return Ok(()),
                Err(e) if e.raw_os_error() == Some(EXDEV) => {
                    debug!("{} is on another filesystem, copying", dest.display());
                }
                Err(e) => return Err(e),
            }
        }

        self.copy_move(id, source, dest)
    }

    fn copy_move(&self, id: i64, source: &Path, dest: &Path) -> io::Result<()> {
        let staging = staging_path(dest, id);
        if staging.exists() {
            fs::remove_dir_all(&staging)?;
        }

        self.copy_tree(source, &staging)?;
        verify_tree(source, &staging)?;
        fs::rename(&staging, dest)?;

        let trash = trash_path(source, id);
        if let Err(e) = rename_with_retry(source, &trash) {
            // Source is still in place, so drop the copy
            if let Err(cleanup) = fs::remove_dir_all(dest) {
                log_file_error!(dest, "remove copy", cleanup);
            }
            return Err(e);
        }

        if let Err(e) = remove_tree_with_retry(&trash) {
            warn!(
                "Moved {} but could not remove {}: {}",
                source.display(),
                trash.display(),
                e
            );
        }
        Ok(())
    }

    fn copy_tree(&self, source: &Path, target: &Path) -> io::Result<()> {
        for entry in WalkDir::new(source).follow_links(true) {
            let entry = entry.map_err(io::Error::from)?;
            let relative = entry
                .path()
                .strip_prefix(source)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
            let destination = target.join(relative);

            if entry.file_type().is_dir() {
                fs::create_dir_all(&destination)?;
            } else {
                fs::copy(entry.path(), &destination)?;
                if let Some(hook) = &self.copy_hook {
                    hook(&destination)?;
                }
            }
        }
        Ok(())
    }

    /// Settle journal entries left open by an interrupted run.
    ///
    /// Destination present with the source gone means the move finished;
    /// anything else is rolled back and staging remnants are removed.
    pub fn recover(&self, journal: &LibraryStore) -> Result<RecoveryReport> {
        let mut report = RecoveryReport::default();

        for op in journal.incomplete_moves()? {
            let staging = staging_path(&op.dest_path, op.id);
            let trash = trash_path(&op.source_path, op.id);

            if self.run_mode.is_dry_run() {
                info!(
                    "[dry run] Would recover move #{}: {} -> {}",
                    op.id,
                    op.source_path.display(),
                    op.dest_path.display()
                );
                continue;
            }

            if staging.exists() {
                if let Err(e) = remove_tree_with_retry(&staging) {
                    log_file_error!(staging, "remove staging", e);
                }
            }

            if op.dest_path.exists() && !op.source_path.exists() {
                if trash.exists() {
                    if let Err(e) = remove_tree_with_retry(&trash) {
                        log_file_error!(trash, "remove retired source", e);
                    }
                }
                journal.set_move_status(op.id, MoveStatus::Committed, None)?;
                info!("Recovered move #{} as committed", op.id);
                report.committed += 1;
            } else {
                // A copy renamed into place before the source was retired.
                // Destinations are never pre-existing, so it is ours to drop.
                if op.status == MoveStatus::InProgress
                    && op.dest_path.exists()
                    && op.source_path.exists()
                {
                    remove_tree_with_retry(&op.dest_path)?;
                    log_fs_modification!("drop unfinished copy", op.dest_path);
                }
                journal.set_move_status(
                    op.id,
                    MoveStatus::RolledBack,
                    Some("interrupted before completion"),
                )?;
                info!("Rolled back interrupted move #{}", op.id);
                report.rolled_back += 1;
            }
        }

        Ok(report)
    }

    /// Move a committed operation's directory back where it came from.
    /// The reverse move is journaled as its own `Undo` entry.
    pub fn undo(&self, journal: &LibraryStore, id: i64) -> Result<Option<i64>> {
        let op = journal
            .get_move(id)?
            .ok_or_else(|| PersistenceError::MissingRecord(format!("move operation {}", id)))?;

        if op.status != MoveStatus::Committed {
            return Err(Error::Configuration(format!(
                "Move #{} is {} and cannot be undone",
                id, op.status
            )));
        }

        self.move_directory(journal, MoveKind::Undo, &op.dest_path, &op.source_path)
    }

    /// Rename tracks inside a moved album to `NN - Title.ext` (`D-NN - ...`
    /// for multi-disc releases). `tracks` carry their pre-move paths below
    /// `original_dir`. Returns the number of files renamed.
    pub fn rename_tracks(
        &self,
        album_dir: &Path,
        original_dir: &Path,
        tracks: &[TrackMetadata],
    ) -> io::Result<usize> {
        let multi_disc = tracks.iter().any(|t| t.disc_number.unwrap_or(1) > 1);
        let mut renamed = 0;

        for track in tracks {
            let Some(name) = track_file_name(track, multi_disc) else {
                continue;
            };
            let Ok(relative) = track.path.strip_prefix(original_dir) else {
                continue;
            };
            let current = album_dir.join(relative);
            let target = current.with_file_name(&name);
            if current == target {
                continue;
            }
            if target.exists() {
                warn!("Not renaming {}: {} exists", current.display(), target.display());
                continue;
            }

            if self.run_mode.is_dry_run() {
                info!("[dry run] Would rename {} -> {}", current.display(), name);
                continue;
            }
            fs::rename(&current, &target)?;
            renamed += 1;
        }

        if renamed > 0 {
            log_fs_modification!("rename tracks", album_dir, format!("{} files", renamed));
        }
        Ok(renamed)
    }
}

/// `NN - Title.ext`, or `D-NN - Title.ext` when `multi_disc`
pub fn track_file_name(track: &TrackMetadata, multi_disc: bool) -> Option<String> {
    let number = track.track_number?;
    let title = track.title.as_deref().map(str::trim).filter(|t| !t.is_empty())?;
    let ext = track.path.extension()?.to_string_lossy().to_lowercase();

    let prefix = if multi_disc {
        format!("{}-{:02}", track.disc_number.unwrap_or(1), number)
    } else {
        format!("{:02}", number)
    };
    Some(format!("{} - {}.{}", prefix, sanitize_segment(title), ext))
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{}.{}", name, suffix))
}

fn staging_path(dest: &Path, id: i64) -> PathBuf {
    sibling(dest, &format!("partial-{}", id))
}

fn trash_path(source: &Path, id: i64) -> PathBuf {
    sibling(source, &format!("moved-{}", id))
}

fn remove_staging(dest: &Path, id: i64) {
    let staging = staging_path(dest, id);
    if staging.exists() {
        if let Err(e) = remove_tree_with_retry(&staging) {
            log_file_error!(staging, "remove staging", e);
        }
    }
}

/// Compute the BLAKE3 hash of a file
pub fn hash_file(path: &Path) -> io::Result<blake3::Hash> {
    let mut file = File::open(path)?;
    let mut hasher = blake3::Hasher::new();
    let mut buffer = [0; 8192];
    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }
    Ok(hasher.finalize())
}

/// Every file under `source` exists under `copy` with the same size and hash
fn verify_tree(source: &Path, copy: &Path) -> io::Result<()> {
    for entry in WalkDir::new(source).follow_links(true) {
        let entry = entry.map_err(io::Error::from)?;
        if entry.file_type().is_dir() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        let copied = copy.join(relative);

        let original_len = entry.metadata().map_err(io::Error::from)?.len();
        let copied_len = fs::metadata(&copied)?.len();
        if original_len != copied_len || hash_file(entry.path())? != hash_file(&copied)? {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("verification failed for {}", copied.display()),
            ));
        }
    }
    Ok(())
}

fn make_owner_writable(path: &Path) -> io::Result<()> {
    let mut permissions = fs::metadata(path)?.permissions();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        permissions.set_mode(permissions.mode() | 0o200);
    }
    #[cfg(not(unix))]
    permissions.set_readonly(false);
    fs::set_permissions(path, permissions)
}

/// Rename, retrying once after granting owner write permission
fn rename_with_retry(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
            debug!("Permission denied renaming {}, retrying", from.display());
            if let Some(parent) = from.parent() {
                make_owner_writable(parent)?;
            }
            make_owner_writable(from)?;
            fs::rename(from, to)
        }
        other => other,
    }
}

/// Remove a tree, retrying once after making every directory in it writable
fn remove_tree_with_retry(path: &Path) -> io::Result<()> {
    match fs::remove_dir_all(path) {
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
            debug!("Permission denied removing {}, retrying", path.display());
            for entry in WalkDir::new(path).into_iter().filter_map(|e| e.ok()) {
                if entry.file_type().is_dir() {
                    make_owner_writable(entry.path())?;
                }
            }
            fs::remove_dir_all(path)
        }
        other => other,
    }
}
