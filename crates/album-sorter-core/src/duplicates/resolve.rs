use log::{info, warn};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::{DuplicateCandidate, GroupStatus};
use crate::error::Result;
use crate::persistence::{DuplicateStore, LibraryStore, MoveKind};
use crate::safety::SafetyManager;

/// Albums relocated (or, in a dry run, that would be) by one resolution pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveSummary {
    pub moved: usize,
    pub failed: usize,
    pub groups_resolved: usize,
    pub bytes: u64,
}

fn backup_destination(batch_dir: &Path, organized_root: &Path, album: &Path) -> PathBuf {
    match album.strip_prefix(organized_root) {
        Ok(relative) => batch_dir.join(relative),
        Err(_) => batch_dir.join(album.file_name().unwrap_or(album.as_os_str())),
    }
}

/// Move every non-keeper of each pending group under
/// `<backup_root>/duplicates-<timestamp>/`, keeping its path relative to the
/// organized tree. A group is marked resolved once all its extras are moved.
pub fn resolve_groups(
    store: &DuplicateStore,
    journal: &LibraryStore,
    safety: &SafetyManager,
    organized_root: &Path,
    backup_root: &Path,
) -> Result<ResolveSummary> {
    let candidates: HashMap<i64, DuplicateCandidate> = store
        .load_candidates()?
        .into_iter()
        .map(|c| (c.id, c))
        .collect();
    let batch_dir = backup_root.join(format!(
        "duplicates-{}",
        chrono::Local::now().format("%Y%m%d-%H%M%S")
    ));

    let mut summary = ResolveSummary::default();
    for group in store.load_groups()? {
        if group.status == GroupStatus::Resolved {
            continue;
        }

        let mut all_moved = true;
        for member in group.members.iter().filter(|m| m.candidate_id != group.keeper_id) {
            let Some(candidate) = candidates.get(&member.candidate_id) else {
                continue;
            };
            let dest = backup_destination(&batch_dir, organized_root, &candidate.path);

            match safety.move_directory(journal, MoveKind::Duplicate, &candidate.path, &dest) {
                Ok(_) => {
                    summary.moved += 1;
                    summary.bytes += candidate.total_size;
                    if !safety.run_mode().is_dry_run() {
                        if let Err(e) = journal.remove_album(&candidate.path) {
                            warn!("Could not drop {} from library: {}", candidate.path.display(), e);
                        }
                    }
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!("Duplicate {} not moved: {}", candidate.path.display(), e);
                    summary.failed += 1;
                    all_moved = false;
                }
            }
        }

        if all_moved && !safety.run_mode().is_dry_run() {
            store.mark_resolved(group.id)?;
            summary.groups_resolved += 1;
        }
    }

    info!(
        "Duplicate resolution: {} moved, {} failed, {} groups resolved",
        summary.moved, summary.failed, summary.groups_resolved
    );
    Ok(summary)
}
