//! Per-album processing: identity, quality, planning, move, bookkeeping.

use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use indicatif::ProgressBar;

use crate::config::Config;
use crate::enrichment::{enrich, Enricher};
use crate::error::{Error, Result};
use crate::identity::normalize::sanitize_segment;
use crate::identity::reconstruct::REJECTION_REASON;
use crate::identity::{reconstruct, resolve_identity, AliasResolver};
use crate::metadata::{extract_album, untagged, TagReader};
use crate::persistence::{
    content_signature, LibraryStore, MoveKind, PersistenceResult, StateTracker, StoredTrack,
};
use crate::planner::{plan, LayoutSettings, PlannedPath};
use crate::quality::{album_formats, classify};
use crate::safety::SafetyManager;
use crate::types::{
    AlbumDirectory, AlbumIdentity, AlbumOutcome, ProcessingStatus, RunSummary, TrackMetadata,
};

/// State and library stores owned by one sequential runner
pub struct Stores {
    pub state: StateTracker,
    pub library: LibraryStore,
}

impl Stores {
    pub fn open(state_dir: &Path) -> PersistenceResult<Self> {
        Ok(Self {
            state: StateTracker::open(state_dir)?,
            library: LibraryStore::open(state_dir)?,
        })
    }

    pub fn in_memory() -> PersistenceResult<Self> {
        Ok(Self {
            state: StateTracker::in_memory()?,
            library: LibraryStore::in_memory()?,
        })
    }
}

/// Everything an album run reads but never changes
pub struct AlbumContext<'a> {
    pub config: &'a Config,
    pub aliases: &'a AliasResolver,
    pub reader: &'a std::sync::Arc<dyn TagReader>,
    pub enricher: &'a dyn Enricher,
    pub safety: &'a SafetyManager,
}

impl AlbumContext<'_> {
    fn is_dry_run(&self) -> bool {
        self.safety.run_mode().is_dry_run()
    }
}

fn status_of(outcome: &AlbumOutcome) -> (ProcessingStatus, Option<&str>) {
    match outcome {
        AlbumOutcome::Organized { .. } => (ProcessingStatus::Success, None),
        AlbumOutcome::AlreadyOrganized(_) => (ProcessingStatus::AlreadyOrganized, None),
        AlbumOutcome::Held { reason } => (ProcessingStatus::Held, Some(reason.as_str())),
        AlbumOutcome::Skipped { reason } => (ProcessingStatus::Skipped, Some(reason.as_str())),
    }
}

/// Process a batch of albums in order, stopping early when `shutdown` is set.
///
/// Per-album errors are counted and logged; only fatal errors end the batch.
pub fn run_batch(
    ctx: &AlbumContext<'_>,
    stores: &mut Stores,
    albums: &[AlbumDirectory],
    shutdown: &AtomicBool,
    progress: &ProgressBar,
) -> Result<RunSummary> {
    let mut summary = RunSummary::default();

    for album in albums {
        if shutdown.load(Ordering::SeqCst) {
            warn!("Shutdown requested, stopping before {}", album.path.display());
            break;
        }
        progress.set_message(album.name());

        let signature = content_signature(&album.path).ok();
        match process_album(ctx, stores, album) {
            Ok(outcome) => {
                debug!("{}: {:?}", album.path.display(), outcome);
                summary.record(&outcome);
                let (status, reason) = status_of(&outcome);
                record_state(ctx, stores, &album.path, signature.as_deref(), status, reason);
            }
            Err(e) if e.is_fatal() => {
                progress.abandon();
                return Err(e);
            }
            Err(e) => {
                error!("Failed to organize {}: {}", album.path.display(), e);
                summary.failed += 1;
                let reason = e.to_string();
                record_state(
                    ctx,
                    stores,
                    &album.path,
                    signature.as_deref(),
                    ProcessingStatus::Failed,
                    Some(&reason),
                );
            }
        }
        progress.inc(1);
    }

    Ok(summary)
}

fn record_state(
    ctx: &AlbumContext<'_>,
    stores: &Stores,
    dir: &Path,
    signature: Option<&str>,
    status: ProcessingStatus,
    reason: Option<&str>,
) {
    if ctx.is_dry_run() {
        return;
    }
    if let Err(e) = stores
        .state
        .record(dir, signature.unwrap_or_default(), status, reason)
    {
        warn!("Could not record state for {}: {}", dir.display(), e);
    }
}

/// Run one album through the pipeline
pub fn process_album(
    ctx: &AlbumContext<'_>,
    stores: &mut Stores,
    album: &AlbumDirectory,
) -> Result<AlbumOutcome> {
    if ctx.config.incremental && !stores.state.needs_processing(&album.path)? {
        return Ok(AlbumOutcome::Skipped {
            reason: "unchanged since last run".to_string(),
        });
    }

    let tracks = match extract_album(ctx.reader.clone(), album, ctx.config.extraction_timeout()) {
        Ok(tracks) => tracks,
        Err(Error::NoAudioFiles(_)) => {
            return Ok(AlbumOutcome::Skipped {
                reason: "no audio files".to_string(),
            })
        }
        Err(e @ Error::MetadataExtraction { .. }) => {
            warn!("{}; trying the directory name", e);
            album.audio_files.iter().map(untagged).collect()
        }
        Err(e) => return Err(e),
    };

    let mut identity = match identify(ctx.aliases, album, &tracks) {
        Some(identity) => identity,
        None => return hold(ctx, stores, album, REJECTION_REASON),
    };
    enrich(&mut identity, ctx.enricher);

    let quality = classify(&album_formats(album, &tracks));
    let settings = LayoutSettings::from(ctx.config);
    let planned = plan(
        &identity,
        quality,
        &ctx.config.destination_dir,
        &settings,
        &stores.library,
    );

    let (destination, mode) = match planned {
        PlannedPath::AlreadyOrganized(path) => {
            info!("{} is already organized at {}", album.path.display(), path.display());
            return Ok(AlbumOutcome::AlreadyOrganized(path));
        }
        PlannedPath::Planned { path, mode } => (path, mode),
    };

    match ctx
        .safety
        .move_directory(&stores.library, MoveKind::Organize, &album.path, &destination)
    {
        Ok(_) => {}
        Err(Error::DestinationConflict(path)) => return Ok(AlbumOutcome::AlreadyOrganized(path)),
        Err(e) => return Err(e),
    }

    let mut renamed = false;
    if ctx.config.rename_tracks {
        match ctx.safety.rename_tracks(&destination, &album.path, &tracks) {
            Ok(_) => renamed = !ctx.is_dry_run(),
            Err(e) => warn!(
                "Moved {} but track renaming failed: {}",
                destination.display(),
                e
            ),
        }
    }

    if !ctx.is_dry_run() {
        let stored = stored_tracks(&tracks, &album.path, &destination);
        if let Err(e) = stores.library.record_album(
            &destination,
            &album.path,
            &identity,
            quality,
            mode,
            &stored,
        ) {
            warn!("Could not record {} in library: {}", destination.display(), e);
        }
    }

    info!(
        "{} -> {} ({}, {})",
        album.path.display(),
        destination.display(),
        quality,
        mode.as_str()
    );
    Ok(AlbumOutcome::Organized {
        destination,
        renamed,
    })
}

/// Tags first, the directory name when tags are not enough
fn identify(
    aliases: &AliasResolver,
    album: &AlbumDirectory,
    tracks: &[TrackMetadata],
) -> Option<AlbumIdentity> {
    match resolve_identity(tracks, &album.path, aliases) {
        Ok(identity) => Some(identity),
        Err(e) => {
            debug!("{}; reconstructing from directory name", e);
            let result = reconstruct(&album.name());
            info!(
                "Reconstructed '{}' with confidence {}",
                result.raw_name,
                result.display_confidence()
            );
            result.into_identity(aliases)
        }
    }
}

/// Track rows as they sit after the move
fn stored_tracks(tracks: &[TrackMetadata], source: &Path, dest: &Path) -> Vec<StoredTrack> {
    tracks
        .iter()
        .map(|t| StoredTrack {
            path: t
                .path
                .strip_prefix(source)
                .map(|rel| dest.join(rel))
                .unwrap_or_else(|_| t.path.clone()),
            title: t.title.clone(),
            track_number: t.track_number,
            disc_number: t.disc_number,
            format: t.file_type.as_ref().map(|f| f.as_str().to_string()),
            bitrate: t.bitrate,
            size: t.size,
        })
        .collect()
}

/// First free `<holding>/<name>`, `<holding>/<name> (2)`, ...
fn holding_destination(holding_dir: &Path, name: &str) -> PathBuf {
    let name = sanitize_segment(name);
    let mut candidate = holding_dir.join(&name);
    let mut n = 2;
    while candidate.exists() {
        candidate = holding_dir.join(format!("{} ({})", name, n));
        n += 1;
    }
    candidate
}

fn hold(
    ctx: &AlbumContext<'_>,
    stores: &Stores,
    album: &AlbumDirectory,
    reason: &str,
) -> Result<AlbumOutcome> {
    let dest = holding_destination(&ctx.config.holding_dir, &album.name());
    info!("Holding {}: {}", album.path.display(), reason);
    ctx.safety
        .move_directory(&stores.library, MoveKind::Hold, &album.path, &dest)?;
    Ok(AlbumOutcome::Held {
        reason: reason.to_string(),
    })
}
