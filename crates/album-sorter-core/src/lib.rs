//! Core functionality for organizing music releases.
//!
//! This library provides the building blocks of the organizer:
//! - Album discovery and tag extraction
//! - Identity resolution, alias canonicalization and name reconstruction
//! - Quality classification and destination planning
//! - Journaled directory moves and incremental state
//! - Duplicate release detection and resolution

// -- External Dependencies --
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use rayon::prelude::*;

// -- Standard Library --
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// -- Internal Modules --
mod error;

// -- Public Re-exports --
pub use config::*;
pub use error::{Error, Result};
pub use types::*;

// -- Public Modules --
pub mod config;
pub mod discovery;
pub mod duplicates;
pub mod enrichment;
pub mod identity;
pub mod logging;
pub mod metadata;
pub mod persistence;
pub mod pipeline;
pub mod planner;
pub mod quality;
pub mod safety;
pub mod types;

use duplicates::{DuplicateReport, ResolveSummary};
use enrichment::{Enricher, NoEnrichment};
use identity::AliasResolver;
use metadata::TagReader;
use persistence::{DuplicateStore, LibraryStore};
use pipeline::{AlbumContext, Stores};
use safety::{RecoveryReport, SafetyManager};

/// Main entry point for organizing a music collection
pub struct Organizer {
    config: Config,
    aliases: AliasResolver,
    reader: Arc<dyn TagReader>,
    enricher: Arc<dyn Enricher>,
    safety: SafetyManager,
    shutdown_requested: Arc<AtomicBool>,
}

impl Organizer {
    /// Create a new Organizer, validating the configuration and locating
    /// the tag reader it selects.
    pub fn new(config: Config) -> Result<Self> {
        for warning in config.validate()? {
            warn!("Alias table: {}", warning);
        }
        let reader = metadata::create_reader(&config)?;
        let aliases = AliasResolver::new(&config.alias_groups);
        let safety = SafetyManager::new(&config);

        Ok(Self {
            config,
            aliases,
            reader,
            enricher: Arc::new(NoEnrichment),
            safety,
            shutdown_requested: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn with_reader(mut self, reader: Arc<dyn TagReader>) -> Self {
        self.reader = reader;
        self
    }

    pub fn with_enricher(mut self, enricher: Arc<dyn Enricher>) -> Self {
        self.enricher = enricher;
        self
    }

    pub fn with_safety_manager(mut self, safety: SafetyManager) -> Self {
        self.safety = safety;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Flag checked between albums; setting it stops the run after the
    /// album in flight.
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        self.shutdown_requested.clone()
    }

    /// Set the shutdown flag on SIGINT/SIGTERM
    pub fn install_signal_handler(&self) -> Result<()> {
        let flag = self.shutdown_requested.clone();
        ctrlc::set_handler(move || {
            warn!("Termination requested, finishing current album");
            flag.store(true, Ordering::SeqCst);
        })
        .map_err(|e| Error::Configuration(format!("Failed to install signal handler: {}", e)))
    }

    fn context(&self) -> AlbumContext<'_> {
        AlbumContext {
            config: &self.config,
            aliases: &self.aliases,
            reader: &self.reader,
            enricher: self.enricher.as_ref(),
            safety: &self.safety,
        }
    }

    fn progress_bar(len: usize) -> ProgressBar {
        let progress_bar = ProgressBar::new(len as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("[{eta}] {bar:40.cyan/blue} {pos}/{len} ({percent}%) {msg}")
        {
            progress_bar.set_style(style.progress_chars("##-"));
        }
        progress_bar
    }

    /// Organize every album found below `source`
    pub fn organize(&self, source: &Path) -> Result<RunSummary> {
        // State is keyed on absolute paths, whatever the working directory
        let source = if source.is_absolute() {
            source.to_path_buf()
        } else {
            source
                .canonicalize()
                .map_err(|_| Error::DirectoryNotFound(source.to_path_buf()))?
        };
        let source = source.as_path();

        info!("Discovering albums in {}...", source.display());
        let albums = discovery::discover_albums(source, &self.config)?;
        info!("Found {} albums", albums.len());

        let state_dir = self.config.resolve_state_dir();
        let workers = self.config.worker_count();
        let progress = Self::progress_bar(albums.len());

        let summary = if workers <= 1 || albums.len() <= 1 {
            self.run_partition(&state_dir, &albums, &progress)?
        } else {
            self.run_workers(source, &state_dir, albums, workers, &progress)?
        };

        progress.finish_with_message("done");
        info!("Run complete - {}", summary);
        Ok(summary)
    }

    fn run_partition(
        &self,
        state_dir: &Path,
        albums: &[AlbumDirectory],
        progress: &ProgressBar,
    ) -> Result<RunSummary> {
        let mut stores = Stores::open(state_dir)?;
        if !self.config.run_mode.is_dry_run() {
            let recovered = self.safety.recover(&stores.library)?;
            if recovered != RecoveryReport::default() {
                info!(
                    "Recovered interrupted moves: {} committed, {} rolled back",
                    recovered.committed, recovered.rolled_back
                );
            }
        }
        pipeline::run_batch(
            &self.context(),
            &mut stores,
            albums,
            &self.shutdown_requested,
            progress,
        )
    }

    /// Split albums over `workers` rayon threads, each with private stores
    /// under `<state_dir>/worker-N/`. Albums sharing a top-level directory
    /// stay on one worker so nested releases keep their deepest-first order.
    fn run_workers(
        &self,
        source: &Path,
        state_dir: &Path,
        albums: Vec<AlbumDirectory>,
        workers: usize,
        progress: &ProgressBar,
    ) -> Result<RunSummary> {
        let mut partitions: BTreeMap<usize, Vec<AlbumDirectory>> = BTreeMap::new();
        for album in albums {
            let slot = partition_slot(source, &album.path, workers);
            partitions.entry(slot).or_default().push(album);
        }
        info!(
            "Organizing with {} workers over {} partitions",
            workers,
            partitions.len()
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|e| Error::Configuration(format!("Failed to build worker pool: {}", e)))?;

        let results: Vec<Result<RunSummary>> = pool.install(|| {
            partitions
                .par_iter()
                .map(|(slot, albums)| {
                    let worker_dir = state_dir.join(format!("worker-{}", slot));
                    self.run_partition(&worker_dir, albums, progress)
                })
                .collect()
        });

        let mut summary = RunSummary::default();
        for result in results {
            summary.merge(&result?);
        }
        Ok(summary)
    }

    fn scan_and_group(&self, store: &mut DuplicateStore) -> Result<DuplicateReport> {
        let exclude = [
            self.config.holding_dir.as_path(),
            self.config.backup_dir.as_path(),
        ];
        let candidates = duplicates::scan_candidates(
            &self.config.destination_dir,
            &exclude,
            self.reader.clone(),
            &self.aliases,
            self.config.extraction_timeout(),
        )?;

        let stored = store.replace_candidates(&candidates)?;
        let groups = store.replace_groups(&duplicates::detect(&stored))?;
        info!(
            "{} candidates, {} duplicate groups",
            stored.len(),
            groups.len()
        );
        Ok(DuplicateReport::build(&groups, &stored))
    }

    /// Rebuild duplicate groups over the organized tree
    pub fn find_duplicates(&self) -> Result<DuplicateReport> {
        let mut store = DuplicateStore::open(&self.config.resolve_state_dir())?;
        self.scan_and_group(&mut store)
    }

    /// Detect duplicates, then move every non-keeper into the backup area
    pub fn resolve_duplicates(&self) -> Result<(DuplicateReport, ResolveSummary)> {
        let state_dir = self.config.resolve_state_dir();
        let mut store = DuplicateStore::open(&state_dir)?;
        let journal = LibraryStore::open(&state_dir)?;

        let report = self.scan_and_group(&mut store)?;
        let summary = duplicates::resolve_groups(
            &store,
            &journal,
            &self.safety,
            &self.config.destination_dir,
            &self.config.backup_dir,
        )?;
        Ok((report, summary))
    }

    /// Reverse a committed move from the journal
    pub fn undo_move(&self, id: i64) -> Result<Option<i64>> {
        let journal = LibraryStore::open(&self.config.resolve_state_dir())?;
        let op = journal.get_move(id)?;
        let undo_id = self.safety.undo(&journal, id)?;
        if let (Some(op), Some(_)) = (op, undo_id) {
            if let Err(e) = journal.remove_album(&op.dest_path) {
                warn!("Could not drop {} from library: {}", op.dest_path.display(), e);
            }
        }
        Ok(undo_id)
    }
}

/// Stable worker slot for an album, keyed on its top-level directory under `source`
fn partition_slot(source: &Path, album: &Path, workers: usize) -> usize {
    let key: PathBuf = album
        .strip_prefix(source)
        .ok()
        .and_then(|rel| rel.components().next())
        .map(|c| PathBuf::from(c.as_os_str()))
        .unwrap_or_else(|| album.to_path_buf());
    let hash = blake3::hash(key.to_string_lossy().as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash.as_bytes()[..8]);
    (u64::from_le_bytes(bytes) % workers as u64) as usize
}
